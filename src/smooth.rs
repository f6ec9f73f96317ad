//! Line of sight checks and greedy string-pulling of raw cell paths.
use crate::{coord::GridCoord, lifecycle::ChunkGrids};

/// Check if there is a line of sight between two cells.
///
/// The straight line between the cell centers is sampled once per cell along its
/// longest axis, and every sampled cell must be walkable.
///
/// Cells in different chunks are never visible to each other, which keeps paths
/// from being pulled tight across a chunk boundary.
///
/// Returns:
/// * `true` if there is a line of sight between the two cells.
/// * `false` if there is an obstacle between them or they are in different chunks.
pub fn line_of_sight(grids: &ChunkGrids, start: GridCoord, end: GridCoord) -> bool {
    if start.chunk != end.chunk {
        return false;
    }

    let Some(grid) = grids.get(start.chunk) else {
        return false;
    };

    let from = start.cell.as_vec2();
    let to = end.cell.as_vec2();
    let delta = to - from;

    let steps = delta.x.abs().max(delta.y.abs());
    if steps == 0.0 {
        return grid.is_walkable(start.cell);
    }

    let step = delta / steps;
    let mut sample = from;

    for _ in 0..=steps as u32 {
        if !grid.is_walkable(sample.round().as_uvec2()) {
            return false; // Hit an obstacle
        }
        sample += step;
    }

    true
}

/// Reduces a raw cell path to the cells an agent actually has to turn at.
///
/// From each anchor the farthest later cell still in line of sight becomes the next
/// anchor. The first and last cells are always kept and the result is never longer
/// than the input.
pub fn smooth_path(cells: &[GridCoord], grids: &ChunkGrids) -> Vec<GridCoord> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }

    let mut smoothed = Vec::with_capacity(cells.len());
    let mut anchor = 0;
    smoothed.push(cells[0]); // Always keep the first cell

    while anchor < cells.len() - 1 {
        let next = (anchor + 2..cells.len())
            .rev()
            .find(|&candidate| line_of_sight(grids, cells[anchor], cells[candidate]))
            // Consecutive cells are always connected, even across chunks.
            .unwrap_or(anchor + 1);

        smoothed.push(cells[next]);
        anchor = next;
    }

    smoothed
}
