//! Movement rules: which cells neighbor each other, what a step costs and the search heuristic.
use std::f32::consts::SQRT_2;
use std::fmt::Debug;

use bevy::math::IVec2;
use smallvec::SmallVec;

use crate::{coord::GridCoord, lifecycle::ChunkGrids};

/// Neighbors of a cell with the cost of stepping to each.
pub(crate) type NeighborList = SmallVec<[(GridCoord, f32); 8]>;

const CARDINAL_DIRECTIONS: [(IVec2, f32); 4] = [
    (IVec2::new(-1, 0), 1.0),
    (IVec2::new(1, 0), 1.0),
    (IVec2::new(0, -1), 1.0),
    (IVec2::new(0, 1), 1.0),
];

const ORDINAL_DIRECTIONS: [(IVec2, f32); 8] = [
    (IVec2::new(-1, -1), SQRT_2),
    (IVec2::new(-1, 0), 1.0),
    (IVec2::new(-1, 1), SQRT_2),
    (IVec2::new(0, -1), 1.0),
    (IVec2::new(0, 1), 1.0),
    (IVec2::new(1, -1), SQRT_2),
    (IVec2::new(1, 0), 1.0),
    (IVec2::new(1, 1), SQRT_2),
];

/// Defines how agents move between cells.
///
/// The heuristic works in the global cell index space (see [`GridCoord::global`]) and must
/// never overestimate the true cost under [`Neighborhood::directions`].
pub trait Neighborhood: Clone + Debug + Default + Sync + Send + 'static {
    /// Step offsets and their costs.
    fn directions(&self) -> &'static [(IVec2, f32)];

    /// Estimated cost between two global cell positions.
    fn heuristic(&self, pos: IVec2, target: IVec2) -> f32;

    /// Whether diagonal moves are allowed.
    fn is_ordinal(&self) -> bool {
        false
    }

    /// Walkable neighbors of `pos`, crossing into adjacent chunks where needed.
    /// Cells of chunks without a grid are never returned.
    #[inline(always)]
    fn neighbors(
        &self,
        grids: &ChunkGrids,
        pos: GridCoord,
        grid_size: u32,
        target: &mut NeighborList,
    ) {
        for &(offset, cost) in self.directions() {
            let neighbor = pos.offset(offset, grid_size);
            if grids.is_walkable(neighbor) {
                target.push((neighbor, cost));
            }
        }
    }
}

/// 4-directional movement with unit cost and a Manhattan heuristic.
#[derive(Clone, Copy, Debug, Default)]
pub struct CardinalNeighborhood;

impl Neighborhood for CardinalNeighborhood {
    #[inline(always)]
    fn directions(&self) -> &'static [(IVec2, f32)] {
        &CARDINAL_DIRECTIONS
    }

    #[inline(always)]
    fn heuristic(&self, pos: IVec2, target: IVec2) -> f32 {
        let delta = (pos - target).abs();
        (delta.x + delta.y) as f32
    }
}

/// 8-directional movement, diagonals cost √2, with a Euclidean heuristic.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdinalNeighborhood;

impl Neighborhood for OrdinalNeighborhood {
    #[inline(always)]
    fn directions(&self) -> &'static [(IVec2, f32)] {
        &ORDINAL_DIRECTIONS
    }

    #[inline(always)]
    fn heuristic(&self, pos: IVec2, target: IVec2) -> f32 {
        (pos - target).as_vec2().length()
    }

    #[inline(always)]
    fn is_ordinal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::UVec2;
    use ndarray::Array2;

    use super::*;
    use crate::grid::{GridAsset, BLOCKED, WALKABLE};

    fn open_grids(chunks: &[IVec2], size: usize) -> ChunkGrids {
        let mut grids = ChunkGrids::new();
        for &chunk in chunks {
            grids.insert(GridAsset::from_cells(chunk, Array2::from_elem((size, size), WALKABLE)));
        }
        grids
    }

    #[test]
    fn test_cardinal_neighbors() {
        let grids = open_grids(&[IVec2::ZERO], 3);
        let mut target = NeighborList::new();

        let pos = GridCoord::new(IVec2::ZERO, UVec2::new(1, 1));
        CardinalNeighborhood.neighbors(&grids, pos, 3, &mut target);

        assert_eq!(target.len(), 4);
        assert!(target.iter().all(|&(_, cost)| cost == 1.0));
    }

    #[test]
    fn test_ordinal_neighbors() {
        let grids = open_grids(&[IVec2::ZERO], 3);
        let mut target = NeighborList::new();

        let pos = GridCoord::new(IVec2::ZERO, UVec2::new(1, 1));
        OrdinalNeighborhood.neighbors(&grids, pos, 3, &mut target);

        assert_eq!(target.len(), 8);
        assert_eq!(target[0], (GridCoord::new(IVec2::ZERO, UVec2::new(0, 0)), SQRT_2));
        assert_eq!(target[1], (GridCoord::new(IVec2::ZERO, UVec2::new(0, 1)), 1.0));
    }

    #[test]
    fn test_neighbors_skip_blocked_and_missing_chunks() {
        let mut cells = Array2::from_elem((3, 3), WALKABLE);
        cells[[1, 0]] = BLOCKED;
        let mut grids = ChunkGrids::new();
        grids.insert(GridAsset::from_cells(IVec2::ZERO, cells));

        let mut target = NeighborList::new();
        // Corner cell: west and south lead into chunks that were never built.
        let pos = GridCoord::new(IVec2::ZERO, UVec2::new(0, 0));
        OrdinalNeighborhood.neighbors(&grids, pos, 3, &mut target);

        assert_eq!(
            target.iter().map(|(coord, _)| coord.cell).collect::<Vec<_>>(),
            vec![UVec2::new(0, 1), UVec2::new(1, 1)]
        );
    }

    #[test]
    fn test_neighbors_cross_chunk_boundary() {
        let grids = open_grids(&[IVec2::ZERO, IVec2::X], 3);
        let mut target = NeighborList::new();

        let pos = GridCoord::new(IVec2::ZERO, UVec2::new(2, 1));
        CardinalNeighborhood.neighbors(&grids, pos, 3, &mut target);

        assert!(target
            .iter()
            .any(|&(coord, _)| coord == GridCoord::new(IVec2::X, UVec2::new(0, 1))));
        assert_eq!(target.len(), 4);
    }

    #[test]
    fn test_heuristics() {
        assert_eq!(CardinalNeighborhood.heuristic(IVec2::ZERO, IVec2::new(3, -4)), 7.0);
        assert_eq!(OrdinalNeighborhood.heuristic(IVec2::ZERO, IVec2::new(3, -4)), 5.0);
        assert_eq!(OrdinalNeighborhood.heuristic(IVec2::new(2, 2), IVec2::new(2, 2)), 0.0);
    }

    #[test]
    fn test_ordinal_heuristic_is_admissible_on_open_grid() {
        // Octile distance is the true cost on an open 8-connected grid.
        for x in -10..=10 {
            for y in -10..=10 {
                let (dx, dy) = (i32::abs(x) as f32, i32::abs(y) as f32);
                let octile = dx.max(dy) - dx.min(dy) + SQRT_2 * dx.min(dy);
                let h = OrdinalNeighborhood.heuristic(IVec2::ZERO, IVec2::new(x, y));
                assert!(h <= octile + 1e-4, "h {h} > cost {octile} for ({x}, {y})");
            }
        }
    }
}
