//! A* search across every built chunk grid.
use bevy::log;
use indexmap::map::Entry::{Occupied, Vacant};
use rustc_hash::FxHashSet;

use crate::{
    coord::GridCoord,
    error::PathError,
    heap::MinHeap,
    lifecycle::ChunkGrids,
    neighbor::{NeighborList, Neighborhood},
    FxIndexMap, SmallestCostHolder,
};

/// Raw cell path produced by [`astar_chunks`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CellPath {
    /// Cells from start to goal, both included.
    pub(crate) cells: Vec<GridCoord>,
    /// Accumulated movement cost.
    pub(crate) cost: f32,
    /// Number of expanded nodes.
    pub(crate) iterations: usize,
}

/// A* search over the union of all grids in `grids`.
///
/// Chunks without a grid are treated as walls. The search gives up after
/// `max_iterations` expansions.
///
/// # Arguments
/// * `neighborhood` - Reference to the [`Neighborhood`] to use.
/// * `grids` - The built chunk grids.
/// * `start` - The starting cell.
/// * `goal` - The goal cell.
/// * `grid_size` - Cells per chunk side.
/// * `max_iterations` - Expansion cap.
/// * `max_length` - Longest accepted path, in cells.
///
/// # Returns
/// * [`Result<CellPath, PathError>`] - The cell path, or why none was returned.
pub(crate) fn astar_chunks<N: Neighborhood>(
    neighborhood: &N,
    grids: &ChunkGrids,
    start: GridCoord,
    goal: GridCoord,
    grid_size: u32,
    max_iterations: usize,
    max_length: usize,
) -> Result<CellPath, PathError> {
    let goal_global = goal.global(grid_size);

    let mut to_visit = MinHeap::with_capacity(256);
    to_visit.push(SmallestCostHolder {
        estimated_cost: neighborhood.heuristic(start.global(grid_size), goal_global),
        cost: 0.0,
        index: 0,
    });

    // Insertion order doubles as the node index, values are (came_from, g).
    let mut visited: FxIndexMap<GridCoord, (usize, f32)> = FxIndexMap::default();
    visited.insert(start, (usize::MAX, 0.0));

    let mut closed: FxHashSet<GridCoord> = FxHashSet::default();
    let mut neighbors = NeighborList::new();
    let mut iterations = 0;

    while let Some(SmallestCostHolder { index, .. }) = to_visit.pop() {
        let Some((&current_pos, &(_, current_cost))) = visited.get_index(index) else {
            continue;
        };

        if closed.contains(&current_pos) {
            continue;
        }

        if current_pos == goal {
            let cells = reconstruct(&visited, index, max_length)?;
            return Ok(CellPath {
                cells,
                cost: current_cost,
                iterations,
            });
        }

        if iterations >= max_iterations {
            log::warn!(
                "A* hit the expansion cap of {} between {:?} and {:?} ({} nodes still open)",
                max_iterations,
                start,
                goal,
                to_visit.len()
            );
            return Err(PathError::IterationCap {
                cap: max_iterations,
            });
        }

        iterations += 1;
        closed.insert(current_pos);

        neighbors.clear();
        neighborhood.neighbors(grids, current_pos, grid_size, &mut neighbors);

        for &(neighbor, step_cost) in neighbors.iter() {
            if closed.contains(&neighbor) {
                continue;
            }

            let new_cost = current_cost + step_cost;
            let n;
            match visited.entry(neighbor) {
                Vacant(e) => {
                    n = e.index();
                    e.insert((index, new_cost));
                }
                Occupied(mut e) => {
                    if e.get().1 > new_cost {
                        n = e.index();
                        e.insert((index, new_cost));
                    } else {
                        continue;
                    }
                }
            }

            let h = neighborhood.heuristic(neighbor.global(grid_size), goal_global);
            to_visit.push(SmallestCostHolder {
                estimated_cost: new_cost + h,
                cost: new_cost,
                index: n,
            });
        }
    }

    log::debug!(
        "A* exhausted the open set after {} expansions between {:?} and {:?}",
        iterations,
        start,
        goal
    );

    Err(PathError::Exhausted { iterations })
}

// Walks the came-from links back to the start, bailing out as soon as the path
// is longer than `max_length`.
fn reconstruct(
    visited: &FxIndexMap<GridCoord, (usize, f32)>,
    goal_index: usize,
    max_length: usize,
) -> Result<Vec<GridCoord>, PathError> {
    let mut current = goal_index;
    let mut steps = vec![];

    while current != usize::MAX {
        let Some((&pos, &(parent, _))) = visited.get_index(current) else {
            break;
        };

        steps.push(pos);
        if steps.len() > max_length {
            // Finish counting so the error reports the real length.
            let mut length = steps.len();
            let mut rest = parent;
            while let Some((_, &(parent, _))) = visited.get_index(rest) {
                length += 1;
                rest = parent;
            }
            return Err(PathError::TooLong {
                length,
                max: max_length,
            });
        }

        current = parent;
    }

    steps.reverse();
    Ok(steps)
}
