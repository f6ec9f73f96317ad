//! This module defines pathfinding functions which can be called directly.
use bevy::{log, math::Vec2};

use crate::{
    astar::astar_chunks,
    coord::GridCoord,
    error::{Endpoint, PathError},
    lifecycle::ChunkGrids,
    neighbor::Neighborhood,
    path::Path,
    settings::NavSettings,
    smooth::smooth_path,
};

/// Finds a smoothed path between two world positions.
///
/// Both endpoints must fall on a walkable cell of a chunk with a built grid, otherwise
/// the request fails before any search runs. The first waypoint is `start` and the last
/// is `target`, the ones in between sit at cell centers. If both endpoints land in the
/// same cell the path is a single waypoint on `target`.
///
/// # Arguments
/// * `neighborhood` - The [`Neighborhood`] to use for the pathfinding.
/// * `grids` - Every built chunk grid.
/// * `start` - World position to start from.
/// * `target` - World position to reach.
/// * `max_length` - Longest raw cell path accepted.
/// * `settings` - The [`NavSettings`] the grids were built with.
///
/// # Example
/// ```
/// use bevy::math::{IVec2, Vec2};
/// use bevy_chunk_nav::prelude::*;
///
/// let settings = NavSettings::default();
/// let mut grids = ChunkGrids::new();
/// grids.build(IVec2::ZERO, std::iter::empty(), &settings);
///
/// let path = find_path(
///     &OrdinalNeighborhood,
///     &grids,
///     Vec2::new(10.0, 10.0),
///     Vec2::new(90.0, 90.0),
///     256,
///     &settings,
/// )
/// .unwrap();
///
/// assert_eq!(path.waypoints()[0].distance, 0.0);
/// ```
pub fn find_path<N: Neighborhood>(
    neighborhood: &N,
    grids: &ChunkGrids,
    start: Vec2,
    target: Vec2,
    max_length: usize,
    settings: &NavSettings,
) -> Result<Path, PathError> {
    let start_coord = resolve_endpoint(grids, start, Endpoint::Start, settings)?;
    let target_coord = resolve_endpoint(grids, target, Endpoint::Target, settings)?;

    if start_coord == target_coord {
        return Ok(Path::from_cells(vec![start_coord], 0.0, 0, settings)
            .with_endpoints(start, target));
    }

    let raw = timed!("A* search", {
        astar_chunks(
            neighborhood,
            grids,
            start_coord,
            target_coord,
            settings.grid_size(),
            settings.max_iterations(),
            max_length,
        )
    })?;

    let cells = timed!("Smoothed path", { smooth_path(&raw.cells, grids) });

    log::debug!(
        "Found path from {} to {}: {} cells smoothed to {} in {} expansions",
        start,
        target,
        raw.cells.len(),
        cells.len(),
        raw.iterations
    );

    Ok(Path::from_cells(cells, raw.cost, raw.iterations, settings)
        .with_endpoints(start, target))
}

/// Maps a world position onto a walkable cell of a built grid.
pub(crate) fn resolve_endpoint(
    grids: &ChunkGrids,
    position: Vec2,
    endpoint: Endpoint,
    settings: &NavSettings,
) -> Result<GridCoord, PathError> {
    let coord = GridCoord::from_world(position, settings);

    if !grids.is_walkable(coord) {
        log::debug!(
            "{} {} resolves to {:?} which has no grid or is blocked",
            endpoint,
            position,
            coord
        );
        return Err(PathError::Unreachable { endpoint, position });
    }

    Ok(coord)
}
