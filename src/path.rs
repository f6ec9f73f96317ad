//! This module defines `Path`, the waypoint list handed to followers, and request outcomes.
use std::time::Duration;

use bevy::math::Vec2;

use crate::{coord::GridCoord, settings::NavSettings};

/// Outcome of a path request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum PathStatus {
    /// Not resolved yet.
    #[default]
    Pending,
    /// A path was found.
    Success,
    /// No path exists within the grids, limits or length cap.
    Failed,
    /// The request waited too long before being processed.
    Timeout,
}

impl PathStatus {
    /// Whether the request has reached a final status.
    pub fn is_resolved(self) -> bool {
        !matches!(self, PathStatus::Pending)
    }
}

/// A world position along a path with the distance travelled to reach it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathWaypoint {
    pub position: Vec2,
    /// Cumulative distance from the first waypoint.
    pub distance: f32,
}

/// Summary of a resolved path request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathResult {
    pub status: PathStatus,
    /// Length of the smoothed path in world units.
    pub distance: f32,
    /// Time spent searching and smoothing.
    pub duration: Duration,
    /// Number of waypoints produced.
    pub waypoint_count: usize,
    /// Nodes expanded by the search. Zero when no search ran.
    pub iterations: usize,
}

impl PathResult {
    /// A result for a request that ended without a path.
    pub(crate) fn failed(status: PathStatus, duration: Duration, iterations: usize) -> Self {
        PathResult {
            status,
            distance: 0.0,
            duration,
            waypoint_count: 0,
            iterations,
        }
    }

    /// A result describing a found path.
    pub(crate) fn success(path: &Path, duration: Duration) -> Self {
        PathResult {
            status: PathStatus::Success,
            distance: path.distance(),
            duration,
            waypoint_count: path.len(),
            iterations: path.iterations(),
        }
    }

    /// True only for successful results with at least one waypoint.
    pub fn is_valid(&self) -> bool {
        self.status == PathStatus::Success && self.waypoint_count > 0
    }
}

/// A smoothed path in world space.
///
/// This is returned by [`crate::lifecycle::ChunkGrids::find_path`] and is what a
/// [`crate::follower::PathFollower`] walks along.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    waypoints: Vec<PathWaypoint>,
    cells: Vec<GridCoord>,
    cost: f32,
    iterations: usize,
}

impl Path {
    /// Creates a path from cells, converting them to waypoints at cell centers.
    ///
    /// # Arguments
    /// * `cells` - The cells to visit, in order.
    /// * `cost` - The search cost of the raw path.
    /// * `iterations` - Nodes expanded while searching.
    /// * `settings` - Used to convert cells to world positions.
    pub fn from_cells(
        cells: Vec<GridCoord>,
        cost: f32,
        iterations: usize,
        settings: &NavSettings,
    ) -> Self {
        let mut waypoints: Vec<PathWaypoint> = cells
            .iter()
            .map(|cell| PathWaypoint {
                position: cell.to_world(settings),
                distance: 0.0,
            })
            .collect();
        accumulate_distances(&mut waypoints);

        Path {
            waypoints,
            cells,
            cost,
            iterations,
        }
    }

    /// Moves the first waypoint onto `start` and the last onto `target`, then recomputes
    /// the distances. A single-waypoint path ends up on `target`.
    ///
    /// Both positions are expected to lie in the first and last cell of the path.
    pub fn with_endpoints(mut self, start: Vec2, target: Vec2) -> Self {
        if let Some(first) = self.waypoints.first_mut() {
            first.position = start;
        }
        if let Some(last) = self.waypoints.last_mut() {
            last.position = target;
        }
        accumulate_distances(&mut self.waypoints);
        self
    }

    /// Returns the waypoints of the path.
    pub fn waypoints(&self) -> &[PathWaypoint] {
        &self.waypoints
    }

    /// Returns the cells the waypoints were made from.
    pub fn cells(&self) -> &[GridCoord] {
        &self.cells
    }

    /// Returns the search cost of the unsmoothed path.
    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Total length in world units.
    pub fn distance(&self) -> f32 {
        self.waypoints.last().map_or(0.0, |waypoint| waypoint.distance)
    }

    /// Nodes expanded while searching for this path.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Returns the number of waypoints.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Returns the final waypoint.
    pub fn last(&self) -> Option<&PathWaypoint> {
        self.waypoints.last()
    }

    /// Gives up the waypoints, usually to a follower.
    pub fn into_waypoints(self) -> Vec<PathWaypoint> {
        self.waypoints
    }
}

fn accumulate_distances(waypoints: &mut [PathWaypoint]) {
    let mut distance = 0.0;
    let mut previous: Option<Vec2> = None;

    for waypoint in waypoints {
        if let Some(previous) = previous {
            distance += previous.distance(waypoint.position);
        }
        waypoint.distance = distance;
        previous = Some(waypoint.position);
    }
}

impl IntoIterator for Path {
    type Item = PathWaypoint;
    type IntoIter = std::vec::IntoIter<PathWaypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::{IVec2, UVec2};

    use super::*;
    use crate::settings::NavSettingsBuilder;

    #[test]
    fn test_waypoint_distances() {
        let settings = NavSettingsBuilder::new().chunk_size(10.0).grid_size(10).build();
        let cells = vec![
            GridCoord::new(IVec2::ZERO, UVec2::new(0, 0)),
            GridCoord::new(IVec2::ZERO, UVec2::new(3, 4)),
            GridCoord::new(IVec2::X, UVec2::new(0, 4)),
        ];

        let path = Path::from_cells(cells, 10.0, 12, &settings);

        assert_eq!(path.len(), 3);
        assert_eq!(path.waypoints()[0].distance, 0.0);
        assert_eq!(path.waypoints()[0].position, Vec2::new(0.5, 0.5));
        assert_eq!(path.waypoints()[1].distance, 5.0);
        assert_eq!(path.waypoints()[2].distance, 12.0);
        assert_eq!(path.distance(), 12.0);
        assert_eq!(path.iterations(), 12);
    }

    #[test]
    fn test_endpoints_replace_cell_centers() {
        let settings = NavSettingsBuilder::new().chunk_size(10.0).grid_size(10).build();
        let cells = vec![
            GridCoord::new(IVec2::ZERO, UVec2::new(0, 0)),
            GridCoord::new(IVec2::ZERO, UVec2::new(3, 0)),
            GridCoord::new(IVec2::ZERO, UVec2::new(3, 4)),
        ];

        let path = Path::from_cells(cells, 7.0, 7, &settings)
            .with_endpoints(Vec2::new(0.5, 0.9), Vec2::new(3.5, 4.1));

        assert_eq!(path.waypoints()[0].position, Vec2::new(0.5, 0.9));
        assert_eq!(path.waypoints()[1].position, Vec2::new(3.5, 0.5));
        assert_eq!(path.last().map(|waypoint| waypoint.position), Some(Vec2::new(3.5, 4.1)));
        assert_eq!(path.waypoints()[0].distance, 0.0);
        assert!((path.waypoints()[1].distance - Vec2::new(3.0, -0.4).length()).abs() < 1e-5);
        assert!((path.distance() - (Vec2::new(3.0, -0.4).length() + 3.6)).abs() < 1e-5);
    }

    #[test]
    fn test_single_waypoint_lands_on_target() {
        let settings = NavSettings::default();
        let path = Path::from_cells(
            vec![GridCoord::new(IVec2::ZERO, UVec2::new(6, 6))],
            0.0,
            0,
            &settings,
        )
        .with_endpoints(Vec2::new(10.0, 10.0), Vec2::new(10.2, 10.1));

        assert_eq!(path.len(), 1);
        assert_eq!(path.waypoints()[0].position, Vec2::new(10.2, 10.1));
        assert_eq!(path.distance(), 0.0);
    }

    #[test]
    fn test_result_validity() {
        let settings = NavSettings::default();
        let path = Path::from_cells(
            vec![GridCoord::new(IVec2::ZERO, UVec2::new(1, 1))],
            0.0,
            0,
            &settings,
        );

        assert!(PathResult::success(&path, Duration::ZERO).is_valid());
        assert!(!PathResult::success(&Path::default(), Duration::ZERO).is_valid());
        assert!(!PathResult::failed(PathStatus::Failed, Duration::ZERO, 3).is_valid());
        assert!(!PathResult::failed(PathStatus::Timeout, Duration::ZERO, 0).is_valid());
    }

    #[test]
    fn test_status_resolution() {
        assert!(!PathStatus::Pending.is_resolved());
        assert!(PathStatus::Success.is_resolved());
        assert!(PathStatus::Timeout.is_resolved());
    }
}
