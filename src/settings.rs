//! Global navigation constants and the builder used to configure them.
use std::time::Duration;

use bevy::prelude::Resource;

/// Side length of a chunk in world units.
pub const DEFAULT_CHUNK_SIZE: f32 = 100.0;
/// Number of grid cells along each side of a chunk.
pub const DEFAULT_GRID_SIZE: u32 = 64;
/// Upper bound on A* node expansions for a single search.
pub const DEFAULT_MAX_ITERATIONS: usize = 4096;
/// Maximum age of a path request before it is timed out instead of searched.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// How long an agent may fail to make progress before it is considered stuck.
pub const DEFAULT_STUCK_TIMEOUT: f32 = 2.5;
/// Displacement below this in a tick counts as no movement.
pub const DEFAULT_MIN_MOVEMENT: f32 = 0.01;
/// Distance at which a follower considers a waypoint reached.
pub const DEFAULT_ARRIVAL_THRESHOLD: f32 = 0.5;
/// Default movement speed for followers in world units per second.
pub const DEFAULT_SPEED: f32 = 5.0;
/// Largest radius any obstacle can have. Used to widen the obstacle search around a chunk.
pub const DEFAULT_OBSTACLE_MARGIN: f32 = 10.0;

/// Navigation settings shared by every phase of the plugin.
///
/// Build one with [`NavSettingsBuilder`]:
/// ```
/// use bevy_chunk_nav::prelude::*;
///
/// let settings = NavSettingsBuilder::new()
///     .chunk_size(50.0)
///     .grid_size(32)
///     .max_iterations(2048)
///     .build();
///
/// assert_eq!(settings.cell_size(), 50.0 / 32.0);
/// ```
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct NavSettings {
    pub(crate) chunk_size: f32,
    pub(crate) grid_size: u32,
    pub(crate) max_iterations: usize,
    pub(crate) request_timeout: Duration,
    pub(crate) stuck_timeout: f32,
    pub(crate) min_movement: f32,
    pub(crate) arrival_threshold: f32,
    pub(crate) speed: f32,
    pub(crate) obstacle_margin: f32,
}

impl Default for NavSettings {
    fn default() -> Self {
        NavSettingsBuilder::default().build()
    }
}

impl NavSettings {
    /// Side length of a chunk in world units.
    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Cells per chunk side.
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// World size of a single cell.
    pub fn cell_size(&self) -> f32 {
        self.chunk_size / self.grid_size as f32
    }

    /// Maximum A* expansions per search.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Maximum age of a request before it times out.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Seconds without progress before a follower is stuck.
    pub fn stuck_timeout(&self) -> f32 {
        self.stuck_timeout
    }

    /// Minimum displacement per tick that counts as progress.
    pub fn min_movement(&self) -> f32 {
        self.min_movement
    }

    /// Default waypoint arrival distance for new followers.
    pub fn arrival_threshold(&self) -> f32 {
        self.arrival_threshold
    }

    /// Default speed for new followers.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Extra distance added around chunk bounds when collecting obstacles.
    pub fn obstacle_margin(&self) -> f32 {
        self.obstacle_margin
    }
}

/// Builder for [`NavSettings`].
#[derive(Clone, Debug)]
pub struct NavSettingsBuilder {
    settings: NavSettings,
}

impl Default for NavSettingsBuilder {
    fn default() -> Self {
        NavSettingsBuilder {
            settings: NavSettings {
                chunk_size: DEFAULT_CHUNK_SIZE,
                grid_size: DEFAULT_GRID_SIZE,
                max_iterations: DEFAULT_MAX_ITERATIONS,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                stuck_timeout: DEFAULT_STUCK_TIMEOUT,
                min_movement: DEFAULT_MIN_MOVEMENT,
                arrival_threshold: DEFAULT_ARRIVAL_THRESHOLD,
                speed: DEFAULT_SPEED,
                obstacle_margin: DEFAULT_OBSTACLE_MARGIN,
            },
        }
    }
}

impl NavSettingsBuilder {
    /// Starts from the default constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Side length of each square chunk in world units. Must be positive.
    pub fn chunk_size(mut self, chunk_size: f32) -> Self {
        if chunk_size.is_nan() || chunk_size <= 0.0 {
            panic!("Chunk size must be positive");
        }

        self.settings.chunk_size = chunk_size;
        self
    }

    /// Number of cells along each side of a chunk. Must be at least 1.
    pub fn grid_size(mut self, grid_size: u32) -> Self {
        if grid_size == 0 {
            panic!("Grid size must be at least 1");
        }

        self.settings.grid_size = grid_size;
        self
    }

    /// Maximum number of node expansions for a single search.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        if max_iterations == 0 {
            panic!("Max iterations must be at least 1");
        }

        self.settings.max_iterations = max_iterations;
        self
    }

    /// Age after which an unresolved request is timed out.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    /// Seconds an agent may fail to move before it is marked stuck.
    pub fn stuck_timeout(mut self, seconds: f32) -> Self {
        if seconds < 0.0 {
            panic!("Stuck timeout can't be negative");
        }

        self.settings.stuck_timeout = seconds;
        self
    }

    /// Per-tick displacement below which an agent is considered to not be moving.
    pub fn min_movement(mut self, distance: f32) -> Self {
        self.settings.min_movement = distance.max(0.0);
        self
    }

    /// Default arrival threshold handed to new followers.
    pub fn arrival_threshold(mut self, distance: f32) -> Self {
        self.settings.arrival_threshold = distance.max(0.0);
        self
    }

    /// Default speed handed to new followers.
    pub fn speed(mut self, speed: f32) -> Self {
        self.settings.speed = speed.max(0.0);
        self
    }

    /// Largest obstacle radius in the world.
    pub fn obstacle_margin(mut self, margin: f32) -> Self {
        self.settings.obstacle_margin = margin.max(0.0);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> NavSettings {
        self.settings
    }
}
