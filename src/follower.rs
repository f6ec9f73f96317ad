//! Per-agent cursor that walks a smoothed path and detects when the agent stops making progress.
use bevy::{math::Vec2, prelude::Component};

use crate::{path::PathWaypoint, settings::NavSettings};

/// Movement state of a [`PathFollower`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum FollowerState {
    /// No path assigned.
    #[default]
    Idle,
    /// Moving towards the current waypoint.
    Following,
    /// Holding position. Stuck time does not accumulate.
    Paused,
    /// Failed to make progress for longer than the stuck timeout. Terminal.
    Stuck,
    /// Reached the last waypoint. Terminal.
    Completed,
}

impl FollowerState {
    /// Whether the follower is done and should be discarded.
    pub fn is_finished(self) -> bool {
        matches!(self, FollowerState::Stuck | FollowerState::Completed)
    }
}

/// Outcome of a single [`PathFollower::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowerTick {
    /// Where the agent should be after this tick.
    pub position: Vec2,
    /// The state the follower entered this tick, if it changed.
    pub transition: Option<FollowerState>,
}

/// Walks an agent along a list of waypoints.
///
/// The follower does not own the agent's position. Each tick it is given where the agent
/// actually is and returns where it should move to, so anything else pushing the agent
/// around shows up as lost progress.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct PathFollower {
    waypoints: Vec<PathWaypoint>,
    index: usize,
    state: FollowerState,
    speed: f32,
    arrival_threshold: f32,
    min_movement: f32,
    stuck_timeout: f32,
    stuck_timer: f32,
    last_position: Option<Vec2>,
    expected_step: f32,
}

impl PathFollower {
    /// Creates an idle follower.
    pub fn new(speed: f32, arrival_threshold: f32, settings: &NavSettings) -> Self {
        PathFollower {
            waypoints: Vec::new(),
            index: 0,
            state: FollowerState::Idle,
            speed: speed.max(0.0),
            arrival_threshold: arrival_threshold.max(0.0),
            min_movement: settings.min_movement(),
            stuck_timeout: settings.stuck_timeout(),
            stuck_timer: 0.0,
            last_position: None,
            expected_step: 0.0,
        }
    }

    /// Creates an idle follower using the default speed and arrival threshold.
    pub fn from_settings(settings: &NavSettings) -> Self {
        Self::new(settings.speed(), settings.arrival_threshold(), settings)
    }

    /// Starts following `waypoints` from the first one.
    ///
    /// Returns `false` and leaves the follower untouched if the path is empty or the
    /// follower is stuck. A stuck follower has to be replaced by a new one.
    pub fn set_path(&mut self, waypoints: Vec<PathWaypoint>) -> bool {
        if waypoints.is_empty() || self.state == FollowerState::Stuck {
            return false;
        }

        self.waypoints = waypoints;
        self.index = 0;
        self.state = FollowerState::Following;
        self.reset_progress();
        true
    }

    /// Stops moving until [`PathFollower::resume`] is called.
    pub fn pause(&mut self) -> bool {
        if self.state != FollowerState::Following {
            return false;
        }

        self.state = FollowerState::Paused;
        true
    }

    /// Continues a paused follower. The pause itself never counts towards being stuck.
    pub fn resume(&mut self) -> bool {
        if self.state != FollowerState::Paused {
            return false;
        }

        self.state = FollowerState::Following;
        self.reset_progress();
        true
    }

    /// Drops the waypoints. An active follower goes back to idle, a finished one keeps
    /// its final state.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.index = 0;
        if !self.state.is_finished() {
            self.state = FollowerState::Idle;
        }
        self.reset_progress();
    }

    /// Advances the follower by `delta` seconds.
    ///
    /// # Arguments
    /// * `position` - Where the agent is right now.
    /// * `delta` - Seconds since the previous tick.
    pub fn tick(&mut self, position: Vec2, delta: f32) -> FollowerTick {
        if self.state != FollowerState::Following {
            return FollowerTick {
                position,
                transition: None,
            };
        }

        // Progress check against what was asked for on the previous tick.
        if let Some(last) = self.last_position {
            let moved = last.distance(position);
            if self.expected_step > self.min_movement && moved < self.min_movement {
                self.stuck_timer += delta;
            } else {
                self.stuck_timer = 0.0;
            }
        }
        self.last_position = Some(position);

        if self.stuck_timer > self.stuck_timeout {
            self.state = FollowerState::Stuck;
            self.expected_step = 0.0;
            return FollowerTick {
                position,
                transition: Some(FollowerState::Stuck),
            };
        }

        while let Some(waypoint) = self.waypoints.get(self.index) {
            if position.distance(waypoint.position) > self.arrival_threshold {
                break;
            }
            self.index += 1;
            self.stuck_timer = 0.0;
        }

        let Some(waypoint) = self.waypoints.get(self.index) else {
            self.state = FollowerState::Completed;
            self.expected_step = 0.0;
            return FollowerTick {
                position,
                transition: Some(FollowerState::Completed),
            };
        };

        let offset = waypoint.position - position;
        let step = (self.speed * delta).min(offset.length());
        self.expected_step = step;

        FollowerTick {
            position: position + offset.normalize_or_zero() * step,
            transition: None,
        }
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    /// Index of the waypoint currently being approached.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn waypoints(&self) -> &[PathWaypoint] {
        &self.waypoints
    }

    /// The waypoint currently being approached.
    pub fn current(&self) -> Option<&PathWaypoint> {
        self.waypoints.get(self.index)
    }

    /// Seconds spent without making the expected progress.
    pub fn stuck_time(&self) -> f32 {
        self.stuck_timer
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Distance left along the path, measured from the current waypoint.
    pub fn remaining_distance(&self) -> f32 {
        match (self.current(), self.waypoints.last()) {
            (Some(current), Some(last)) => last.distance - current.distance,
            _ => 0.0,
        }
    }

    fn reset_progress(&mut self) {
        self.stuck_timer = 0.0;
        self.last_position = None;
        self.expected_step = 0.0;
    }
}
