//! Error types returned by the navigation core.
use std::time::Duration;

use bevy::math::Vec2;
use thiserror::Error;

use crate::path::PathStatus;

/// Which end of a path request could not be resolved onto a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Endpoint {
    /// The start position.
    #[strum(to_string = "start")]
    Start,
    /// The target position.
    #[strum(to_string = "target")]
    Target,
}

/// Reasons a path request did not produce a path.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PathError {
    /// The endpoint lies in a chunk without a grid or on a blocked cell.
    #[error("{endpoint} {position} is not on a walkable, generated cell")]
    Unreachable { endpoint: Endpoint, position: Vec2 },
    /// The open set emptied before reaching the target.
    #[error("no route to target after {iterations} expansions")]
    Exhausted { iterations: usize },
    /// The search hit the expansion cap.
    #[error("search aborted after reaching the cap of {cap} expansions")]
    IterationCap { cap: usize },
    /// A route was found but it is longer than the caller allows.
    #[error("path of {length} cells exceeds the maximum of {max}")]
    TooLong { length: usize, max: usize },
    /// The request waited too long before it was processed.
    #[error("request timed out after waiting {age:?}")]
    Timeout { age: Duration },
}

impl PathError {
    /// The status reported to callers for this failure.
    pub fn status(&self) -> PathStatus {
        match self {
            PathError::Timeout { .. } => PathStatus::Timeout,
            _ => PathStatus::Failed,
        }
    }
}

/// Misuse of the navigation API that can be recovered from.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum NavError {
    /// Obstacles must have a strictly positive, finite radius.
    #[error("obstacle radius must be positive, got {0}")]
    InvalidRadius(f32),
    /// The request handle is unknown or was already taken.
    #[error("unknown path request {0}")]
    UnknownRequest(usize),
}
