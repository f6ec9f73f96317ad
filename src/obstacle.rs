//! Circular static obstacles rasterized into chunk grids.
use bevy::{
    math::{Rect, Vec2},
    prelude::Component,
};

use crate::error::NavError;

/// What kind of thing an obstacle is. Navigation treats every kind the same.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum ObstacleKind {
    #[default]
    Rock,
    Tree,
    Building,
    Water,
}

/// A circular blocker placed by world generation. Immutable once placed.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct StaticObstacle {
    position: Vec2,
    radius: f32,
    kind: ObstacleKind,
}

impl StaticObstacle {
    /// Creates an obstacle. The radius must be positive and finite.
    pub fn new(position: Vec2, radius: f32, kind: ObstacleKind) -> Result<Self, NavError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(NavError::InvalidRadius(radius));
        }

        Ok(StaticObstacle {
            position,
            radius,
            kind,
        })
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn kind(&self) -> ObstacleKind {
        self.kind
    }

    /// Whether a point lies inside the obstacle.
    #[inline(always)]
    pub fn contains(&self, point: Vec2) -> bool {
        self.position.distance_squared(point) <= self.radius * self.radius
    }

    /// Whether the obstacle, widened by its radius and `margin`, touches `bounds`.
    pub(crate) fn influences(&self, bounds: Rect, margin: f32) -> bool {
        let reach = self.radius + margin;
        self.position.x + reach >= bounds.min.x
            && self.position.x - reach <= bounds.max.x
            && self.position.y + reach >= bounds.min.y
            && self.position.y - reach <= bounds.max.y
    }
}
