use std::cmp::Ordering;
use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;

#[macro_use]
mod macros;

mod astar;
pub mod chunk;
pub mod coord;
pub mod error;
pub mod follower;
pub mod grid;
mod heap;
pub mod lifecycle;
pub mod neighbor;
pub mod obstacle;
pub mod path;
pub mod pathfind;
pub mod plugin;
pub mod request;
pub mod settings;
pub mod smooth;

pub mod prelude {
    pub use crate::chunk::{chunk_bounds, chunk_id_at, Chunk, ChunkId, ChunkState};
    pub use crate::coord::GridCoord;
    pub use crate::error::{Endpoint, NavError, PathError};
    pub use crate::follower::{FollowerState, FollowerTick, PathFollower};
    pub use crate::grid::{GridAsset, GridStats, BLOCKED, WALKABLE};
    pub use crate::lifecycle::{ChunkGrids, LifecycleStats};
    pub use crate::neighbor::*;
    pub use crate::obstacle::{ObstacleKind, StaticObstacle};
    pub use crate::path::{Path, PathResult, PathStatus, PathWaypoint};
    pub use crate::pathfind::find_path;
    pub use crate::plugin::{
        AgentPosition, ChunkNavPlugin, FollowerEvent, NavAgent, NavSet, PathFailed, PathGoal,
    };
    pub use crate::request::{PathRequests, RequestHandle, ResolvedPath};
    pub use crate::settings::{NavSettings, NavSettingsBuilder};
    pub use crate::smooth::{line_of_sight, smooth_path};
}

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Open set entry: ordered by estimated total cost, ties broken towards the
/// node that has travelled further.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SmallestCostHolder {
    estimated_cost: f32,
    cost: f32,
    index: usize,
}

impl PartialEq for SmallestCostHolder {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SmallestCostHolder {}

impl PartialOrd for SmallestCostHolder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SmallestCostHolder {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.estimated_cost.total_cmp(&other.estimated_cost) {
            Ordering::Equal => other.cost.total_cmp(&self.cost),
            s => s,
        }
    }
}
