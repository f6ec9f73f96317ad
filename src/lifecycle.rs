//! `ChunkGrids` owns every built [`GridAsset`] and releases each one exactly once.
use bevy::{
    log,
    math::Vec2,
    prelude::{Entity, Resource},
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    chunk::ChunkId,
    coord::GridCoord,
    error::PathError,
    grid::{GridAsset, GridStats},
    neighbor::Neighborhood,
    obstacle::StaticObstacle,
    path::Path,
    pathfind::find_path,
    settings::NavSettings,
};

/// Running totals of grid builds and releases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    /// Grids built (including rebuilds).
    pub built: usize,
    /// Grids released.
    pub released: usize,
}

impl LifecycleStats {
    /// Grids currently alive.
    pub fn live(&self) -> usize {
        self.built - self.released
    }
}

/// The set of built chunk grids searched by the pathfinder.
///
/// Grids are only inserted and released between ticks, in
/// [`crate::plugin::NavSet::Grids`]. Searches borrow the whole set immutably, so
/// a grid can't be released while a search is reading it.
#[derive(Resource, Default, Debug)]
pub struct ChunkGrids {
    assets: FxHashMap<ChunkId, GridAsset>,
    owners: FxHashMap<Entity, ChunkId>,
    generations: FxHashMap<ChunkId, u32>,
    dirty: FxHashSet<ChunkId>,
    lifecycle: LifecycleStats,
}

impl ChunkGrids {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the grid for `chunk` from `obstacles` and stores it, replacing any previous grid.
    pub fn build<'a>(
        &mut self,
        chunk: ChunkId,
        obstacles: impl IntoIterator<Item = &'a StaticObstacle>,
        settings: &NavSettings,
    ) -> GridStats {
        let asset = GridAsset::build(chunk, obstacles, settings);
        let stats = asset.stats();
        let generation = self.insert(asset);

        log::debug!(
            "Built grid for chunk {} (generation {}): {} walkable, {} blocked, {} obstacles",
            chunk,
            generation,
            stats.walkable,
            stats.blocked,
            stats.obstacles
        );

        stats
    }

    /// Stores a grid, releasing the previous grid of the same chunk if there was one.
    /// Returns the generation the grid was tagged with.
    pub fn insert(&mut self, asset: GridAsset) -> u32 {
        let chunk = asset.chunk();
        let generation = self
            .generations
            .get(&chunk)
            .map_or(0, |generation| generation + 1);

        drop(self.release(chunk));

        self.generations.insert(chunk, generation);
        self.dirty.remove(&chunk);
        self.assets.insert(chunk, asset.with_generation(generation));
        self.lifecycle.built += 1;

        generation
    }

    /// Builds a grid owned by a chunk entity. The grid is released when the owner is.
    pub(crate) fn build_owned<'a>(
        &mut self,
        owner: Entity,
        chunk: ChunkId,
        obstacles: impl IntoIterator<Item = &'a StaticObstacle>,
        settings: &NavSettings,
    ) -> GridStats {
        self.owners.insert(owner, chunk);
        self.build(chunk, obstacles, settings)
    }

    /// Removes the grid of `chunk` and hands ownership back to the caller.
    ///
    /// Returns `None` if the chunk has no grid, so releasing twice is a no-op.
    pub fn release(&mut self, chunk: ChunkId) -> Option<GridAsset> {
        let asset = self.assets.remove(&chunk)?;
        self.lifecycle.released += 1;

        log::debug!(
            "Released grid for chunk {} (generation {})",
            chunk,
            asset.generation()
        );

        Some(asset)
    }

    /// Releases the grid owned by a chunk entity, if any.
    ///
    /// A grid shared with another entity for the same chunk stays until its last owner
    /// is released.
    pub(crate) fn release_owner(&mut self, owner: Entity) -> Option<GridAsset> {
        let chunk = self.owners.remove(&owner)?;
        if self.owners.values().any(|&owned| owned == chunk) {
            return None;
        }

        self.dirty.remove(&chunk);
        self.release(chunk)
    }

    /// The chunk whose grid is owned by `owner`.
    pub(crate) fn owner_of(&self, owner: Entity) -> Option<ChunkId> {
        self.owners.get(&owner).copied()
    }

    /// Flags a chunk's grid for rebuilding at the next grid phase.
    /// Chunks without a grid are ignored; they are built fresh when they load.
    pub fn mark_dirty(&mut self, chunk: ChunkId) {
        if self.assets.contains_key(&chunk) {
            self.dirty.insert(chunk);
        }
    }

    /// Whether a chunk is waiting for a rebuild.
    pub fn is_dirty(&self, chunk: ChunkId) -> bool {
        self.dirty.contains(&chunk)
    }

    /// Returns the grid of a chunk.
    pub fn get(&self, chunk: ChunkId) -> Option<&GridAsset> {
        self.assets.get(&chunk)
    }

    /// Whether a chunk has a built grid.
    pub fn contains(&self, chunk: ChunkId) -> bool {
        self.assets.contains_key(&chunk)
    }

    /// Number of live grids.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if no grids are built.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Ids of every chunk with a grid.
    pub fn chunk_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.assets.keys().copied()
    }

    /// Build and release totals.
    pub fn lifecycle(&self) -> LifecycleStats {
        self.lifecycle
    }

    /// Whether a cell exists in a built grid and is walkable.
    /// Cells of chunks without a grid count as blocked.
    #[inline(always)]
    pub fn is_walkable(&self, coord: GridCoord) -> bool {
        self.assets
            .get(&coord.chunk)
            .is_some_and(|grid| grid.is_walkable(coord.cell))
    }

    /// Finds a smoothed path between two world positions across all built grids.
    ///
    /// # Arguments
    /// * `neighborhood` - The [`Neighborhood`] used for movement.
    /// * `start` - World position to start from.
    /// * `target` - World position to reach.
    /// * `max_length` - Longest raw cell path accepted.
    /// * `settings` - The [`NavSettings`] the grids were built with.
    pub fn find_path<N: Neighborhood>(
        &self,
        neighborhood: &N,
        start: Vec2,
        target: Vec2,
        max_length: usize,
        settings: &NavSettings,
    ) -> Result<Path, PathError> {
        find_path(neighborhood, self, start, target, max_length, settings)
    }
}
