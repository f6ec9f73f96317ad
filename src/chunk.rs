//! This module defines the `Chunk` component, a square region of the world.
use bevy::{
    math::{IVec2, Rect, Vec2},
    prelude::Component,
};

/// Integer id of a chunk. The chunk covers `id * chunk_size .. (id + 1) * chunk_size`.
pub type ChunkId = IVec2;

/// Streaming state of a chunk as reported by the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum ChunkState {
    /// Not resident.
    #[default]
    Unloaded,
    /// Terrain and obstacles are still being placed.
    Generating,
    /// Fully resident, a grid can be built.
    Loaded,
    /// Resident but its contents changed, the grid must be rebuilt.
    Dirty,
    /// About to be removed.
    Unloading,
}

impl ChunkState {
    /// Whether a grid should exist for a chunk in this state.
    pub fn is_navigable(self) -> bool {
        matches!(self, ChunkState::Loaded | ChunkState::Dirty)
    }
}

/// A square region of the world. Spawned and despawned by chunk streaming.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Chunk {
    id: ChunkId,
    origin: Vec2,
    size: f32,
    /// Current streaming state. Written by the streaming layer.
    pub state: ChunkState,
}

impl Chunk {
    /// Creates a chunk. The origin is derived from the id and side length.
    pub fn new(id: ChunkId, size: f32, state: ChunkState) -> Self {
        Chunk {
            id,
            origin: id.as_vec2() * size,
            size,
            state,
        }
    }

    /// Creates a chunk already in the [`ChunkState::Loaded`] state.
    pub fn loaded(id: ChunkId, size: f32) -> Self {
        Self::new(id, size, ChunkState::Loaded)
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// World position of the chunk's minimum corner.
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// World bounds of the chunk.
    pub fn bounds(&self) -> Rect {
        chunk_bounds(self.id, self.size)
    }
}

/// Chunk containing a world position.
pub fn chunk_id_at(pos: Vec2, chunk_size: f32) -> ChunkId {
    (pos / chunk_size).floor().as_ivec2()
}

/// World bounds of a chunk id.
pub fn chunk_bounds(id: ChunkId, chunk_size: f32) -> Rect {
    let min = id.as_vec2() * chunk_size;
    Rect::from_corners(min, min + Vec2::splat(chunk_size))
}

/// All chunk ids overlapped by a circle, widened by `margin`.
pub(crate) fn chunks_overlapping(
    center: Vec2,
    radius: f32,
    margin: f32,
    chunk_size: f32,
) -> impl Iterator<Item = ChunkId> {
    let reach = Vec2::splat(radius + margin);
    let min = chunk_id_at(center - reach, chunk_size);
    let max = chunk_id_at(center + reach, chunk_size);

    (min.x..=max.x).flat_map(move |x| (min.y..=max.y).map(move |y| IVec2::new(x, y)))
}
