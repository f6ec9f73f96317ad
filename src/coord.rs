//! `GridCoord` addresses one cell of the infinite grid tiled by chunks.
use bevy::math::{IVec2, UVec2, Vec2};

use crate::{
    chunk::{chunk_id_at, ChunkId},
    settings::NavSettings,
};

/// A cell in the tiled world grid: the chunk it belongs to and its cell inside that chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub chunk: ChunkId,
    pub cell: UVec2,
}

impl GridCoord {
    pub fn new(chunk: ChunkId, cell: UVec2) -> Self {
        GridCoord { chunk, cell }
    }

    /// Converts a world position to the cell containing it.
    pub fn from_world(pos: Vec2, settings: &NavSettings) -> Self {
        let chunk = chunk_id_at(pos, settings.chunk_size());
        let local = pos - chunk.as_vec2() * settings.chunk_size();
        let max = settings.grid_size() as i32 - 1;
        // Float error at the far edge can land exactly on grid_size.
        let cell = (local / settings.cell_size())
            .floor()
            .as_ivec2()
            .clamp(IVec2::ZERO, IVec2::splat(max))
            .as_uvec2();

        GridCoord { chunk, cell }
    }

    /// World position of the cell's center.
    pub fn to_world(self, settings: &NavSettings) -> Vec2 {
        self.chunk.as_vec2() * settings.chunk_size()
            + (self.cell.as_vec2() + Vec2::splat(0.5)) * settings.cell_size()
    }

    /// Position in the global cell index space, `chunk * grid_size + cell`.
    #[inline(always)]
    pub fn global(self, grid_size: u32) -> IVec2 {
        self.chunk * grid_size as i32 + self.cell.as_ivec2()
    }

    /// Inverse of [`GridCoord::global`].
    #[inline(always)]
    pub fn from_global(global: IVec2, grid_size: u32) -> Self {
        let size = grid_size as i32;
        GridCoord {
            chunk: IVec2::new(global.x.div_euclid(size), global.y.div_euclid(size)),
            cell: IVec2::new(global.x.rem_euclid(size), global.y.rem_euclid(size)).as_uvec2(),
        }
    }

    /// The cell `offset` steps away. Leaving the chunk wraps the cell index and
    /// moves into the neighboring chunk.
    #[inline(always)]
    pub fn offset(self, offset: IVec2, grid_size: u32) -> Self {
        let size = grid_size as i32;
        let x = self.cell.x as i32 + offset.x;
        let y = self.cell.y as i32 + offset.y;

        GridCoord {
            chunk: self.chunk + IVec2::new(x.div_euclid(size), y.div_euclid(size)),
            cell: UVec2::new(x.rem_euclid(size) as u32, y.rem_euclid(size) as u32),
        }
    }
}
