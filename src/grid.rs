//! This module contains the `GridAsset`, the immutable walkability bitmap of one chunk.
use bevy::math::{UVec2, Vec2};
use ndarray::{Array2, ArrayView2, Zip};

use crate::{
    chunk::{chunk_bounds, ChunkId},
    obstacle::StaticObstacle,
    settings::NavSettings,
};

/// Cell value for walkable cells.
pub const WALKABLE: u8 = 0;
/// Cell value for blocked cells.
pub const BLOCKED: u8 = 1;

/// Aggregate counts collected while rasterizing a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    /// Number of walkable cells.
    pub walkable: usize,
    /// Number of blocked cells.
    pub blocked: usize,
    /// Number of obstacles that touched the chunk.
    pub obstacles: usize,
}

/// Walkability bitmap for a single chunk.
///
/// The asset is move-only. It can't be cloned and its cells can't be changed once built;
/// rebuilding a chunk means building a new asset and dropping the old one.
#[derive(Debug, PartialEq, Eq)]
pub struct GridAsset {
    chunk: ChunkId,
    cells: Array2<u8>,
    generation: u32,
    stats: GridStats,
}

impl GridAsset {
    /// Rasterizes `obstacles` into a new grid for `chunk`.
    ///
    /// Every obstacle whose radius plus the configured margin overlaps the chunk bounds is
    /// considered. A cell is blocked when its center lies inside any of them.
    ///
    /// # Example
    /// ```
    /// use bevy::math::{IVec2, UVec2, Vec2};
    /// use bevy_chunk_nav::prelude::*;
    ///
    /// let settings = NavSettings::default();
    /// let rock = StaticObstacle::new(Vec2::new(50.0, 50.0), 5.0, ObstacleKind::Rock).unwrap();
    /// let grid = GridAsset::build(IVec2::ZERO, &[rock], &settings);
    ///
    /// assert!(!grid.is_walkable(UVec2::new(32, 32)));
    /// assert!(grid.is_walkable(UVec2::new(0, 0)));
    /// ```
    pub fn build<'a>(
        chunk: ChunkId,
        obstacles: impl IntoIterator<Item = &'a StaticObstacle>,
        settings: &NavSettings,
    ) -> Self {
        let bounds = chunk_bounds(chunk, settings.chunk_size());
        let relevant: Vec<&StaticObstacle> = obstacles
            .into_iter()
            .filter(|obstacle| obstacle.influences(bounds, settings.obstacle_margin()))
            .collect();

        let size = settings.grid_size() as usize;
        let cell_size = settings.cell_size();
        let origin = bounds.min;

        let mut cells = Array2::from_elem((size, size), WALKABLE);

        let rasterize = |(x, y): (usize, usize), cell: &mut u8| {
            let center = origin + (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * cell_size;
            if relevant.iter().any(|obstacle| obstacle.contains(center)) {
                *cell = BLOCKED;
            }
        };

        timed!("Rasterized chunk grid", {
            #[cfg(feature = "parallel")]
            Zip::indexed(&mut cells).par_for_each(rasterize);

            #[cfg(not(feature = "parallel"))]
            Zip::indexed(&mut cells).for_each(rasterize);
        });

        let mut grid = Self::from_cells(chunk, cells);
        grid.stats.obstacles = relevant.len();
        grid
    }

    /// Wraps an existing square bitmap. Any non-zero cell is treated as blocked.
    ///
    /// Useful for hand-authored maps and tests. The bitmap must be square and match the
    /// grid size of the [`NavSettings`] it will be searched with.
    pub fn from_cells(chunk: ChunkId, mut cells: Array2<u8>) -> Self {
        assert_eq!(cells.nrows(), cells.ncols(), "Chunk grids must be square");

        cells.mapv_inplace(|cell| if cell == WALKABLE { WALKABLE } else { BLOCKED });

        let blocked = cells.iter().filter(|&&cell| cell == BLOCKED).count();
        let stats = GridStats {
            walkable: cells.len() - blocked,
            blocked,
            obstacles: 0,
        };

        GridAsset {
            chunk,
            cells,
            generation: 0,
            stats,
        }
    }

    /// Tags the asset with the rebuild generation of its chunk.
    pub(crate) fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// The chunk this grid belongs to.
    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    /// Number of cells along each side.
    pub fn size(&self) -> u32 {
        self.cells.nrows() as u32
    }

    /// How many times the chunk's grid has been rebuilt before this one.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Rasterization statistics.
    pub fn stats(&self) -> GridStats {
        self.stats
    }

    /// Read-only view of the raw cells, indexed `[[x, y]]`.
    pub fn view(&self) -> ArrayView2<u8> {
        self.cells.view()
    }

    /// Whether a cell is walkable. Out of range cells are not.
    #[inline(always)]
    pub fn is_walkable(&self, cell: UVec2) -> bool {
        self.cells
            .get((cell.x as usize, cell.y as usize))
            .is_some_and(|&value| value == WALKABLE)
    }
}
