//! Tile generation capability
//!
//! The cache asks a [`TileGenerator`] for content whenever a tile is missing.
//! Generators receive absolute tile coordinates and may be arbitrarily
//! expensive; they must be safe to call again for the same coordinate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::tile::{Tile, TileCoord, TILE_SIZE};

/// Produces tile content on demand
pub trait TileGenerator: Send + Sync {
    /// Produce the tile at `coord`
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile>;
}

impl<G: TileGenerator + ?Sized> TileGenerator for Arc<G> {
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile> {
        (**self).generate(coord)
    }
}

impl<G: TileGenerator + ?Sized> TileGenerator for Box<G> {
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile> {
        (**self).generate(coord)
    }
}

/// Generator backed by a closure
///
/// # Example
///
/// ```
/// use tilestore_render::{FnGenerator, Tile, TileCoord, TileGenerator};
///
/// let generator = FnGenerator::new(|coord: TileCoord| {
///     let shade = (coord.col + coord.row).rem_euclid(256) as u8;
///     Ok(Tile::filled(16, 16, [shade, shade, shade, 255]))
/// });
///
/// let tile = generator.generate(TileCoord::new(3, 4)).unwrap();
/// assert_eq!(tile.pixels()[0], 7);
/// ```
pub struct FnGenerator<F> {
    f: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(TileCoord) -> RenderResult<Tile> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TileGenerator for FnGenerator<F>
where
    F: Fn(TileCoord) -> RenderResult<Tile> + Send + Sync,
{
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile> {
        (self.f)(coord)
    }
}

/// Deterministic two-color test pattern
///
/// Each tile is a solid square whose color alternates with the parity of
/// `col + row`, so neighbouring tiles are always distinguishable.
#[derive(Debug, Clone)]
pub struct CheckerboardGenerator {
    tile_size: u32,
    light: [u8; 4],
    dark: [u8; 4],
}

impl CheckerboardGenerator {
    /// Create a checkerboard with the default tile size and gray squares
    pub fn new() -> Self {
        Self {
            tile_size: TILE_SIZE,
            light: [0xEE, 0xEE, 0xEE, 0xFF],
            dark: [0x99, 0x99, 0x99, 0xFF],
        }
    }

    /// Use a custom tile edge length
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Use custom square colors
    pub fn with_colors(mut self, light: [u8; 4], dark: [u8; 4]) -> Self {
        self.light = light;
        self.dark = dark;
        self
    }

    /// Tile edge length in pixels
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Color chosen for a coordinate
    pub fn color_at(&self, coord: TileCoord) -> [u8; 4] {
        if (coord.col as i64 + coord.row as i64).rem_euclid(2) == 0 {
            self.light
        } else {
            self.dark
        }
    }
}

impl Default for CheckerboardGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TileGenerator for CheckerboardGenerator {
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile> {
        if self.tile_size == 0 {
            return Err(RenderError::InvalidTileSize {
                width: self.tile_size,
                height: self.tile_size,
            });
        }
        Ok(Tile::filled(
            self.tile_size,
            self.tile_size,
            self.color_at(coord),
        ))
    }
}

/// Decorator that counts how often the inner generator runs
///
/// Failed invocations are counted too.
pub struct CountingGenerator<G> {
    inner: G,
    calls: AtomicU64,
}

impl<G: TileGenerator> CountingGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `generate` calls so far
    pub fn count(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    /// Reset the counter to zero
    pub fn reset(&self) {
        self.calls.store(0, Ordering::Release);
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: TileGenerator> TileGenerator for CountingGenerator<G> {
    fn generate(&self, coord: TileCoord) -> RenderResult<Tile> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.inner.generate(coord)
    }
}
