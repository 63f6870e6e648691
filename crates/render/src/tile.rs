//! Tile payload and addressing types
//!
//! A tile is an opaque block of pixels produced by a [`TileGenerator`](crate::TileGenerator)
//! for one cell of a tile grid. The cache never interprets the pixels.

use serde::{Deserialize, Serialize};

/// Default tile edge length in pixels (256x256)
pub const TILE_SIZE: u32 = 256;

/// Bytes per pixel for the RGBA8 layout used by the stock generators
pub const BYTES_PER_PIXEL: usize = 4;

/// Absolute tile coordinate
///
/// Columns grow to the right and rows grow downward. Coordinates are signed
/// because grids may have an origin anywhere in tile space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from((col, row): (i32, i32)) -> Self {
        Self::new(col, row)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Rendered tile content
///
/// Immutable once produced. Tiles are shared as `Arc<Tile>`, so a cache hit
/// hands out the same allocation the generator produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Tile {
    /// Wrap a pixel buffer
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Create an RGBA8 tile filled with a single color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * BYTES_PER_PIXEL);
        for _ in 0..pixel_count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(pixels, width, height)
    }

    /// Raw pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width of the tile in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the tile in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Consume the tile and return its pixel buffer
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}
