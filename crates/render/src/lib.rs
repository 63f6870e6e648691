//! Tilestore Render Library
//!
//! Tile payloads, tile coordinates and the generator capability the tile
//! cache calls on a miss.

pub mod error;
pub mod generator;
pub mod tile;

pub use error::{RenderError, RenderResult};
pub use generator::{CheckerboardGenerator, CountingGenerator, FnGenerator, TileGenerator};
pub use tile::{Tile, TileCoord, BYTES_PER_PIXEL, TILE_SIZE};
