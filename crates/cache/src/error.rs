use thiserror::Error;
use tilestore_render::RenderError;

/// Errors returned by tile grid operations
///
/// Out-of-bounds coordinates are not an error; they read as absent.
#[derive(Debug, Error)]
pub enum TileError {
    /// The generator could not produce the requested tile
    #[error("failed to generate tile ({col}, {row})")]
    GenerationFailed {
        col: i32,
        row: i32,
        #[source]
        source: RenderError,
    },
}

/// Result type for tile grid operations
pub type TileResult<T> = Result<T, TileError>;
