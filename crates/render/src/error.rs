use thiserror::Error;

/// Errors a tile generator can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The generator was configured with a degenerate tile size
    #[error("invalid tile size {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },

    /// The coordinate lies outside the area the generator can produce
    #[error("tile ({col}, {row}) is outside the source image")]
    OutOfSource { col: i32, row: i32 },

    /// Generation failed for another reason
    #[error("tile generation failed: {0}")]
    Failed(String),
}

/// Result type for tile generation
pub type RenderResult<T> = Result<T, RenderError>;
