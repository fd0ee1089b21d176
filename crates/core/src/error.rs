//! Error types for plyraster

use thiserror::Error;

/// Main error type for plyraster operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty input: {context}")]
    EmptyInput { context: String },

    #[error("Channel count mismatch in {cloud}: expected {expected} extra columns, got {found}")]
    ChannelMismatch {
        cloud: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("CRS resolution failed: {0}")]
    MetadataResolution(String),

    #[error("Malformed PLY file {path}: {reason}")]
    PlyFormat { path: String, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Grid size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::EmptyInput`]
    pub fn empty_input(context: impl Into<String>) -> Self {
        Error::EmptyInput {
            context: context.into(),
        }
    }

    /// Shorthand for [`Error::PlyFormat`]
    pub fn ply(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Error::PlyFormat {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for plyraster operations
pub type Result<T> = std::result::Result<T, Error>;
