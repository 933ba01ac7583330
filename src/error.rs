//! Error types for viewport.

use thiserror::Error;

use crate::backend::SurfaceError;

/// Result type alias using viewport's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for viewport operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame geometry is invalid (zero or odd YUV dimensions).
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),

    /// A caller-supplied buffer is too small for the stated geometry.
    #[error("buffer too small: {actual} < {expected}")]
    ShortBuffer {
        /// Bytes provided.
        actual: usize,
        /// Bytes required.
        expected: usize,
    },

    /// Backend surface failure.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// The render thread panicked and could not be joined cleanly.
    #[error("render thread panicked")]
    ThreadPanicked,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
