//! Error types for pmstereo.

use thiserror::Error;

/// Result alias for pmstereo operations.
pub type PmsResult<T> = std::result::Result<T, PmsError>;

/// Errors that can occur when configuring or running the matcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PmsError {
    /// A width or height of zero was supplied.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A caller-supplied buffer is smaller than the required size.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// An input image does not match the matcher's configured size.
    #[error("dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// An option value violates its documented constraint.
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
}
