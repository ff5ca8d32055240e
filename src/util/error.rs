//! Error types for pyralign.

use thiserror::Error;

/// Result alias for pyralign operations.
pub type AlignResult<T> = std::result::Result<T, AlignError>;

/// Errors that can occur when preparing or running an alignment.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AlignError {
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is shorter than one row of samples.
    #[error("stride {stride} is smaller than row length {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer cannot hold the described image.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Alignment only operates on single-channel images.
    #[error("{which} image must be single channel, got {channels} channels")]
    NotSingleChannel {
        which: &'static str,
        channels: usize,
    },
    /// A supplied pyramid has no levels.
    #[error("image pyramid has no levels")]
    EmptyPyramid,
    /// An index was outside the valid range.
    #[error("{context} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// `align` was called before a successful `prepare`.
    #[error("aligner has not been prepared")]
    NotPrepared,
    /// Configuration values are out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    /// Image decoding failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}
