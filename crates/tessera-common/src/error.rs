//! Error types for tessera-common.

use thiserror::Error;

/// Common error type for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or slice extended past the end of its segment.
    #[error("out of bounds: {len} bytes at offset {offset} but only {available} available")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// Offset or length arithmetic overflowed.
    #[error("offset arithmetic overflow: {offset} + {len}")]
    Overflow { offset: usize, len: usize },

    /// A tag contained non-ASCII bytes.
    #[error("invalid tag bytes: {0:02x?}")]
    InvalidTag([u8; 4]),

    /// Destination buffer too small for a raw copy.
    #[error("copy destination too small: need {needed} bytes, have {available}")]
    DestinationTooSmall { needed: usize, available: usize },

    /// Missing null terminator in string.
    #[error("string missing null terminator at offset {0}")]
    MissingNullTerminator(usize),

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
