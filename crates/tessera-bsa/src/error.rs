//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur when reading archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// Invalid archive magic bytes.
    #[error("invalid archive magic: expected {expected:02x?}, got {actual:02x?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Unsupported archive version.
    #[error("unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    /// Archive flags this reader does not handle.
    #[error("unsupported archive flags {flags:#x}: {reason}")]
    UnsupportedFlags { flags: u32, reason: &'static str },

    /// A declared length runs past the end of the stream.
    #[error("{what} at offset {offset:#x} declares {declared} bytes, only {available} remain")]
    SizeOverrun {
        what: &'static str,
        offset: u64,
        declared: u64,
        available: u64,
    },

    /// The header's file count disagrees with the folder records.
    #[error("header declares {declared} files, folder records list {found}")]
    FileCountMismatch { declared: u32, found: u64 },

    /// The index ended before all declared names were read.
    #[error("name table exhausted after {read} of {expected} file names")]
    NameTableExhausted { read: usize, expected: usize },

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// An extraction worker panicked.
    #[error("extraction worker panicked: {0}")]
    WorkerPanicked(String),

    /// Extraction was cancelled.
    #[error("extraction cancelled")]
    Cancelled,
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
