//! Error types for plugin decoding, editing and encoding.

use tessera_common::Tag;
use thiserror::Error;

/// Errors that can occur when working with plugin files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error (bounds, overflow, cancellation).
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// A header was cut short by the end of input.
    #[error("truncated header at offset {offset}: read {read} of 24 bytes")]
    TruncatedHeader { offset: u64, read: usize },

    /// A group header did not carry the group tag.
    #[error("expected group tag at offset {offset}, got {actual}")]
    InvalidGroupTag { offset: usize, actual: Tag },

    /// A group declared a size smaller than its own header.
    #[error("group at offset {offset} declares size {size}, smaller than its header")]
    GroupTooSmall { offset: usize, size: u32 },

    /// A declared size ran past the enclosing block.
    #[error("{kind} at offset {offset} declares {declared} bytes but only {available} remain")]
    SizeOverrun {
        kind: &'static str,
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The first block of a plugin was not a record.
    #[error("plugin does not start with a header record")]
    MissingHeaderRecord,

    /// A bare record appeared at top level after the header.
    #[error("unexpected top-level record {tag} at offset {offset}")]
    UnexpectedTopLevelRecord { offset: u64, tag: Tag },

    /// A length-override field was not followed by a field.
    #[error("length override at offset {offset} is not followed by a field")]
    DanglingLengthOverride { offset: usize },

    /// A group reader accessor was used in the wrong state.
    #[error("group reader is in state {actual:?}, expected {expected:?}")]
    ReaderState {
        expected: crate::codec::ReaderState,
        actual: crate::codec::ReaderState,
    },

    /// Decompression error.
    #[error("decompression error in record {id:#010x}: {message}")]
    Decompression { id: u32, message: String },

    /// Compression error.
    #[error("compression error in record {id:#010x}: {message}")]
    Compression { id: u32, message: String },

    /// Decompressed size did not match the stored prefix.
    #[error("record {id:#010x} decompressed to {actual} bytes, expected {expected}")]
    DecompressedSizeMismatch { id: u32, expected: usize, actual: usize },

    /// A serialized size does not fit its 32-bit header field.
    #[error("serialized size {0} exceeds 32-bit limit")]
    TooLarge(usize),

    /// An identifier did not resolve against the tree.
    #[error("identifier does not resolve: {0}")]
    IdentifierNotFound(String),

    /// An edit targeted a node through a parent that cannot hold it.
    #[error("node {0} cannot be removed from its parent")]
    ParentMismatch(String),

    /// A record ID named by an edit instruction is not in the plugin.
    #[error("record {0:#010x} not found")]
    RecordNotFound(u32),

    /// No donor supplies the record needed to restore a deleted entry.
    #[error("no donor supplies record {0:#010x}")]
    DonorRecordMissing(u32),

    /// A donor failed to load, so its dependents cannot proceed.
    #[error("donor unavailable: {0}")]
    DonorUnavailable(String),

    /// A donor slot was published twice or is out of range.
    #[error("invalid donor slot {slot} (of {count})")]
    InvalidDonorSlot { slot: usize, count: usize },
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;
