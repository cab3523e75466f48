//! Common utilities for Tessera.
//!
//! This crate provides foundational types used across all Tessera crates:
//!
//! - [`Tag`] - Packed four-character record/field/group discriminators
//! - [`Segment`] and [`Cursor`] - Bounds-checked, zero-copy views of a byte buffer
//! - [`cp1252`] - Windows-1252 string decoding for archive names
//! - [`CancelToken`] - Cooperative cancellation for long-running work

mod cancel;
mod error;
mod segment;
mod tag;

pub mod cp1252;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use segment::{Cursor, Segment};
pub use tag::Tag;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
