//! Plugin container codec, editable tree and patch operations.
//!
//! A plugin is a header record followed by nested groups of records, each
//! record carrying typed fields. This crate decodes that layout into an
//! owned tree, edits it, and writes it back with every size recomputed.
//!
//! # Layers
//!
//! - [`codec`] - header layouts, zero-copy views and the group reader
//! - [`tree`] - the owned [`Plugin`] / [`Record`] / [`Group`] / [`Field`] tree
//! - [`ident`] - structural identifiers and resolution
//! - [`diff`] - minimal deletion sets between two trees
//! - [`patch`] - delete, undelete-and-disable, optimize, sort, overrides
//! - [`merged`] - donor fan-in barrier
//! - [`write`] - serializer
//! - [`report`] - diagnostic comparison
//!
//! # Example
//!
//! ```no_run
//! use tessera_plugin::{patch, Plugin};
//!
//! let mut plugin = Plugin::open("Mod.esp")?;
//! patch::delete_records(&mut plugin, &[0x0001_2345])?;
//! plugin.write_to("Mod.cleaned.esp")?;
//! # Ok::<(), tessera_plugin::Error>(())
//! ```

pub mod codec;
pub mod diff;
mod error;
pub mod ident;
pub mod merged;
pub mod patch;
pub mod report;
pub mod tags;
pub mod tree;
pub mod write;

pub use codec::{flags, GroupType, ReaderState};
pub use diff::compute_deletions;
pub use error::{Error, Result};
pub use ident::{Node, NodeMut, ObjectIdentifier, Step};
pub use merged::{Donor, Merged, MergedDonors};
pub use tree::{Field, Group, NodeCounts, Plugin, Record};
pub use write::{serialize, write_plugin};
