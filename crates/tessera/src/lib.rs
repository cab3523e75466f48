//! Tessera - plugin cleaning and archive extraction.
//!
//! This crate ties the Tessera library crates together and adds the
//! configuration-driven cleaning pipeline.
//!
//! # Crates
//!
//! - [`tessera_common`] - tags, bounded byte cursors, Windows-1252, cancellation
//! - [`tessera_plugin`] - plugin codec, editable tree, addressing, patches, serializer
//! - [`tessera_bsa`] - BSA archive reading, extraction and path hashing
//!
//! # Example
//!
//! ```no_run
//! use tessera::prelude::*;
//!
//! let config = CleaningConfig::from_path("clean.json")?;
//! let instructions = config.instructions("Patch.esp")?;
//! let report = clean_file(
//!     "Data/Patch.esp".as_ref(),
//!     "out/Patch.esp".as_ref(),
//!     instructions,
//!     "Data".as_ref(),
//! )?;
//! println!("{} records removed", report.deleted);
//! # Ok::<(), tessera::Error>(())
//! ```

pub mod clean;
pub mod config;
mod error;

pub use tessera_bsa as bsa;
pub use tessera_common as common;
pub use tessera_plugin as plugin;

pub use clean::{clean_file, clean_plugin, load_donors, CleanReport};
pub use config::{CleaningConfig, EditInstructions, RecordId, StripField};
pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clean::{clean_file, clean_plugin, CleanReport};
    pub use crate::config::{CleaningConfig, EditInstructions, RecordId};
    pub use tessera_bsa::{extract_to_dir, hash_path, BsaArchive, BsaEntry};
    pub use tessera_common::{CancelToken, Tag};
    pub use tessera_plugin::{compute_deletions, serialize, ObjectIdentifier, Plugin};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
