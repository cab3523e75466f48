//! Reader for BSA archives (versions 103 and 104).
//!
//! The index is parsed when the archive is opened. File data is read
//! lazily in index order; compressed payloads are inflated on demand,
//! either by the caller, in parallel with [`BsaArchive::extract_all`], or
//! by the worker pool behind [`extract_to_dir`].
//!
//! ```no_run
//! use tessera_bsa::{extract_to_dir, BsaArchive};
//! use tessera_common::CancelToken;
//!
//! let mut archive = BsaArchive::open("Textures.bsa")?;
//! for entry in archive.list() {
//!     println!("{} ({} bytes)", entry.path, entry.size);
//! }
//! let stats = extract_to_dir(&mut archive, "out".as_ref(), &CancelToken::new())?;
//! println!("{} files", stats.extracted);
//! # Ok::<(), tessera_bsa::Error>(())
//! ```

mod archive;
mod decompress;
mod error;
mod extract;
pub mod hash;
pub mod header;

pub use archive::{BsaArchive, BsaEntry, Entries, ExtractedFile};
pub use decompress::{inflate_payload, DeferredPayload};
pub use error::{Error, Result};
pub use extract::{extract_to_dir, output_path, ExtractStats};
pub use hash::{hash_bytes, hash_path};
