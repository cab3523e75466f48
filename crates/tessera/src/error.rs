//! Error type for the cleaning pipeline.

use thiserror::Error;

/// Errors raised while loading configuration or cleaning a plugin.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Plugin(#[from] tessera_plugin::Error),

    #[error(transparent)]
    Archive(#[from] tessera_bsa::Error),

    /// Malformed edit instructions.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration has no entry for a plugin.
    #[error("no instructions for plugin {0}")]
    MissingInstructions(String),
}

pub type Result<T> = std::result::Result<T, Error>;
