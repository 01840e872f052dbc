//! Error types for the hunter.

use crate::openstack::ProviderError;
use thiserror::Error;

/// Errors outside the per-iteration provider calls.
#[derive(Debug, Error)]
pub enum HunterError {
    /// Config is missing required parts or cannot be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Stats database failure.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No account could connect and resolve its VM, port and network.
    #[error("No usable accounts: {0}")]
    NoAccounts(String),

    /// Provider failure outside the hunt loop (connect, subnet listing).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HunterError>;
