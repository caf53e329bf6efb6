//! Error types for amconfig Core

use thiserror::Error;

use crate::tenant::OrgId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid organization: {0}")]
    InvalidOrg(String),

    // Revision lookup and optimistic concurrency
    #[error("Could not find an alert configuration for org {0}")]
    ConfigNotFound(OrgId),

    #[error("The passed configuration hash does not match the latest hash for org {0}")]
    ConcurrencyConflict(OrgId),

    // Callback failures raised by callers of `save_with_callback`
    #[error("Save callback failed: {0}")]
    Callback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// True when no revision exists for the requested org
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ConfigNotFound(_))
    }

    /// True when a compare-and-swap update lost against another writer
    ///
    /// Callers should re-read the latest revision and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
