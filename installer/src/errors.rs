//! Error types for the installer

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Resolution failed: missing metadata, version or file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or transfer error
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    /// Supervised application did not signal readiness within its budget
    #[error("Process timeout: {0}")]
    ProcessTimeout(String),

    /// Manifest references a key missing from the installer registry
    #[error("Unresolved installer: {0}")]
    UnresolvedInstaller(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InstallerError {
    /// Every error is recoverable at the item boundary; this tells skips from failures
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            InstallerError::NotFound(_) | InstallerError::UnresolvedInstaller(_)
        )
    }
}

impl From<anyhow::Error> for InstallerError {
    fn from(err: anyhow::Error) -> Self {
        InstallerError::Internal(err.to_string())
    }
}
