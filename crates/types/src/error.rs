//! Unified error type for the magpie workspace.

use serde_json::Value;
use thiserror::Error;

/// Enumerates all error kinds that can occur across magpie crates.
#[derive(Debug, Error)]
pub enum MagpieError {
    /// A required parameter is missing or malformed. Raised before any
    /// network call is made.
    #[error("{0}")]
    Validation(String),

    /// Token acquisition failed: the identity provider rejected the
    /// credentials or could not be reached.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The remote API answered with a status of 400 or above.
    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        body: Value,
    },

    /// Connection failure or per-request timeout while reaching the remote API.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The sync bridge could not build or join its runtime.
    #[error("runtime error: {0}")]
    Runtime(String),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for MagpieError {
    /// reqwest's display text does not say why a request failed, so the
    /// cause is appended.
    fn from(e: reqwest::Error) -> Self {
        let cause = if e.is_timeout() {
            " (timed out)"
        } else if e.is_connect() {
            " (connection failed)"
        } else {
            ""
        };
        Self::Transport(format!("{e}{cause}"))
    }
}

impl MagpieError {
    /// Shorthand for a [`MagpieError::Validation`] naming a missing parameter.
    #[must_use]
    pub fn missing(param: &str) -> Self {
        Self::Validation(format!("{param} is required"))
    }

    /// HTTP status of the remote response, for [`MagpieError::Api`] only.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MagpieError>;
