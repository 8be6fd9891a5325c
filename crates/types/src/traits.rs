//! Async traits shared across all magpie crates.
//!
//! Cross-crate abstractions live here so that higher layers depend only on
//! `magpie-types`, not on each other.

use async_trait::async_trait;

pub use crate::error::Result;

/// Supplies bearer tokens for authenticated API calls.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer token with enough remaining validity for one request,
    /// refreshing it first if necessary.
    async fn get_token(&self) -> Result<String>;
}
