//! Core types and traits for the magpie workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! Databricks tool layer: the error type, agent identifiers, bearer token
//! representation, the uniform tool result and the token provider trait.

pub mod agent;
pub mod error;
pub mod token;
pub mod tool;
pub mod traits;

pub use agent::AgentKind;
pub use error::{MagpieError, Result};
pub use token::AccessToken;
pub use tool::ToolResult;
pub use traits::TokenProvider;
