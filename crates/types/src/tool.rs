//! The uniform result shape handed back to the agent framework.

use crate::MagpieError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a tool invocation.
///
/// Serializes as `{"status": "success", "data": …}` or
/// `{"status": "error", "error": "…"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { data: Value },
    Error { error: String },
}

impl ToolResult {
    pub fn success(data: impl Into<Value>) -> Self {
        Self::Success { data: data.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The payload of a successful result.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// The message of a failed result.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }

    /// Serialize into the JSON mapping the tool-calling interface expects.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Success { data } => serde_json::json!({"status": "success", "data": data}),
            Self::Error { error } => serde_json::json!({"status": "error", "error": error}),
        }
    }
}

impl<T: Into<Value>> From<Result<T, MagpieError>> for ToolResult {
    fn from(res: Result<T, MagpieError>) -> Self {
        match res {
            Ok(data) => Self::success(data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}
