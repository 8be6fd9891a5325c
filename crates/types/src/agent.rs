//! Agent identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an LLM agent of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    MasterCoordinator,
    EngineeringProcess,
    GeneralChat,
    DataScientist,
    QueryEnhancement,
    DatabricksQuery,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MasterCoordinator => write!(f, "master_coordinator"),
            Self::EngineeringProcess => write!(f, "engineering_process_procedure_agent"),
            Self::GeneralChat => write!(f, "general_chat_agent"),
            Self::DataScientist => write!(f, "data_scientist_agent"),
            Self::QueryEnhancement => write!(f, "query_enhancement_agent"),
            Self::DatabricksQuery => write!(f, "databricks_query_agent"),
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = crate::MagpieError;

    /// Parse an agent name or well-known alias into an [`AgentKind`].
    ///
    /// Names are matched case-insensitively with `-` treated as `_`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] if the string does not match any
    /// known agent name or alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "master_coordinator" | "coordinator" => Ok(Self::MasterCoordinator),
            "engineering_process_procedure_agent" | "engineering_process" | "engineering" => {
                Ok(Self::EngineeringProcess)
            }
            "general_chat_agent" | "general_chat" => Ok(Self::GeneralChat),
            "data_scientist_agent" | "data_scientist" => Ok(Self::DataScientist),
            "query_enhancement_agent" | "query_enhancement" | "queryenhancementagent" => {
                Ok(Self::QueryEnhancement)
            }
            "databricks_query_agent" | "databricks_query" | "databricksqueryagent" => {
                Ok(Self::DatabricksQuery)
            }
            _ => Err(crate::MagpieError::Validation(format!("unknown agent: {s}"))),
        }
    }
}

impl AgentKind {
    /// Returns all known agent variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::MasterCoordinator,
            Self::EngineeringProcess,
            Self::GeneralChat,
            Self::DataScientist,
            Self::QueryEnhancement,
            Self::DatabricksQuery,
        ]
    }

    /// Environment variable holding the agent-specific model identifier.
    #[must_use]
    pub fn model_env_var(self) -> &'static str {
        match self {
            Self::MasterCoordinator => "MASTER_COORDINATOR_MODEL",
            Self::EngineeringProcess => "ENGINEERING_PROCESS_AGENT_MODEL",
            Self::GeneralChat => "GENERAL_CHAT_AGENT_MODEL",
            Self::DataScientist => "DATA_SCIENTIST_AGENT_MODEL",
            Self::QueryEnhancement => "QUERY_ENHANCEMENT_AGENT_MODEL",
            Self::DatabricksQuery => "DATABRICKS_QUERY_AGENT_MODEL",
        }
    }
}
