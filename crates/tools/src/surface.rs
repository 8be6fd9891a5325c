//! Which tools each agent is given.

use crate::{ToolCall, ToolSpec};
use magpie_types::AgentKind;

const DATA_SCIENTIST_TOOLS: &[&str] = &[
    "list_clusters",
    "get_cluster",
    "start_cluster",
    "terminate_cluster",
    "execute_sql",
    "list_warehouses",
    "list_jobs",
    "get_job",
    "run_job",
];

const DATABRICKS_QUERY_TOOLS: &[&str] = &[
    "execute_sql",
    "get_statement",
    "cancel_statement",
    "list_warehouses",
    "get_warehouse",
];

/// Tool names exposed to `agent`. Agents that do not touch the workspace get
/// none.
#[must_use]
pub fn tools_for(agent: AgentKind) -> &'static [&'static str] {
    match agent {
        AgentKind::DataScientist => DATA_SCIENTIST_TOOLS,
        AgentKind::DatabricksQuery => DATABRICKS_QUERY_TOOLS,
        AgentKind::MasterCoordinator
        | AgentKind::EngineeringProcess
        | AgentKind::GeneralChat
        | AgentKind::QueryEnhancement => &[],
    }
}

/// Catalogue entries for the tools exposed to `agent`.
#[must_use]
pub fn catalog_for(agent: AgentKind) -> Vec<&'static ToolSpec> {
    tools_for(agent)
        .iter()
        .filter_map(|name| ToolCall::spec(name))
        .collect()
}
