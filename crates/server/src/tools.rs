//! Tool listing and invocation handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use magpie_tools::{ToolCall, ToolSpec, catalog_for};
use magpie_types::{AgentKind, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{sync::Arc, time::Instant};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ToolsQuery {
    agent: Option<String>,
}

/// Handles `GET /v1/tools`.
///
/// With `?agent=<name>` only the tools exposed to that agent are listed.
pub async fn list_tools(Query(query): Query<ToolsQuery>) -> Result<Json<Value>, ApiError> {
    let tools: Vec<&ToolSpec> = match query.agent.as_deref() {
        Some(agent) => catalog_for(agent.parse::<AgentKind>()?),
        None => ToolCall::catalog().iter().collect(),
    };
    Ok(Json(json!({
        "object": "list",
        "data": tools,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    tool: String,
    #[serde(default)]
    params: Value,
}

/// Handles `POST /v1/tools/call`.
///
/// A malformed call is rejected with 400. Once dispatched, the outcome is
/// always a [`ToolResult`], failures included.
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallRequest>,
) -> Result<Json<ToolResult>, ApiError> {
    let call = ToolCall::parse(&req.tool, req.params)?;
    let tool = call.name();

    let started = Instant::now();
    let result = state.toolbox.invoke(call).await;
    let elapsed = started.elapsed();
    if result.is_success() {
        state.stats.record_success(tool, elapsed);
    } else {
        state.stats.record_failure(tool, elapsed);
    }
    tracing::info!(
        tool,
        success = result.is_success(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "tool call finished"
    );
    Ok(Json(result))
}
