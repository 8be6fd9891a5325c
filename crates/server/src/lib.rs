//! HTTP tool server: axum router, route handlers and error mapping.
//!
//! Lets agents that are not linked against this workspace list and call the
//! Databricks tools over JSON.

mod agents;
mod error;
pub mod stats;
mod tools;

pub use error::ApiError;
pub use stats::ToolStats;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use magpie_config::Config;
use magpie_tools::DatabricksToolbox;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub toolbox: Arc<DatabricksToolbox>,
    /// In-memory call statistics.
    pub stats: Arc<ToolStats>,
}

impl AppState {
    /// Creates a new shared application state wrapped in an `Arc`.
    pub fn new(config: Config, toolbox: DatabricksToolbox) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            toolbox: Arc::new(toolbox),
            stats: Arc::new(ToolStats::new()),
        })
    }
}

/// Build the full axum router.
///
/// Routes:
/// - GET  /healthz
/// - GET  /v1/tools[?agent=<name>]
/// - POST /v1/tools/call
/// - GET  /v1/agents
/// - GET  /v0/management/stats
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/tools", get(tools::list_tools))
        .route("/v1/tools/call", post(tools::call_tool))
        .route("/v1/agents", get(agents::list_agents))
        .route("/v0/management/stats", get(stats_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "workspace": state.toolbox.clients().clusters.http().base_url(),
    }))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snap = state.stats.snapshot();
    Json(serde_json::to_value(snap).unwrap_or_default())
}
