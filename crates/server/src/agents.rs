//! Agent listing handler: resolved model and tool surface per agent.

use axum::{Json, extract::State};
use magpie_tools::tools_for;
use magpie_types::AgentKind;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::AppState;

/// Handles `GET /v1/agents`.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Value> {
    let models = &state.config.models;
    let data: Vec<Value> = AgentKind::all()
        .iter()
        .map(|&agent| {
            let model = models.resolve(agent);
            json!({
                "id": agent.to_string(),
                "model": models.params_for(&model),
                "tools": tools_for(agent),
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "strategy": models.strategy,
        "data": data,
    }))
}
