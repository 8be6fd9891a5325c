//! SQL Statement Execution and Warehouses APIs.
//!
//! A submitted statement may still be running when the submit call returns;
//! [`SqlClient::execute_statement`] then polls the statement resource until it
//! reaches a terminal state or the poll ceiling.

use crate::{
    http::{ApiRequest, DatabricksHttp},
    poll::{PollPolicy, poll_until},
    require,
};
use magpie_types::{MagpieError, traits::Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Statement states after which the result no longer changes.
pub const TERMINAL_STATEMENT_STATES: [&str; 4] = ["SUCCEEDED", "FAILED", "CANCELED", "CLOSED"];

const PENDING_STATES: [&str; 2] = ["PENDING", "RUNNING"];

pub const DEFAULT_STATEMENT_POLL: PollPolicy =
    PollPolicy::new(Duration::from_secs(2), Duration::from_secs(300));

/// `status.state` of a statement response.
#[must_use]
pub fn statement_state(resp: &Value) -> Option<&str> {
    resp.pointer("/status/state").and_then(Value::as_str)
}

/// Named parameter of a parameterized statement (`:name` markers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementParameter {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// A statement submission.
#[derive(Debug, Clone, Serialize, bon::Builder)]
pub struct StatementRequest {
    #[builder(into)]
    pub statement: String,
    /// Falls back to the client's default warehouse when absent.
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub parameters: Vec<StatementParameter>,
}

#[derive(Debug)]
pub struct SqlClient {
    http: DatabricksHttp,
    default_warehouse: Option<String>,
    wait_timeout: String,
    poll: PollPolicy,
}

impl SqlClient {
    #[must_use]
    pub fn new(http: DatabricksHttp, default_warehouse: Option<String>) -> Self {
        Self {
            http,
            default_warehouse: default_warehouse.filter(|w| !w.trim().is_empty()),
            wait_timeout: "30s".to_string(),
            poll: DEFAULT_STATEMENT_POLL,
        }
    }

    #[must_use]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Server-side wait sent with each submission, e.g. `"30s"`.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: impl Into<String>) -> Self {
        self.wait_timeout = wait_timeout.into();
        self
    }

    #[must_use]
    pub fn default_warehouse(&self) -> Option<&str> {
        self.default_warehouse.as_deref()
    }

    #[must_use]
    pub fn http(&self) -> &DatabricksHttp {
        &self.http
    }

    pub fn close(&self) {
        self.http.close();
    }

    /// Submit a statement and wait for it to finish.
    ///
    /// If the submission reports `PENDING` or `RUNNING`, the statement is
    /// polled. When the poll ceiling passes, the last observed (non-terminal)
    /// response is returned; check `status.state` before reading results.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty statement or when no
    /// warehouse is given or configured, or any error from the calls.
    pub async fn execute_statement(&self, req: StatementRequest) -> Result<Value> {
        let statement = require(&req.statement, "statement")?;
        let warehouse_id = req
            .warehouse_id
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .or(self.default_warehouse.as_deref())
            .ok_or_else(|| {
                MagpieError::Validation(
                    "warehouse_id is required (not provided and DATABRICKS_WAREHOUSE_ID not set)"
                        .into(),
                )
            })?;

        let mut body = serde_json::to_value(&req)?;
        body["statement"] = Value::from(statement);
        body["warehouse_id"] = Value::from(warehouse_id);
        body["wait_timeout"] = Value::from(self.wait_timeout.as_str());

        tracing::info!(warehouse_id, "executing SQL statement");
        let resp = self
            .http
            .send(ApiRequest::post("/api/2.0/sql/statements").body(body))
            .await?;

        let Some(statement_id) = resp
            .get("statement_id")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Ok(resp);
        };
        if !statement_state(&resp).is_some_and(|s| PENDING_STATES.contains(&s)) {
            return Ok(resp);
        }

        tracing::info!(statement_id = %statement_id, "statement still running, polling");
        poll_until(
            self.poll,
            "sql_statement",
            || self.get_statement(&statement_id),
            |r| statement_state(r).is_some_and(|s| TERMINAL_STATEMENT_STATES.contains(&s)),
        )
        .await
    }

    /// Current status and, once finished, the result of a statement.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty id, or any error from
    /// the call.
    pub async fn get_statement(&self, statement_id: &str) -> Result<Value> {
        let statement_id = require(statement_id, "statement_id")?;
        tracing::debug!(statement_id, "getting statement");
        self.http
            .get(&format!("/api/2.0/sql/statements/{statement_id}"), &[])
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty id, or any error from
    /// the call.
    pub async fn cancel_statement(&self, statement_id: &str) -> Result<Value> {
        let statement_id = require(statement_id, "statement_id")?;
        tracing::info!(statement_id, "cancelling statement");
        self.http
            .send(ApiRequest::post(format!(
                "/api/2.0/sql/statements/{statement_id}/cancel"
            )))
            .await
    }

    /// # Errors
    ///
    /// Returns any transport, auth or API error from the call.
    pub async fn list_warehouses(&self) -> Result<Value> {
        tracing::info!("listing SQL warehouses");
        self.http.get("/api/2.0/sql/warehouses", &[]).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty id, or any error from
    /// the call.
    pub async fn get_warehouse(&self, warehouse_id: &str) -> Result<Value> {
        let warehouse_id = require(warehouse_id, "warehouse_id")?;
        tracing::info!(warehouse_id, "getting warehouse");
        self.http
            .get(&format!("/api/2.0/sql/warehouses/{warehouse_id}"), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, serve};
    use axum::{
        Json, Router,
        routing::{get, post},
    };
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const FAST: PollPolicy = PollPolicy::new(Duration::from_millis(10), Duration::from_secs(5));

    /// Submit answers `submit_state`; the n-th poll answers `RUNNING` until
    /// `terminal_after` polls, then `SUCCEEDED`.
    fn statement_router(submit_state: &'static str, terminal_after: usize) -> Router {
        let polls = Arc::new(AtomicUsize::new(0));
        Router::new()
            .route(
                "/api/2.0/sql/statements",
                post(move |Json(body): Json<Value>| async move {
                    Json(json!({
                        "statement_id": "st-1",
                        "status": {"state": submit_state},
                        "echo": body
                    }))
                }),
            )
            .route(
                "/api/2.0/sql/statements/{id}",
                get(move || {
                    let polls = polls.clone();
                    async move {
                        let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                        let state = if n >= terminal_after { "SUCCEEDED" } else { "RUNNING" };
                        Json(json!({
                            "statement_id": "st-1",
                            "status": {"state": state},
                            "poll": n
                        }))
                    }
                }),
            )
    }

    fn select_one() -> StatementRequest {
        StatementRequest::builder().statement("SELECT 1").build()
    }

    #[tokio::test]
    async fn test_running_submission_is_polled_until_succeeded() {
        let mock = serve(statement_router("RUNNING", 2)).await;
        let sql = SqlClient::new(testing::http(&mock.url), Some("wh-1".into())).with_poll(FAST);

        let v = sql.execute_statement(select_one()).await.unwrap();
        assert_eq!(statement_state(&v), Some("SUCCEEDED"));
        assert_eq!(v["poll"], 2);
        // stops polling as soon as the terminal state is seen
        assert_eq!(mock.count("GET /api/2.0/sql/statements/st-1"), 2);
    }

    #[tokio::test]
    async fn test_finished_submission_is_not_polled() {
        let mock = serve(statement_router("SUCCEEDED", 1)).await;
        let sql = SqlClient::new(testing::http(&mock.url), Some("wh-1".into())).with_poll(FAST);

        let v = sql.execute_statement(select_one()).await.unwrap();
        assert_eq!(statement_state(&v), Some("SUCCEEDED"));
        assert_eq!(mock.count("GET "), 0);
    }

    #[tokio::test]
    async fn test_timeout_returns_last_running_status() {
        let mock = serve(statement_router("RUNNING", usize::MAX)).await;
        let policy = PollPolicy::new(Duration::from_millis(10), Duration::from_millis(100));
        let sql = SqlClient::new(testing::http(&mock.url), Some("wh-1".into())).with_poll(policy);

        let v = sql.execute_statement(select_one()).await.unwrap();
        assert_eq!(statement_state(&v), Some("RUNNING"));
        let polls = mock.count("GET /api/2.0/sql/statements/st-1");
        assert!(polls >= 1);
        // the returned body is the last fetched one
        assert_eq!(v["poll"], polls);
    }

    #[tokio::test]
    async fn test_submission_body() {
        let mock = serve(statement_router("SUCCEEDED", 1)).await;
        let sql = SqlClient::new(testing::http(&mock.url), Some("default-wh".into()))
            .with_wait_timeout("10s");

        let req = StatementRequest::builder()
            .statement("SELECT * FROM t WHERE id = :id")
            .catalog("main")
            .schema("sales")
            .parameters(vec![StatementParameter {
                name: "id".into(),
                value: "7".into(),
                type_name: Some("INT".into()),
            }])
            .build();
        let v = sql.execute_statement(req).await.unwrap();
        let echo = &v["echo"];
        assert_eq!(echo["warehouse_id"], "default-wh");
        assert_eq!(echo["wait_timeout"], "10s");
        assert_eq!(echo["catalog"], "main");
        assert_eq!(echo["parameters"][0]["type"], "INT");

        let explicit = StatementRequest::builder()
            .statement("SELECT 1")
            .warehouse_id("other-wh")
            .build();
        let v = sql.execute_statement(explicit).await.unwrap();
        assert_eq!(v["echo"]["warehouse_id"], "other-wh");
        assert!(v["echo"].get("catalog").is_none());
    }

    #[tokio::test]
    async fn test_missing_warehouse_is_validation_error() {
        let mock = serve(statement_router("SUCCEEDED", 1)).await;
        let sql = SqlClient::new(testing::http(&mock.url), None);

        let err = sql.execute_statement(select_one()).await.unwrap_err();
        assert!(matches!(err, MagpieError::Validation(_)));
        assert!(err.to_string().contains("warehouse_id is required"));

        let empty = StatementRequest::builder()
            .statement(" ")
            .warehouse_id("wh")
            .build();
        assert!(sql.execute_statement(empty).await.is_err());
        assert!(mock.hits().is_empty());
    }
}
