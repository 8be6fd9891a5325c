//! Jobs API (`/api/2.1/jobs/*`) and run polling.

use crate::{
    http::DatabricksHttp,
    poll::{PollPolicy, poll_until},
};
use magpie_types::{MagpieError, traits::Result};
use serde_json::{Map, Value, json};
use std::{collections::HashMap, time::Duration};

/// Life-cycle states after which a run no longer changes.
pub const TERMINAL_RUN_STATES: [&str; 3] = ["TERMINATED", "SKIPPED", "INTERNAL_ERROR"];

pub const DEFAULT_RUN_POLL: PollPolicy =
    PollPolicy::new(Duration::from_secs(10), Duration::from_secs(3600));

/// `state.life_cycle_state` of a run response.
#[must_use]
pub fn life_cycle_state(run: &Value) -> Option<&str> {
    run.pointer("/state/life_cycle_state").and_then(Value::as_str)
}

fn require_id(id: i64, name: &str) -> Result<i64> {
    if id <= 0 {
        return Err(MagpieError::Validation(format!(
            "{name} must be a positive integer"
        )));
    }
    Ok(id)
}

#[derive(Debug)]
pub struct JobsClient {
    http: DatabricksHttp,
    poll: PollPolicy,
}

impl JobsClient {
    #[must_use]
    pub fn new(http: DatabricksHttp) -> Self {
        Self {
            http,
            poll: DEFAULT_RUN_POLL,
        }
    }

    #[must_use]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn http(&self) -> &DatabricksHttp {
        &self.http
    }

    pub fn close(&self) {
        self.http.close();
    }

    /// # Errors
    ///
    /// Returns any transport, auth or API error from the call.
    pub async fn list_jobs(&self, limit: u32, offset: u32) -> Result<Value> {
        tracing::info!(limit, offset, "listing jobs");
        self.http
            .get(
                "/api/2.1/jobs/list",
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id, or any error
    /// from the call.
    pub async fn get_job(&self, job_id: i64) -> Result<Value> {
        let job_id = require_id(job_id, "job_id")?;
        tracing::info!(job_id, "getting job");
        self.http
            .get("/api/2.1/jobs/get", &[("job_id", job_id.to_string())])
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] if the settings lack a name or at
    /// least one task, or any error from the call.
    pub async fn create_job(&self, settings: Value) -> Result<Value> {
        let Some(fields) = settings.as_object() else {
            return Err(MagpieError::Validation(
                "job settings must be a JSON object".into(),
            ));
        };
        if fields
            .get("name")
            .and_then(Value::as_str)
            .is_none_or(|n| n.trim().is_empty())
        {
            return Err(MagpieError::Validation("job name is required".into()));
        }
        if fields
            .get("tasks")
            .and_then(Value::as_array)
            .is_none_or(Vec::is_empty)
        {
            return Err(MagpieError::Validation(
                "at least one job task is required".into(),
            ));
        }
        tracing::info!(name = %fields["name"], "creating job");
        self.http.post("/api/2.1/jobs/create", settings).await
    }

    /// Partially update a job; `changes` is merged next to `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id or non-object
    /// changes, or any error from the call.
    pub async fn update_job(&self, job_id: i64, changes: Value) -> Result<Value> {
        let job_id = require_id(job_id, "job_id")?;
        let Value::Object(changes) = changes else {
            return Err(MagpieError::Validation(
                "job changes must be a JSON object".into(),
            ));
        };
        let mut body = Map::new();
        body.insert("job_id".into(), json!(job_id));
        body.extend(changes);
        tracing::info!(job_id, "updating job");
        self.http
            .post("/api/2.1/jobs/update", Value::Object(body))
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id, or any error
    /// from the call.
    pub async fn delete_job(&self, job_id: i64) -> Result<Value> {
        let job_id = require_id(job_id, "job_id")?;
        tracing::info!(job_id, "deleting job");
        self.http
            .post("/api/2.1/jobs/delete", json!({ "job_id": job_id }))
            .await
    }

    /// Trigger a run now. The response carries the `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id, or any error
    /// from the call.
    pub async fn run_job(
        &self,
        job_id: i64,
        notebook_params: Option<&HashMap<String, String>>,
    ) -> Result<Value> {
        let job_id = require_id(job_id, "job_id")?;
        let mut body = json!({ "job_id": job_id });
        if let Some(params) = notebook_params.filter(|p| !p.is_empty()) {
            body["notebook_params"] = json!(params);
        }
        tracing::info!(job_id, "running job");
        self.http.post("/api/2.1/jobs/run-now", body).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id, or any error
    /// from the call.
    pub async fn get_run(&self, run_id: i64) -> Result<Value> {
        let run_id = require_id(run_id, "run_id")?;
        tracing::debug!(run_id, "getting run");
        self.http
            .get("/api/2.1/jobs/runs/get", &[("run_id", run_id.to_string())])
            .await
    }

    /// # Errors
    ///
    /// Returns any transport, auth or API error from the call.
    pub async fn list_runs(&self, job_id: Option<i64>, limit: u32) -> Result<Value> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(job_id) = job_id.filter(|id| *id > 0) {
            query.push(("job_id", job_id.to_string()));
        }
        tracing::info!(job_id = ?job_id, limit, "listing runs");
        self.http.get("/api/2.1/jobs/runs/list", &query).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for a non-positive id, or any error
    /// from the call.
    pub async fn cancel_run(&self, run_id: i64) -> Result<Value> {
        let run_id = require_id(run_id, "run_id")?;
        tracing::info!(run_id, "cancelling run");
        self.http
            .post("/api/2.1/jobs/runs/cancel", json!({ "run_id": run_id }))
            .await
    }

    /// Poll a run until its life-cycle state is terminal.
    ///
    /// `max_wait` overrides the configured ceiling. On timeout the last
    /// observed run is returned and the run keeps going.
    ///
    /// # Errors
    ///
    /// Returns the first error from a poll.
    pub async fn wait_for_run_completion(
        &self,
        run_id: i64,
        max_wait: Option<Duration>,
    ) -> Result<Value> {
        let run_id = require_id(run_id, "run_id")?;
        let mut policy = self.poll;
        if let Some(max_wait) = max_wait {
            policy.max_wait = max_wait;
        }
        tracing::info!(run_id, "waiting for run to complete");
        let run = poll_until(
            policy,
            "job_run",
            || self.get_run(run_id),
            |run| life_cycle_state(run).is_some_and(|s| TERMINAL_RUN_STATES.contains(&s)),
        )
        .await?;
        let state = life_cycle_state(&run).unwrap_or("UNKNOWN");
        let result_state = run
            .pointer("/state/result_state")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("-");
        tracing::info!(run_id, state, result = result_state, "run wait finished");
        Ok(run)
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
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const FAST: PollPolicy = PollPolicy::new(Duration::from_millis(10), Duration::from_secs(5));

    fn run_router(terminal_after: usize) -> Router {
        let polls = Arc::new(AtomicUsize::new(0));
        Router::new()
            .route(
                "/api/2.1/jobs/runs/get",
                get(move || {
                    let polls = polls.clone();
                    async move {
                        let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                        let state = if n >= terminal_after { "TERMINATED" } else { "RUNNING" };
                        Json(json!({
                            "run_id": 7,
                            "state": {"life_cycle_state": state, "result_state": "SUCCESS"}
                        }))
                    }
                }),
            )
            .route(
                "/api/2.1/jobs/run-now",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"run_id": 7, "echo": body}))
                }),
            )
            .route(
                "/api/2.1/jobs/update",
                post(|Json(body): Json<Value>| async move { Json(body) }),
            )
    }

    #[tokio::test]
    async fn test_wait_for_run_stops_on_terminated() {
        let mock = serve(run_router(3)).await;
        let jobs = JobsClient::new(testing::http(&mock.url)).with_poll(FAST);
        let run = jobs.wait_for_run_completion(7, None).await.unwrap();
        assert_eq!(life_cycle_state(&run), Some("TERMINATED"));
        assert_eq!(run["state"]["result_state"], "SUCCESS");
        assert_eq!(mock.count("/runs/get"), 3);
    }

    #[tokio::test]
    async fn test_wait_for_run_timeout_returns_last_state() {
        let mock = serve(run_router(usize::MAX)).await;
        let jobs = JobsClient::new(testing::http(&mock.url)).with_poll(FAST);
        let run = jobs
            .wait_for_run_completion(7, Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(life_cycle_state(&run), Some("RUNNING"));
        assert!(mock.count("/runs/get") >= 2);
    }

    #[tokio::test]
    async fn test_run_job_with_params() {
        let mock = serve(run_router(1)).await;
        let jobs = JobsClient::new(testing::http(&mock.url));
        let params = HashMap::from([("date".to_string(), "2024-01-01".to_string())]);
        let v = jobs.run_job(42, Some(&params)).await.unwrap();
        assert_eq!(v["run_id"], 7);
        assert_eq!(v["echo"]["job_id"], 42);
        assert_eq!(v["echo"]["notebook_params"]["date"], "2024-01-01");
    }

    #[tokio::test]
    async fn test_update_job_merges_id() {
        let mock = serve(run_router(1)).await;
        let jobs = JobsClient::new(testing::http(&mock.url));
        let v = jobs
            .update_job(5, json!({"new_settings": {"max_concurrent_runs": 2}}))
            .await
            .unwrap();
        assert_eq!(v["job_id"], 5);
        assert_eq!(v["new_settings"]["max_concurrent_runs"], 2);
    }

    #[tokio::test]
    async fn test_create_job_validation() {
        let mock = serve(run_router(1)).await;
        let jobs = JobsClient::new(testing::http(&mock.url));

        let err = jobs.create_job(json!({"tasks": [{}]})).await.unwrap_err();
        assert_eq!(err.to_string(), "job name is required");
        let err = jobs
            .create_job(json!({"name": "nightly", "tasks": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, MagpieError::Validation(_)));
        assert!(jobs.get_run(0).await.is_err());
        assert!(mock.hits().is_empty());
    }
}
