//! Synchronous tool functions over the Databricks clients.

use crate::{ToolCall, bridge::run_blocking};
use magpie_config::Config;
use magpie_databricks::DatabricksClients;
use magpie_types::{Result, ToolResult};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Owns the resource clients and exposes every operation both as an async
/// call and as a blocking `*_sync` function returning a [`ToolResult`].
///
/// The blocking functions never panic and never return an error; failures
/// come back as [`ToolResult::Error`] carrying the error's display text.
#[derive(Debug)]
pub struct DatabricksToolbox {
    clients: DatabricksClients,
}

impl DatabricksToolbox {
    #[must_use]
    pub fn new(clients: DatabricksClients) -> Self {
        Self { clients }
    }

    /// # Errors
    ///
    /// Returns [`magpie_types::MagpieError::Auth`] if a credential is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        DatabricksClients::from_config(config).map(Self::new)
    }

    #[must_use]
    pub fn clients(&self) -> &DatabricksClients {
        &self.clients
    }

    /// Run `call` on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying client call returns.
    pub async fn call(&self, call: ToolCall) -> Result<Value> {
        let tool = call.name();
        tracing::debug!(tool, "dispatching tool call");
        let res = call.execute(&self.clients).await;
        if let Err(e) = &res {
            tracing::warn!(tool, error = %e, "tool call failed");
        }
        res
    }

    /// Like [`call`](Self::call), folded into a [`ToolResult`].
    pub async fn invoke(&self, call: ToolCall) -> ToolResult {
        self.call(call).await.into()
    }

    /// Run `call` to completion from synchronous code.
    ///
    /// Sessions are closed before and after the call: each bridged call runs
    /// on its own short-lived runtime and pooled connections cannot outlive
    /// it.
    pub fn call_sync(&self, call: ToolCall) -> ToolResult {
        self.clients.close_all();
        let res = run_blocking(self.call(call));
        self.clients.close_all();
        res.into()
    }

    /// Parse `name` and `params`, then [`call_sync`](Self::call_sync).
    pub fn call_named_sync(&self, name: &str, params: Value) -> ToolResult {
        match ToolCall::parse(name, params) {
            Ok(call) => self.call_sync(call),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    // ── Clusters ────────────────────────────────────────────────────────────

    pub fn list_clusters_sync(&self) -> ToolResult {
        self.call_sync(ToolCall::ListClusters {})
    }

    pub fn get_cluster_sync(&self, cluster_id: &str) -> ToolResult {
        self.call_sync(ToolCall::GetCluster {
            cluster_id: cluster_id.into(),
        })
    }

    /// `spec` must hold `cluster_name`, `spark_version` and `node_type_id`.
    pub fn create_cluster_sync(&self, spec: Value) -> ToolResult {
        self.call_named_sync("create_cluster", spec)
    }

    pub fn start_cluster_sync(&self, cluster_id: &str) -> ToolResult {
        self.call_sync(ToolCall::StartCluster {
            cluster_id: cluster_id.into(),
        })
    }

    pub fn restart_cluster_sync(&self, cluster_id: &str) -> ToolResult {
        self.call_sync(ToolCall::RestartCluster {
            cluster_id: cluster_id.into(),
        })
    }

    pub fn terminate_cluster_sync(&self, cluster_id: &str) -> ToolResult {
        self.call_sync(ToolCall::TerminateCluster {
            cluster_id: cluster_id.into(),
        })
    }

    pub fn resize_cluster_sync(&self, cluster_id: &str, num_workers: u32) -> ToolResult {
        self.call_sync(ToolCall::ResizeCluster {
            cluster_id: cluster_id.into(),
            num_workers,
        })
    }

    // ── SQL ─────────────────────────────────────────────────────────────────

    /// Execute `statement` and wait for its result. Without `warehouse_id`
    /// the configured default warehouse is used.
    pub fn execute_sql_sync(&self, statement: &str, warehouse_id: Option<&str>) -> ToolResult {
        self.call_sync(ToolCall::ExecuteSql {
            statement: statement.into(),
            warehouse_id: warehouse_id.map(str::to_string),
            catalog: None,
            schema: None,
            parameters: Vec::new(),
        })
    }

    pub fn get_statement_sync(&self, statement_id: &str) -> ToolResult {
        self.call_sync(ToolCall::GetStatement {
            statement_id: statement_id.into(),
        })
    }

    pub fn cancel_statement_sync(&self, statement_id: &str) -> ToolResult {
        self.call_sync(ToolCall::CancelStatement {
            statement_id: statement_id.into(),
        })
    }

    pub fn list_warehouses_sync(&self) -> ToolResult {
        self.call_sync(ToolCall::ListWarehouses {})
    }

    pub fn get_warehouse_sync(&self, warehouse_id: &str) -> ToolResult {
        self.call_sync(ToolCall::GetWarehouse {
            warehouse_id: warehouse_id.into(),
        })
    }

    // ── Jobs ────────────────────────────────────────────────────────────────

    pub fn list_jobs_sync(&self, limit: u32, offset: u32) -> ToolResult {
        self.call_sync(ToolCall::ListJobs { limit, offset })
    }

    pub fn get_job_sync(&self, job_id: i64) -> ToolResult {
        self.call_sync(ToolCall::GetJob { job_id })
    }

    pub fn create_job_sync(&self, settings: Value) -> ToolResult {
        self.call_named_sync("create_job", settings)
    }

    /// `changes` is merged next to `job_id`, e.g. `{"new_settings": {...}}`.
    pub fn update_job_sync(&self, job_id: i64, changes: Value) -> ToolResult {
        let mut params = json!({ "job_id": job_id });
        if let (Some(params), Value::Object(changes)) = (params.as_object_mut(), changes) {
            params.extend(changes);
        }
        self.call_named_sync("update_job", params)
    }

    pub fn delete_job_sync(&self, job_id: i64) -> ToolResult {
        self.call_sync(ToolCall::DeleteJob { job_id })
    }

    pub fn run_job_sync(
        &self,
        job_id: i64,
        notebook_params: Option<HashMap<String, String>>,
    ) -> ToolResult {
        self.call_sync(ToolCall::RunJob {
            job_id,
            notebook_params,
        })
    }

    pub fn get_run_sync(&self, run_id: i64) -> ToolResult {
        self.call_sync(ToolCall::GetRun { run_id })
    }

    pub fn list_runs_sync(&self, job_id: Option<i64>, limit: u32) -> ToolResult {
        self.call_sync(ToolCall::ListRuns { job_id, limit })
    }

    pub fn cancel_run_sync(&self, run_id: i64) -> ToolResult {
        self.call_sync(ToolCall::CancelRun { run_id })
    }

    /// Block until the run finishes or `max_wait_secs` (default: the
    /// configured ceiling) passes; on timeout the last run state is returned.
    pub fn wait_for_run_sync(&self, run_id: i64, max_wait_secs: Option<u64>) -> ToolResult {
        self.call_sync(ToolCall::WaitForRun {
            run_id,
            max_wait_secs,
        })
    }

    // ── Notebooks ───────────────────────────────────────────────────────────

    pub fn list_notebooks_sync(&self, path: &str) -> ToolResult {
        self.call_sync(ToolCall::ListNotebooks {
            path: path.into(),
            object_type: None,
        })
    }

    pub fn get_notebook_status_sync(&self, path: &str) -> ToolResult {
        self.call_sync(ToolCall::GetNotebookStatus { path: path.into() })
    }

    pub fn export_notebook_sync(&self, path: &str, format: &str) -> ToolResult {
        self.call_sync(ToolCall::ExportNotebook {
            path: path.into(),
            format: format.into(),
        })
    }

    pub fn create_notebook_sync(
        &self,
        path: &str,
        language: &str,
        content: Option<&str>,
    ) -> ToolResult {
        self.call_sync(ToolCall::CreateNotebook {
            path: path.into(),
            language: language.into(),
            content: content.map(str::to_string),
        })
    }

    /// Import plain-text `content` in the given format (`SOURCE`, `JUPYTER`, ...).
    pub fn import_notebook_sync(
        &self,
        path: &str,
        content: &str,
        format: &str,
        overwrite: bool,
    ) -> ToolResult {
        self.call_sync(ToolCall::ImportNotebook {
            path: path.into(),
            content: content.into(),
            format: format.into(),
            language: None,
            overwrite,
        })
    }

    pub fn create_directory_sync(&self, path: &str) -> ToolResult {
        self.call_sync(ToolCall::CreateDirectory { path: path.into() })
    }

    pub fn delete_notebook_sync(&self, path: &str, recursive: bool) -> ToolResult {
        self.call_sync(ToolCall::DeleteNotebook {
            path: path.into(),
            recursive,
        })
    }

    pub fn search_notebooks_sync(&self, query: &str, max_results: usize) -> ToolResult {
        self.call_named_sync(
            "search_notebooks",
            json!({ "query": query, "max_results": max_results }),
        )
    }

    // ── Model serving ───────────────────────────────────────────────────────

    /// `endpoint` falls back to the configured serving endpoint.
    pub fn query_model_sync(&self, prompt: &str, endpoint: Option<&str>) -> ToolResult {
        self.call_sync(ToolCall::QueryModel {
            prompt: prompt.into(),
            endpoint: endpoint.map(str::to_string),
            system: None,
            max_tokens: None,
            temperature: None,
        })
    }

    pub fn list_serving_endpoints_sync(&self) -> ToolResult {
        self.call_sync(ToolCall::ListServingEndpoints {})
    }

    /// Never an error result: a failed token request is reported inside the
    /// data.
    pub fn workspace_status_sync(&self) -> ToolResult {
        self.call_sync(ToolCall::WorkspaceStatus {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Query, Request},
        http::StatusCode,
        middleware::{self, Next},
        routing::{get, post},
    };
    use magpie_auth::StaticToken;
    use std::{
        net::SocketAddr,
        sync::{Arc, Mutex, mpsc},
        thread,
    };

    struct Workspace {
        url: String,
        hits: Arc<Mutex<Vec<String>>>,
    }

    impl Workspace {
        fn hits(&self) -> Vec<String> {
            self.hits.lock().unwrap().clone()
        }
    }

    /// Serve `router` from its own thread and runtime, so that a caller
    /// blocked inside the bridge cannot starve it.
    fn spawn_workspace(router: Router) -> Workspace {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorder = hits.clone();
        let app = router.layer(middleware::from_fn(move |req: Request, next: Next| {
            let recorder = recorder.clone();
            async move {
                recorder
                    .lock()
                    .unwrap()
                    .push(format!("{} {}", req.method(), req.uri()));
                next.run(req).await
            }
        }));

        let (tx, rx) = mpsc::channel::<SocketAddr>();
        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        let addr = rx.recv().unwrap();
        Workspace {
            url: format!("http://{addr}"),
            hits,
        }
    }

    fn workspace() -> Workspace {
        spawn_workspace(
            Router::new()
                .route(
                    "/api/2.0/clusters/list",
                    get(|| async {
                        Json(json!({"clusters": [{"cluster_id": "123", "state": "RUNNING"}]}))
                    }),
                )
                .route(
                    "/api/2.0/clusters/get",
                    get(|Query(q): Query<HashMap<String, String>>| async move {
                        if q.get("cluster_id").map(String::as_str) == Some("abc") {
                            (StatusCode::FORBIDDEN, Json(json!({"message": "forbidden"})))
                        } else {
                            (StatusCode::OK, Json(json!({"cluster_id": q["cluster_id"]})))
                        }
                    }),
                )
                .route(
                    "/api/2.0/sql/statements",
                    post(|| async {
                        Json(json!({
                            "statement_id": "st-1",
                            "status": {"state": "SUCCEEDED"},
                            "result": {"data_array": [["1"]]}
                        }))
                    }),
                )
                .route(
                    "/api/2.1/jobs/run-now",
                    post(|Json(body): Json<Value>| async move {
                        Json(json!({"run_id": 7, "job_id": body["job_id"]}))
                    }),
                )
                .route(
                    "/api/2.0/workspace/list",
                    get(|| async {
                        Json(json!({"objects": [
                            {"path": "/Shared/Sales Report", "object_type": "NOTEBOOK"},
                            {"path": "/Shared/etl", "object_type": "NOTEBOOK"}
                        ]}))
                    }),
                )
                .route(
                    "/serving-endpoints/chat/completions",
                    post(|Json(body): Json<Value>| async move {
                        Json(json!({
                            "choices": [{"message": {"content": format!("answered by {}", body["model"].as_str().unwrap_or_default())}}],
                            "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
                        }))
                    }),
                ),
        )
    }

    fn toolbox(url: &str, warehouse: Option<&str>) -> DatabricksToolbox {
        let mut config = Config::default();
        config.databricks.workspace_url = url.into();
        config.databricks.warehouse_id = warehouse.map(str::to_string);
        let auth = Arc::new(StaticToken::new("test-token").unwrap());
        DatabricksToolbox::new(DatabricksClients::new(&config, auth))
    }

    #[test]
    fn test_list_clusters_sync() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let result = tools.list_clusters_sync();
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "data": {"clusters": [{"cluster_id": "123", "state": "RUNNING"}]}
            })
        );
    }

    #[test]
    fn test_get_cluster_forbidden_is_error_result() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let result = tools.get_cluster_sync("abc");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "error": "forbidden"})
        );
    }

    #[test]
    fn test_missing_cluster_id_makes_no_request() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        for result in [
            tools.get_cluster_sync(""),
            tools.start_cluster_sync(" "),
            tools.terminate_cluster_sync(""),
        ] {
            assert_eq!(result.error_message(), Some("cluster_id is required"));
        }
        assert!(ws.hits().is_empty());
    }

    #[tokio::test]
    async fn test_both_bridge_paths_agree() {
        let ws = workspace();
        let tools = Arc::new(toolbox(&ws.url, None));

        // a runtime is active on this thread
        let inside = (tools.list_clusters_sync(), tools.get_cluster_sync("abc"));
        // none is active on a plain thread
        let worker = tools.clone();
        let outside = thread::spawn(move || {
            (worker.list_clusters_sync(), worker.get_cluster_sync("abc"))
        })
        .join()
        .unwrap();

        assert_eq!(inside, outside);
        assert!(inside.0.is_success());
        assert_eq!(inside.1.error_message(), Some("forbidden"));
    }

    #[test]
    fn test_sessions_closed_after_call() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        assert!(tools.list_clusters_sync().is_success());
        assert!(!tools.clients().clusters.http().is_open());
        // a second call opens a fresh session
        assert!(tools.list_clusters_sync().is_success());
        assert_eq!(ws.hits().len(), 2);
    }

    #[test]
    fn test_execute_sql_needs_a_warehouse() {
        let ws = workspace();
        let without = toolbox(&ws.url, None).execute_sql_sync("SELECT 1", None);
        assert!(
            without
                .error_message()
                .is_some_and(|m| m.starts_with("warehouse_id is required"))
        );
        assert!(ws.hits().is_empty());

        let with = toolbox(&ws.url, Some("wh-1")).execute_sql_sync("SELECT 1", None);
        assert_eq!(with.data().unwrap()["status"]["state"], "SUCCEEDED");
    }

    #[test]
    fn test_run_job_and_search() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);

        let run = tools.run_job_sync(42, None);
        assert_eq!(run.data().unwrap(), &json!({"run_id": 7, "job_id": 42}));

        let found = tools.search_notebooks_sync("sales", 10);
        let data = found.data().unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["notebooks"][0]["path"], "/Shared/Sales Report");
    }

    #[test]
    fn test_search_with_zero_limit_is_empty() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let found = tools.search_notebooks_sync("sales", 0);
        assert_eq!(found.data().unwrap()["count"], 0);
        assert!(ws.hits().is_empty());
    }

    #[test]
    fn test_named_call_reports_bad_input() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let unknown = tools.call_named_sync("format_disk", json!({}));
        assert_eq!(unknown.error_message(), Some("unknown tool: format_disk"));

        let bad_format = tools.export_notebook_sync("/Shared/etl", "PDF");
        assert_eq!(bad_format.error_message(), Some("unsupported format: PDF"));
        assert!(ws.hits().is_empty());
    }

    #[test]
    fn test_query_model_sync() {
        let ws = workspace();
        let mut config = Config::default();
        config.databricks.workspace_url = ws.url.clone();
        config.databricks.serving_endpoint = Some("rag-advanced".into());
        let auth = Arc::new(StaticToken::new("test-token").unwrap());
        let tools = DatabricksToolbox::new(DatabricksClients::new(&config, auth));

        let answer = tools.query_model_sync("Which pumps failed?", None);
        assert_eq!(
            answer.data().unwrap(),
            &json!({
                "response": "answered by rag-advanced",
                "model": "rag-advanced",
                "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
            })
        );

        let other = tools.query_model_sync("Which pumps failed?", Some("llama-70b"));
        assert_eq!(other.data().unwrap()["model"], "llama-70b");
        assert!(!tools.clients().serving.http().is_open());
    }

    #[test]
    fn test_query_model_without_endpoint_makes_no_request() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let result = tools.query_model_sync("hello", None);
        assert!(
            result
                .error_message()
                .is_some_and(|m| m.starts_with("endpoint is required"))
        );
        assert!(ws.hits().is_empty());
    }

    #[test]
    fn test_workspace_status_sync() {
        let ws = workspace();
        let tools = toolbox(&ws.url, Some("wh-1"));
        let status = tools.workspace_status_sync();
        let data = status.data().unwrap();
        assert_eq!(data["authentication_status"], "success");
        assert_eq!(data["workspace_url"], ws.url.as_str());
        assert_eq!(data["default_warehouse_id"], "wh-1");
        assert!(ws.hits().is_empty());
    }

    #[tokio::test]
    async fn test_async_invoke() {
        let ws = workspace();
        let tools = toolbox(&ws.url, None);
        let result = tools.invoke(ToolCall::ListClusters {}).await;
        assert_eq!(result.data().unwrap()["clusters"][0]["cluster_id"], "123");
    }
}
