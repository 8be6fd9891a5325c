//! The closed set of tool calls and their dispatch onto the resource clients.

use magpie_databricks::{
    ChatQuery, DatabricksClients, Format, Language, StatementParameter, StatementRequest,
};
use magpie_types::{MagpieError, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value, json};
use std::{collections::HashMap, time::Duration};

/// Name, one-line description and required parameters of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
}

const fn spec(
    name: &'static str,
    description: &'static str,
    required: &'static [&'static str],
) -> ToolSpec {
    ToolSpec {
        name,
        description,
        required,
    }
}

static CATALOG: &[ToolSpec] = &[
    spec("list_clusters", "List all clusters in the workspace", &[]),
    spec("get_cluster", "Get information about a cluster", &["cluster_id"]),
    spec(
        "create_cluster",
        "Create a cluster from a cluster spec (num_workers, autotermination_minutes and other fields pass through)",
        &["cluster_name", "spark_version", "node_type_id"],
    ),
    spec("start_cluster", "Start a terminated cluster", &["cluster_id"]),
    spec("restart_cluster", "Restart a running cluster", &["cluster_id"]),
    spec("terminate_cluster", "Terminate a cluster", &["cluster_id"]),
    spec(
        "resize_cluster",
        "Change the number of workers of a cluster",
        &["cluster_id", "num_workers"],
    ),
    spec(
        "execute_sql",
        "Execute a SQL statement and wait for the result; warehouse_id defaults to the configured warehouse",
        &["statement"],
    ),
    spec("get_statement", "Get the status and result of a SQL statement", &["statement_id"]),
    spec("cancel_statement", "Cancel a running SQL statement", &["statement_id"]),
    spec("list_warehouses", "List all SQL warehouses in the workspace", &[]),
    spec("get_warehouse", "Get information about a SQL warehouse", &["warehouse_id"]),
    spec("list_jobs", "List jobs (limit defaults to 25, offset to 0)", &[]),
    spec("get_job", "Get information about a job", &["job_id"]),
    spec("create_job", "Create a job from job settings", &["name", "tasks"]),
    spec("update_job", "Partially update a job's settings", &["job_id"]),
    spec("delete_job", "Delete a job", &["job_id"]),
    spec("run_job", "Run a job now with optional notebook_params", &["job_id"]),
    spec("get_run", "Get the state of a job run", &["run_id"]),
    spec("list_runs", "List job runs, optionally for one job_id", &[]),
    spec("cancel_run", "Cancel a job run", &["run_id"]),
    spec(
        "wait_for_run",
        "Wait until a job run finishes or max_wait_secs passes",
        &["run_id"],
    ),
    spec("list_notebooks", "List workspace objects under a path", &[]),
    spec("get_notebook_status", "Get the status of a workspace object", &["path"]),
    spec("export_notebook", "Export a notebook (SOURCE, HTML, JUPYTER, DBC)", &["path"]),
    spec("import_notebook", "Import notebook content at a path", &["path", "content"]),
    spec(
        "create_notebook",
        "Create a notebook, from a language template when no content is given",
        &["path"],
    ),
    spec("delete_notebook", "Delete a notebook or directory", &["path"]),
    spec("create_directory", "Create a directory and any missing parents", &["path"]),
    spec(
        "search_notebooks",
        "Find notebooks whose path contains the query, case-insensitively",
        &["query"],
    ),
    spec(
        "query_model",
        "Send a prompt to a model serving endpoint; endpoint defaults to the configured one",
        &["prompt"],
    ),
    spec("list_serving_endpoints", "List the model serving endpoints of the workspace", &[]),
    spec(
        "workspace_status",
        "Report the workspace URL, authentication state and configured defaults",
        &[],
    ),
];

/// A parsed tool invocation.
///
/// Deserializes from `{"tool": "<name>", "params": {...}}`. Ids may be sent
/// as numbers or numeric strings. String parameters left out default to empty
/// and are rejected by the resource client before any request is made.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "params", rename_all = "snake_case")]
pub enum ToolCall {
    ListClusters {},
    GetCluster {
        #[serde(default)]
        cluster_id: String,
    },
    CreateCluster {
        #[serde(flatten)]
        spec: Map<String, Value>,
    },
    StartCluster {
        #[serde(default)]
        cluster_id: String,
    },
    RestartCluster {
        #[serde(default)]
        cluster_id: String,
    },
    TerminateCluster {
        #[serde(default)]
        cluster_id: String,
    },
    ResizeCluster {
        #[serde(default)]
        cluster_id: String,
        num_workers: u32,
    },

    ExecuteSql {
        #[serde(default)]
        statement: String,
        warehouse_id: Option<String>,
        catalog: Option<String>,
        schema: Option<String>,
        #[serde(default)]
        parameters: Vec<StatementParameter>,
    },
    GetStatement {
        #[serde(default)]
        statement_id: String,
    },
    CancelStatement {
        #[serde(default)]
        statement_id: String,
    },
    ListWarehouses {},
    GetWarehouse {
        #[serde(default)]
        warehouse_id: String,
    },

    ListJobs {
        #[serde(default = "default_limit")]
        limit: u32,
        #[serde(default)]
        offset: u32,
    },
    GetJob {
        #[serde(deserialize_with = "lenient_id")]
        job_id: i64,
    },
    CreateJob {
        #[serde(flatten)]
        settings: Map<String, Value>,
    },
    UpdateJob {
        #[serde(deserialize_with = "lenient_id")]
        job_id: i64,
        #[serde(flatten)]
        changes: Map<String, Value>,
    },
    DeleteJob {
        #[serde(deserialize_with = "lenient_id")]
        job_id: i64,
    },
    RunJob {
        #[serde(deserialize_with = "lenient_id")]
        job_id: i64,
        notebook_params: Option<HashMap<String, String>>,
    },
    GetRun {
        #[serde(deserialize_with = "lenient_id")]
        run_id: i64,
    },
    ListRuns {
        #[serde(default, deserialize_with = "lenient_opt_id")]
        job_id: Option<i64>,
        #[serde(default = "default_limit")]
        limit: u32,
    },
    CancelRun {
        #[serde(deserialize_with = "lenient_id")]
        run_id: i64,
    },
    WaitForRun {
        #[serde(deserialize_with = "lenient_id")]
        run_id: i64,
        max_wait_secs: Option<u64>,
    },

    ListNotebooks {
        #[serde(default = "default_root")]
        path: String,
        object_type: Option<String>,
    },
    GetNotebookStatus {
        #[serde(default)]
        path: String,
    },
    ExportNotebook {
        #[serde(default)]
        path: String,
        #[serde(default = "default_format")]
        format: String,
    },
    ImportNotebook {
        #[serde(default)]
        path: String,
        #[serde(default)]
        content: String,
        #[serde(default = "default_format")]
        format: String,
        language: Option<String>,
        #[serde(default)]
        overwrite: bool,
    },
    CreateNotebook {
        #[serde(default)]
        path: String,
        #[serde(default = "default_language")]
        language: String,
        content: Option<String>,
    },
    DeleteNotebook {
        #[serde(default)]
        path: String,
        #[serde(default)]
        recursive: bool,
    },
    CreateDirectory {
        #[serde(default)]
        path: String,
    },
    SearchNotebooks {
        #[serde(default)]
        query: String,
        #[serde(default = "default_max_results")]
        max_results: usize,
        path_prefix: Option<String>,
    },

    QueryModel {
        #[serde(default)]
        prompt: String,
        endpoint: Option<String>,
        system: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    },
    ListServingEndpoints {},
    WorkspaceStatus {},
}

fn default_limit() -> u32 {
    25
}

fn default_max_results() -> usize {
    25
}

fn default_root() -> String {
    "/".into()
}

fn default_format() -> String {
    Format::Source.as_str().into()
}

fn default_language() -> String {
    Language::Python.as_str().into()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Str(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            Self::Num(n) => Ok(n),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id: {s:?}"))),
        }
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    RawId::deserialize(d)?.into_id()
}

fn lenient_opt_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    match Option::<RawId>::deserialize(d)? {
        None => Ok(None),
        Some(RawId::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(raw) => raw.into_id().map(Some),
    }
}

impl ToolCall {
    /// Every tool, in catalogue order.
    #[must_use]
    pub fn catalog() -> &'static [ToolSpec] {
        CATALOG
    }

    /// Catalogue entry for `name`, if it is a known tool.
    #[must_use]
    pub fn spec(name: &str) -> Option<&'static ToolSpec> {
        CATALOG.iter().find(|s| s.name == name)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        CATALOG.iter().map(|s| s.name)
    }

    /// Build a call from a tool name and its arguments.
    ///
    /// `params` may be flat or nested once under a `"params"` key; `null`
    /// counts as no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an unknown tool or arguments
    /// that do not fit it.
    pub fn parse(name: &str, params: Value) -> Result<Self> {
        let name = name.trim();
        if Self::spec(name).is_none() {
            return Err(MagpieError::Validation(format!("unknown tool: {name}")));
        }
        let params = match params {
            Value::Null => json!({}),
            Value::Object(mut map)
                if map.len() == 1 && map.get("params").is_some_and(Value::is_object) =>
            {
                map.remove("params").unwrap_or_else(|| json!({}))
            }
            other => other,
        };
        serde_json::from_value(json!({ "tool": name, "params": params })).map_err(|e| {
            MagpieError::Validation(format!("invalid parameters for {name}: {e}"))
        })
    }

    /// The tool name this call dispatches to.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListClusters {} => "list_clusters",
            Self::GetCluster { .. } => "get_cluster",
            Self::CreateCluster { .. } => "create_cluster",
            Self::StartCluster { .. } => "start_cluster",
            Self::RestartCluster { .. } => "restart_cluster",
            Self::TerminateCluster { .. } => "terminate_cluster",
            Self::ResizeCluster { .. } => "resize_cluster",
            Self::ExecuteSql { .. } => "execute_sql",
            Self::GetStatement { .. } => "get_statement",
            Self::CancelStatement { .. } => "cancel_statement",
            Self::ListWarehouses {} => "list_warehouses",
            Self::GetWarehouse { .. } => "get_warehouse",
            Self::ListJobs { .. } => "list_jobs",
            Self::GetJob { .. } => "get_job",
            Self::CreateJob { .. } => "create_job",
            Self::UpdateJob { .. } => "update_job",
            Self::DeleteJob { .. } => "delete_job",
            Self::RunJob { .. } => "run_job",
            Self::GetRun { .. } => "get_run",
            Self::ListRuns { .. } => "list_runs",
            Self::CancelRun { .. } => "cancel_run",
            Self::WaitForRun { .. } => "wait_for_run",
            Self::ListNotebooks { .. } => "list_notebooks",
            Self::GetNotebookStatus { .. } => "get_notebook_status",
            Self::ExportNotebook { .. } => "export_notebook",
            Self::ImportNotebook { .. } => "import_notebook",
            Self::CreateNotebook { .. } => "create_notebook",
            Self::DeleteNotebook { .. } => "delete_notebook",
            Self::CreateDirectory { .. } => "create_directory",
            Self::SearchNotebooks { .. } => "search_notebooks",
            Self::QueryModel { .. } => "query_model",
            Self::ListServingEndpoints {} => "list_serving_endpoints",
            Self::WorkspaceStatus {} => "workspace_status",
        }
    }

    /// Run the call against `clients`.
    ///
    /// # Errors
    ///
    /// Returns the resource client's error, or [`MagpieError::Validation`] for
    /// an unsupported notebook format or language.
    pub async fn execute(self, clients: &DatabricksClients) -> Result<Value> {
        let DatabricksClients {
            clusters,
            jobs,
            sql,
            notebooks,
            serving,
            ..
        } = clients;

        match self {
            Self::ListClusters {} => clusters.list_clusters().await,
            Self::GetCluster { cluster_id } => clusters.get_cluster(&cluster_id).await,
            Self::CreateCluster { spec } => clusters.create_cluster(Value::Object(spec)).await,
            Self::StartCluster { cluster_id } => clusters.start_cluster(&cluster_id).await,
            Self::RestartCluster { cluster_id } => clusters.restart_cluster(&cluster_id).await,
            Self::TerminateCluster { cluster_id } => clusters.terminate_cluster(&cluster_id).await,
            Self::ResizeCluster {
                cluster_id,
                num_workers,
            } => clusters.resize_cluster(&cluster_id, num_workers).await,

            Self::ExecuteSql {
                statement,
                warehouse_id,
                catalog,
                schema,
                parameters,
            } => {
                let req = StatementRequest::builder()
                    .statement(statement)
                    .maybe_warehouse_id(warehouse_id)
                    .maybe_catalog(catalog)
                    .maybe_schema(schema)
                    .parameters(parameters)
                    .build();
                sql.execute_statement(req).await
            }
            Self::GetStatement { statement_id } => sql.get_statement(&statement_id).await,
            Self::CancelStatement { statement_id } => sql.cancel_statement(&statement_id).await,
            Self::ListWarehouses {} => sql.list_warehouses().await,
            Self::GetWarehouse { warehouse_id } => sql.get_warehouse(&warehouse_id).await,

            Self::ListJobs { limit, offset } => jobs.list_jobs(limit, offset).await,
            Self::GetJob { job_id } => jobs.get_job(job_id).await,
            Self::CreateJob { settings } => jobs.create_job(Value::Object(settings)).await,
            Self::UpdateJob { job_id, changes } => {
                jobs.update_job(job_id, Value::Object(changes)).await
            }
            Self::DeleteJob { job_id } => jobs.delete_job(job_id).await,
            Self::RunJob {
                job_id,
                notebook_params,
            } => jobs.run_job(job_id, notebook_params.as_ref()).await,
            Self::GetRun { run_id } => jobs.get_run(run_id).await,
            Self::ListRuns { job_id, limit } => jobs.list_runs(job_id, limit).await,
            Self::CancelRun { run_id } => jobs.cancel_run(run_id).await,
            Self::WaitForRun {
                run_id,
                max_wait_secs,
            } => {
                jobs.wait_for_run_completion(run_id, max_wait_secs.map(Duration::from_secs))
                    .await
            }

            Self::ListNotebooks { path, object_type } => {
                notebooks.list(&path, object_type.as_deref()).await
            }
            Self::GetNotebookStatus { path } => notebooks.get_status(&path).await,
            Self::ExportNotebook { path, format } => {
                notebooks.export_notebook(&path, format.parse::<Format>()?).await
            }
            Self::ImportNotebook {
                path,
                content,
                format,
                language,
                overwrite,
            } => {
                let language = language.as_deref().map(str::parse::<Language>).transpose()?;
                notebooks
                    .import_notebook(&path, &content, format.parse::<Format>()?, language, overwrite)
                    .await
            }
            Self::CreateNotebook {
                path,
                language,
                content,
            } => {
                notebooks
                    .create_notebook(&path, language.parse::<Language>()?, content.as_deref())
                    .await
            }
            Self::DeleteNotebook { path, recursive } => notebooks.delete(&path, recursive).await,
            Self::CreateDirectory { path } => notebooks.mkdirs(&path).await,
            Self::SearchNotebooks {
                query,
                max_results,
                path_prefix,
            } => {
                let found = notebooks
                    .search(&query, path_prefix.as_deref(), max_results)
                    .await?;
                Ok(json!({ "count": found.len(), "notebooks": found }))
            }

            Self::QueryModel {
                prompt,
                endpoint,
                system,
                max_tokens,
                temperature,
            } => {
                let query = ChatQuery::builder()
                    .prompt(prompt)
                    .maybe_endpoint(endpoint)
                    .maybe_system(system)
                    .maybe_max_tokens(max_tokens)
                    .maybe_temperature(temperature)
                    .build();
                serving.query(query).await
            }
            Self::ListServingEndpoints {} => serving.list_endpoints().await,
            Self::WorkspaceStatus {} => Ok(clients.workspace_status().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal arguments that satisfy every required parameter.
    fn sample_params(spec: &ToolSpec) -> Value {
        let mut params = Map::new();
        for &field in spec.required {
            let value = match field {
                "job_id" | "run_id" | "num_workers" => json!(1),
                "tasks" => json!([{"task_key": "t"}]),
                _ => json!("x"),
            };
            params.insert(field.into(), value);
        }
        Value::Object(params)
    }

    #[test]
    fn test_every_catalog_entry_parses() {
        for spec in ToolCall::catalog() {
            let call = ToolCall::parse(spec.name, sample_params(spec))
                .unwrap_or_else(|e| panic!("{}: {e}", spec.name));
            assert_eq!(call.name(), spec.name);
        }
        assert_eq!(ToolCall::names().count(), CATALOG.len());
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolCall::parse("drop_database", json!({})).unwrap_err();
        assert!(matches!(err, MagpieError::Validation(_)));
        assert_eq!(err.to_string(), "unknown tool: drop_database");
    }

    #[test]
    fn test_nested_params_are_unwrapped() {
        let flat = ToolCall::parse("get_cluster", json!({"cluster_id": "c-1"})).unwrap();
        let nested =
            ToolCall::parse("get_cluster", json!({"params": {"cluster_id": "c-1"}})).unwrap();
        assert_eq!(flat, nested);
        assert_eq!(
            flat,
            ToolCall::GetCluster {
                cluster_id: "c-1".into()
            }
        );
    }

    #[test]
    fn test_null_params_and_defaults() {
        assert_eq!(
            ToolCall::parse("list_jobs", Value::Null).unwrap(),
            ToolCall::ListJobs {
                limit: 25,
                offset: 0
            }
        );
        assert_eq!(
            ToolCall::parse("list_notebooks", json!({})).unwrap(),
            ToolCall::ListNotebooks {
                path: "/".into(),
                object_type: None
            }
        );
        // missing string ids are left for the client to reject
        assert_eq!(
            ToolCall::parse("get_cluster", json!({})).unwrap(),
            ToolCall::GetCluster {
                cluster_id: String::new()
            }
        );
    }

    #[test]
    fn test_lenient_ids() {
        let from_str = ToolCall::parse("get_job", json!({"job_id": " 123 "})).unwrap();
        let from_num = ToolCall::parse("get_job", json!({"job_id": 123})).unwrap();
        assert_eq!(from_str, from_num);

        let err = ToolCall::parse("get_run", json!({"run_id": "abc"})).unwrap_err();
        assert!(err.to_string().starts_with("invalid parameters for get_run"));

        let runs = ToolCall::parse("list_runs", json!({"job_id": ""})).unwrap();
        assert_eq!(
            runs,
            ToolCall::ListRuns {
                job_id: None,
                limit: 25
            }
        );
    }

    #[test]
    fn test_flattened_settings_keep_extra_fields() {
        let call = ToolCall::parse(
            "update_job",
            json!({"job_id": "9", "new_settings": {"max_concurrent_runs": 2}}),
        )
        .unwrap();
        let ToolCall::UpdateJob { job_id, changes } = call else {
            panic!("expected update_job");
        };
        assert_eq!(job_id, 9);
        assert_eq!(changes["new_settings"]["max_concurrent_runs"], 2);
        assert!(!changes.contains_key("job_id"));
    }

    #[test]
    fn test_execute_sql_parameters() {
        let call = ToolCall::parse(
            "execute_sql",
            json!({
                "statement": "SELECT :id",
                "parameters": [{"name": "id", "value": "1", "type": "INT"}]
            }),
        )
        .unwrap();
        let ToolCall::ExecuteSql { parameters, warehouse_id, .. } = call else {
            panic!("expected execute_sql");
        };
        assert!(warehouse_id.is_none());
        assert_eq!(parameters[0].type_name.as_deref(), Some("INT"));
    }

    #[test]
    fn test_query_model_options() {
        let call = ToolCall::parse(
            "query_model",
            json!({"prompt": "Summarize pump failures", "max_tokens": "256"}),
        );
        assert!(call.unwrap_err().to_string().starts_with("invalid parameters for query_model"));

        let call = ToolCall::parse(
            "query_model",
            json!({"prompt": "Summarize pump failures", "temperature": 0.2}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::QueryModel {
                prompt: "Summarize pump failures".into(),
                endpoint: None,
                system: None,
                max_tokens: None,
                temperature: Some(0.2),
            }
        );
        assert_eq!(
            ToolCall::parse("workspace_status", Value::Null).unwrap(),
            ToolCall::WorkspaceStatus {}
        );
    }

    #[test]
    fn test_catalog_lookup() {
        let spec = ToolCall::spec("resize_cluster").unwrap();
        assert_eq!(spec.required, &["cluster_id", "num_workers"]);
        assert!(ToolCall::spec("nope").is_none());
    }
}
