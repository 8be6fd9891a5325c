//! Clusters API (`/api/2.0/clusters/*`).

use crate::{http::DatabricksHttp, require};
use magpie_types::{MagpieError, traits::Result};
use serde_json::{Value, json};

const REQUIRED_CREATE_FIELDS: [&str; 3] = ["cluster_name", "spark_version", "node_type_id"];

#[derive(Debug)]
pub struct ClustersClient {
    http: DatabricksHttp,
}

impl ClustersClient {
    #[must_use]
    pub fn new(http: DatabricksHttp) -> Self {
        Self { http }
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
    pub async fn list_clusters(&self) -> Result<Value> {
        tracing::info!("listing clusters");
        self.http.get("/api/2.0/clusters/list", &[]).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty `cluster_id`, or any
    /// error from the call.
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<Value> {
        let cluster_id = require(cluster_id, "cluster_id")?;
        tracing::info!(cluster_id, "getting cluster");
        self.http
            .get("/api/2.0/clusters/get", &[("cluster_id", cluster_id.to_string())])
            .await
    }

    /// Create a cluster from a full cluster spec.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] if `cluster_name`, `spark_version`
    /// or `node_type_id` is missing, or any error from the call.
    pub async fn create_cluster(&self, spec: Value) -> Result<Value> {
        let Some(fields) = spec.as_object() else {
            return Err(MagpieError::Validation(
                "cluster spec must be a JSON object".into(),
            ));
        };
        for field in REQUIRED_CREATE_FIELDS {
            if fields.get(field).is_none_or(Value::is_null) {
                return Err(MagpieError::Validation(format!(
                    "missing required field: {field}"
                )));
            }
        }
        tracing::info!(cluster_name = %fields["cluster_name"], "creating cluster");
        self.http.post("/api/2.0/clusters/create", spec).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty `cluster_id`, or any
    /// error from the call.
    pub async fn start_cluster(&self, cluster_id: &str) -> Result<Value> {
        let cluster_id = require(cluster_id, "cluster_id")?;
        tracing::info!(cluster_id, "starting cluster");
        self.http
            .post("/api/2.0/clusters/start", json!({ "cluster_id": cluster_id }))
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty `cluster_id`, or any
    /// error from the call.
    pub async fn restart_cluster(&self, cluster_id: &str) -> Result<Value> {
        let cluster_id = require(cluster_id, "cluster_id")?;
        tracing::info!(cluster_id, "restarting cluster");
        self.http
            .post("/api/2.0/clusters/restart", json!({ "cluster_id": cluster_id }))
            .await
    }

    /// Terminate (not permanently delete) a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty `cluster_id`, or any
    /// error from the call.
    pub async fn terminate_cluster(&self, cluster_id: &str) -> Result<Value> {
        let cluster_id = require(cluster_id, "cluster_id")?;
        tracing::info!(cluster_id, "terminating cluster");
        self.http
            .post("/api/2.0/clusters/delete", json!({ "cluster_id": cluster_id }))
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty `cluster_id`, or any
    /// error from the call.
    pub async fn resize_cluster(&self, cluster_id: &str, num_workers: u32) -> Result<Value> {
        let cluster_id = require(cluster_id, "cluster_id")?;
        tracing::info!(cluster_id, num_workers, "resizing cluster");
        self.http
            .post(
                "/api/2.0/clusters/resize",
                json!({ "cluster_id": cluster_id, "num_workers": num_workers }),
            )
            .await
    }
}
