//! Connection and authentication report for the configured workspace.

use crate::http::DatabricksHttp;
use magpie_config::DatabricksConfig;
use serde_json::{Value, json};

/// Configured identity, with credentials reduced to a short prefix.
#[derive(Debug, Clone)]
pub struct WorkspaceIdentity {
    workspace_url: String,
    auth_mode: &'static str,
    client_id: String,
    tenant_id: String,
}

fn mask(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "not configured".into();
    }
    let head: String = value.chars().take(8).collect();
    format!("{head}...")
}

impl WorkspaceIdentity {
    #[must_use]
    pub fn from_config(cfg: &DatabricksConfig) -> Self {
        let static_token = cfg.token.as_deref().is_some_and(|t| !t.is_empty());
        Self {
            workspace_url: cfg.workspace_url.trim_end_matches('/').to_string(),
            auth_mode: if static_token {
                "static_token"
            } else {
                "service_principal"
            },
            client_id: mask(&cfg.client_id),
            tenant_id: mask(&cfg.tenant_id),
        }
    }

    /// Acquire a token through `http` and describe the outcome.
    ///
    /// A failed token request is reported in the result, not returned as an
    /// error.
    pub async fn report(
        &self,
        http: &DatabricksHttp,
        warehouse_id: Option<&str>,
        serving_endpoint: Option<&str>,
    ) -> Value {
        let auth = http.authenticate().await;
        if let Err(e) = &auth {
            tracing::warn!(error = %e, "workspace status: authentication failed");
        }
        let mut report = json!({
            "workspace_url": self.workspace_url,
            "auth_mode": self.auth_mode,
            "authentication_status": if auth.is_ok() { "success" } else { "failed" },
            "client_id": self.client_id,
            "tenant_id": self.tenant_id,
            "serving_endpoints_url": format!("{}/serving-endpoints", self.workspace_url),
            "default_warehouse_id": warehouse_id,
            "default_serving_endpoint": serving_endpoint,
        });
        if let Err(e) = auth {
            report["error"] = json!(e.to_string());
        }
        report
    }
}
