//! Async clients for the Databricks REST API.
//!
//! Each resource client ([`ClustersClient`], [`JobsClient`], [`SqlClient`],
//! [`NotebooksClient`], [`ServingClient`]) owns its own [`DatabricksHttp`]
//! session. Required parameters are checked before any request is sent.
//! [`DatabricksClients`] wires them all from the application [`Config`].

pub mod clusters;
pub mod http;
pub mod jobs;
pub mod notebooks;
pub mod poll;
pub mod serving;
pub mod sql;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use clusters::ClustersClient;
pub use http::{ApiRequest, DatabricksHttp};
pub use jobs::JobsClient;
pub use notebooks::{Format, Language, NotebooksClient};
pub use poll::{PollPolicy, poll_until};
pub use serving::{ChatQuery, ServingClient};
pub use sql::{SqlClient, StatementParameter, StatementRequest};
pub use status::WorkspaceIdentity;

use magpie_config::Config;
use magpie_types::{MagpieError, TokenProvider, traits::Result};
use serde_json::Value;
use std::sync::Arc;

/// Trimmed `value`, or a validation error naming `name` if it is blank.
pub(crate) fn require<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MagpieError::missing(name));
    }
    Ok(value)
}

/// The resource clients of one workspace.
#[derive(Debug)]
pub struct DatabricksClients {
    pub clusters: ClustersClient,
    pub jobs: JobsClient,
    pub sql: SqlClient,
    pub notebooks: NotebooksClient,
    pub serving: ServingClient,
    identity: WorkspaceIdentity,
}

impl DatabricksClients {
    /// Build every client against `config.databricks.workspace_url`, sharing
    /// one token provider.
    #[must_use]
    pub fn new(config: &Config, auth: Arc<dyn TokenProvider>) -> Self {
        let url = &config.databricks.workspace_url;
        let timeout = config.http.timeout();
        let session = || DatabricksHttp::new(url, auth.clone(), timeout);

        Self {
            clusters: ClustersClient::new(session()),
            jobs: JobsClient::new(session()).with_poll(config.polling.jobs.into()),
            sql: SqlClient::new(session(), config.databricks.warehouse_id.clone())
                .with_poll(config.polling.sql.into())
                .with_wait_timeout(config.polling.sql_wait_timeout.clone()),
            notebooks: NotebooksClient::new(session()),
            serving: ServingClient::new(session(), config.databricks.serving_endpoint.clone()),
            identity: WorkspaceIdentity::from_config(&config.databricks),
        }
    }

    /// Build the token provider from `config` and then every client.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Auth`] if the token provider is missing a
    /// credential.
    pub fn from_config(config: &Config) -> Result<Self> {
        let auth = magpie_auth::token_provider(&config.databricks)?;
        Ok(Self::new(config, auth))
    }

    /// Release every client's session.
    pub fn close_all(&self) {
        self.clusters.close();
        self.jobs.close();
        self.sql.close();
        self.notebooks.close();
        self.serving.close();
    }

    /// Authentication state and defaults of the workspace; see
    /// [`WorkspaceIdentity::report`].
    pub async fn workspace_status(&self) -> Value {
        self.identity
            .report(
                self.serving.http(),
                self.sql.default_warehouse(),
                self.serving.default_endpoint(),
            )
            .await
    }
}
