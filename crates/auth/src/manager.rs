//! Cached service principal token with single-flight refresh.
//!
//! Responsibilities:
//! - Acquire a bearer token through the client-credentials flow.
//! - Hand out the cached token while it has more than the safety margin left.
//! - Serialize refreshes so concurrent callers share one token request.
use crate::azure;
use async_trait::async_trait;
use magpie_config::DatabricksConfig;
use magpie_types::{AccessToken, MagpieError, TokenProvider, traits::Result};
use secrecy::SecretString;
use serde_json::Value;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ServicePrincipalAuth {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    margin: Duration,
    /// Held across the whole refresh so late arrivals wait for the result.
    cached: Mutex<Option<AccessToken>>,
    refreshes: AtomicU64,
}

impl ServicePrincipalAuth {
    /// Build a provider from the workspace settings.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Auth`] if a credential is missing or the HTTP
    /// client cannot be built.
    pub fn new(cfg: &DatabricksConfig) -> Result<Self> {
        for (value, name) in [
            (&cfg.client_id, "DATABRICKS_CLIENT_ID"),
            (&cfg.client_secret, "DATABRICKS_CLIENT_SECRET"),
            (&cfg.tenant_id, "DATABRICKS_TENANT_ID"),
        ] {
            if value.is_empty() {
                return Err(MagpieError::Auth(format!("{name} is not set")));
            }
        }

        // Tokens may be refreshed from short-lived runtimes, so no idle
        // connection is kept between requests.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MagpieError::Auth(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            token_url: azure::token_url(&cfg.authority, &cfg.tenant_id),
            client_id: cfg.client_id.clone(),
            client_secret: SecretString::from(cfg.client_secret.clone()),
            scope: cfg.scope.clone(),
            margin: cfg.refresh_margin(),
            cached: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Number of token requests issued so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Drop the cached token; the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn acquire(&self) -> Result<AccessToken> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(client_id = %self.client_id, "acquiring access token from Azure AD");

        let form = azure::client_credentials_form(&self.client_id, &self.client_secret, &self.scope);
        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "identity provider unreachable");
                MagpieError::Auth(format!("identity provider unreachable: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = azure::describe_rejection(status.as_u16(), &body);
            tracing::error!(status = status.as_u16(), "{message}");
            return Err(MagpieError::Auth(message));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| MagpieError::Auth(format!("invalid token response: {e}")))?;
        let token = azure::parse_token_response(&json)?;
        tracing::info!(
            expires_in = token.remaining().as_secs(),
            "acquired access token"
        );
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalAuth {
    async fn get_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(self.margin)
        {
            return Ok(token.secret().to_string());
        }
        let token = self.acquire().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }
}
