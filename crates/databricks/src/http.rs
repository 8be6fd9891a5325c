//! Authenticated JSON transport shared by the resource clients.
//!
//! Every call attaches a bearer token from the [`TokenProvider`], sends JSON,
//! and decodes the reply into a [`Value`]. Status codes of 400 and above
//! become [`MagpieError::Api`]; connection failures and timeouts become
//! [`MagpieError::Transport`].

use magpie_types::{MagpieError, TokenProvider, traits::Result};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// One REST call: method, workspace-relative path, optional body and query.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Pooled HTTP session bound to one workspace.
///
/// The session is created on first use and released by [`DatabricksHttp::close`];
/// a later call opens a fresh one.
pub struct DatabricksHttp {
    base_url: String,
    auth: Arc<dyn TokenProvider>,
    timeout: Duration,
    session: Mutex<Option<Client>>,
}

impl fmt::Debug for DatabricksHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabricksHttp")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl DatabricksHttp {
    /// `timeout` bounds each HTTP call, not a whole logical operation.
    pub fn new(base_url: &str, auth: Arc<dyn TokenProvider>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            timeout,
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a session is currently held.
    pub fn is_open(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Release the session and its pooled connections.
    pub fn close(&self) {
        if self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!(base_url = %self.base_url, "closed HTTP session");
        }
    }

    fn session(&self) -> Result<Client> {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder().timeout(self.timeout).build()?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Acquire a token without sending a request.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Auth`] if no token can be obtained.
    pub async fn authenticate(&self) -> Result<()> {
        self.auth.get_token().await.map(drop)
    }

    /// Send `req` and decode the reply.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Auth`] if no token can be obtained,
    /// [`MagpieError::Transport`] if the request cannot be completed and
    /// [`MagpieError::Api`] for any status of 400 or above.
    pub async fn send(&self, req: ApiRequest) -> Result<Value> {
        let token = self.auth.get_token().await?;
        let url = format!("{}{}", self.base_url, req.path);
        tracing::debug!(method = %req.method, url = %url, "databricks request");

        let mut builder = self
            .session()?
            .request(req.method, &url)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json");
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "HTTP transport error");
            MagpieError::from(e)
        })?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.as_u16() >= 400 {
            let err = api_error(status.as_u16(), &text);
            tracing::error!(status = status.as_u16(), url = %url, error = %err, "API request failed");
            return Err(err);
        }
        Ok(decode_body(&text))
    }

    /// # Errors
    ///
    /// See [`DatabricksHttp::send`].
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut req = ApiRequest::get(path);
        for (k, v) in query {
            req = req.query(k, v);
        }
        self.send(req).await
    }

    /// # Errors
    ///
    /// See [`DatabricksHttp::send`].
    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::post(path).body(body)).await
    }

    /// # Errors
    ///
    /// See [`DatabricksHttp::send`].
    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::put(path).body(body)).await
    }

    /// # Errors
    ///
    /// See [`DatabricksHttp::send`].
    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let mut req = ApiRequest::delete(path);
        if let Some(body) = body {
            req = req.body(body);
        }
        self.send(req).await
    }
}

/// Empty bodies decode to `{}`, non-JSON bodies to `{"response": text}`.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "response": text }))
}

/// Message comes from the body's `message` field, else the raw text, else
/// `HTTP <status>`.
pub(crate) fn api_error(status: u16, text: &str) -> MagpieError {
    let body = if text.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
    };
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map_or_else(|| format!("HTTP {status}"), str::to_string);
    MagpieError::Api {
        message,
        status,
        body,
    }
}
