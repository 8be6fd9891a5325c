//! Model serving endpoints (`/serving-endpoints/*`).
//!
//! Chat-capable endpoints speak the OpenAI chat-completions protocol under
//! `<workspace>/serving-endpoints`, authenticated with the same bearer token
//! as the REST API. Replies are reduced to the generated text, the endpoint
//! name and token usage.

use crate::{http::DatabricksHttp, require};
use magpie_types::{MagpieError, traits::Result};
use serde_json::{Value, json};

/// One chat turn sent to a serving endpoint.
#[derive(Debug, Clone, bon::Builder)]
pub struct ChatQuery {
    #[builder(into)]
    pub prompt: String,
    /// Falls back to the client's default endpoint when absent.
    #[builder(into)]
    pub endpoint: Option<String>,
    #[builder(into)]
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl ChatQuery {
    fn body(&self, endpoint: &str, prompt: &str) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({ "model": endpoint, "messages": messages });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[derive(Debug)]
pub struct ServingClient {
    http: DatabricksHttp,
    default_endpoint: Option<String>,
}

impl ServingClient {
    #[must_use]
    pub fn new(http: DatabricksHttp, default_endpoint: Option<String>) -> Self {
        Self {
            http,
            default_endpoint: default_endpoint.filter(|e| !e.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn default_endpoint(&self) -> Option<&str> {
        self.default_endpoint.as_deref()
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
    pub async fn list_endpoints(&self) -> Result<Value> {
        tracing::info!("listing serving endpoints");
        self.http.get("/api/2.0/serving-endpoints", &[]).await
    }

    /// Send one chat turn and return `{"response", "model", "usage"}`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty prompt or when no
    /// endpoint is given or configured, [`MagpieError::Api`] when the reply
    /// carries no message, or any error from the call.
    pub async fn query(&self, query: ChatQuery) -> Result<Value> {
        let prompt = require(&query.prompt, "prompt")?;
        let endpoint = query
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .or(self.default_endpoint.as_deref())
            .ok_or_else(|| {
                MagpieError::Validation(
                    "endpoint is required (not provided and DATABRICKS_SERVING_ENDPOINT not set)"
                        .into(),
                )
            })?;

        tracing::info!(endpoint, "querying serving endpoint");
        let reply = self
            .http
            .post(
                "/serving-endpoints/chat/completions",
                query.body(endpoint, prompt),
            )
            .await?;
        summarize(endpoint, reply)
    }
}

fn summarize(endpoint: &str, reply: Value) -> Result<Value> {
    let Some(content) = reply
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    else {
        return Err(MagpieError::Api {
            message: format!("serving endpoint {endpoint} returned no message"),
            status: 200,
            body: reply,
        });
    };
    let usage = |field: &str| {
        reply
            .get("usage")
            .and_then(|u| u.get(field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    Ok(json!({
        "response": content,
        "model": endpoint,
        "usage": {
            "prompt_tokens": usage("prompt_tokens"),
            "completion_tokens": usage("completion_tokens"),
            "total_tokens": usage("total_tokens"),
        }
    }))
}
