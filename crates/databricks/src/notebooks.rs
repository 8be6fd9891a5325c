//! Workspace API (`/api/2.0/workspace/*`) for notebooks and directories.
//!
//! Content travels base64-encoded: [`NotebooksClient::import_notebook`] and
//! [`NotebooksClient::create_notebook`] encode, [`NotebooksClient::export_notebook`]
//! adds a decoded `content_text` field next to the raw `content`.

use crate::{http::DatabricksHttp, require};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use magpie_types::{MagpieError, traits::Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt, str::FromStr};

/// Notebook source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    Python,
    Sql,
    Scala,
    R,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "PYTHON",
            Self::Sql => "SQL",
            Self::Scala => "SCALA",
            Self::R => "R",
        }
    }

    /// Starter source for a new notebook.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::Python | Self::R => "# Databricks notebook source\nprint('Hello, Databricks!')",
            Self::Sql => "-- Databricks notebook source\nSELECT 'Hello, Databricks!' as greeting",
            Self::Scala => "// Databricks notebook source\nprintln(\"Hello, Databricks!\")",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = MagpieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PYTHON" => Ok(Self::Python),
            "SQL" => Ok(Self::Sql),
            "SCALA" => Ok(Self::Scala),
            "R" => Ok(Self::R),
            _ => Err(MagpieError::Validation(format!(
                "unsupported notebook language: {s}"
            ))),
        }
    }
}

/// Import/export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    #[default]
    Source,
    Html,
    Jupyter,
    Dbc,
    Auto,
}

impl Format {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Html => "HTML",
            Self::Jupyter => "JUPYTER",
            Self::Dbc => "DBC",
            Self::Auto => "AUTO",
        }
    }
}

impl FromStr for Format {
    type Err = MagpieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SOURCE" => Ok(Self::Source),
            "HTML" => Ok(Self::Html),
            "JUPYTER" => Ok(Self::Jupyter),
            "DBC" => Ok(Self::Dbc),
            "AUTO" => Ok(Self::Auto),
            _ => Err(MagpieError::Validation(format!("unsupported format: {s}"))),
        }
    }
}

#[derive(Debug)]
pub struct NotebooksClient {
    http: DatabricksHttp,
}

impl NotebooksClient {
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

    /// List the objects directly under `path`, optionally filtered by type
    /// (`NOTEBOOK`, `DIRECTORY`, `LIBRARY`, `FILE`).
    ///
    /// # Errors
    ///
    /// Returns any transport, auth or API error from the call.
    pub async fn list(&self, path: &str, object_type: Option<&str>) -> Result<Value> {
        let path = if path.trim().is_empty() { "/" } else { path };
        let mut query = vec![("path", path.to_string())];
        if let Some(t) = object_type.filter(|t| !t.is_empty()) {
            query.push(("object_type", t.to_ascii_uppercase()));
        }
        tracing::info!(path, "listing workspace objects");
        self.http.get("/api/2.0/workspace/list", &query).await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn get_status(&self, path: &str) -> Result<Value> {
        let path = require(path, "path")?;
        tracing::info!(path, "getting workspace object status");
        self.http
            .get("/api/2.0/workspace/get-status", &[("path", path.to_string())])
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn export_notebook(&self, path: &str, format: Format) -> Result<Value> {
        let path = require(path, "path")?;
        tracing::info!(path, format = format.as_str(), "exporting notebook");
        let mut resp = self
            .http
            .get(
                "/api/2.0/workspace/export",
                &[
                    ("path", path.to_string()),
                    ("format", format.as_str().to_string()),
                    ("direct_download", "false".to_string()),
                ],
            )
            .await?;
        let decoded = resp
            .get("content")
            .and_then(Value::as_str)
            .and_then(|c| STANDARD.decode(c).ok())
            .and_then(|bytes| String::from_utf8(bytes).ok());
        if let Some(text) = decoded {
            resp["content_text"] = Value::String(text);
        }
        Ok(resp)
    }

    /// Import `content` (plain text, encoded here) at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn import_notebook(
        &self,
        path: &str,
        content: &str,
        format: Format,
        language: Option<Language>,
        overwrite: bool,
    ) -> Result<Value> {
        let path = require(path, "path")?;
        let mut body = json!({
            "path": path,
            "content": STANDARD.encode(content.as_bytes()),
            "format": format.as_str(),
            "overwrite": overwrite,
        });
        if let Some(language) = language {
            body["language"] = Value::from(language.as_str());
        }
        tracing::info!(path, format = format.as_str(), overwrite, "importing notebook");
        self.http.post("/api/2.0/workspace/import", body).await
    }

    /// Create a source notebook, starting from the language template when no
    /// content is given. Existing notebooks are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn create_notebook(
        &self,
        path: &str,
        language: Language,
        content: Option<&str>,
    ) -> Result<Value> {
        let content = content.unwrap_or_else(|| language.template());
        self.import_notebook(path, content, Format::Source, Some(language), false)
            .await
    }

    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<Value> {
        let path = require(path, "path")?;
        tracing::info!(path, recursive, "deleting workspace object");
        self.http
            .post(
                "/api/2.0/workspace/delete",
                json!({ "path": path, "recursive": recursive }),
            )
            .await
    }

    /// Create a directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty path, or any error
    /// from the call.
    pub async fn mkdirs(&self, path: &str) -> Result<Value> {
        let path = require(path, "path")?;
        tracing::info!(path, "creating directory");
        self.http
            .post("/api/2.0/workspace/mkdirs", json!({ "path": path }))
            .await
    }

    /// Notebooks under `root` whose path contains `query`, case-insensitively.
    ///
    /// Walks the whole tree with one list call per directory, so the cost
    /// grows with the size of the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Validation`] for an empty query, or the first
    /// error from a list call.
    pub async fn search(
        &self,
        query: &str,
        root: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Value>> {
        let needle = require(query, "query")?.to_lowercase();
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let mut pending = vec![root.unwrap_or("/").to_string()];
        let mut found = Vec::new();

        while let Some(dir) = pending.pop() {
            let listing = self.list(&dir, None).await?;
            let objects = listing
                .get("objects")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for obj in objects {
                let path = obj
                    .get("path")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let kind = obj
                    .get("object_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match kind.as_str() {
                    "DIRECTORY" => pending.push(path),
                    "NOTEBOOK" if path.to_lowercase().contains(&needle) => {
                        found.push(obj);
                        if found.len() >= max_results {
                            tracing::info!(query, results = found.len(), "notebook search hit limit");
                            return Ok(found);
                        }
                    }
                    _ => {}
                }
            }
        }
        tracing::info!(query, results = found.len(), "notebook search finished");
        Ok(found)
    }
}
