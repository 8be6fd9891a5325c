use crate::models::ModelConfig;
use magpie_types::MagpieError;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Azure AD authority used for the client-credentials flow.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Well-known Azure AD application id of Azure Databricks, as a `.default` scope.
pub const DATABRICKS_SCOPE: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d/.default";

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}
fn default_scope() -> String {
    DATABRICKS_SCOPE.to_string()
}
fn default_refresh_margin() -> u64 {
    300
}

/// Databricks workspace and service principal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabricksConfig {
    /// Workspace base URL, e.g. `https://adb-123.azuredatabricks.net`.
    #[serde(default)]
    pub workspace_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub tenant_id: String,
    /// Warehouse used by SQL tools when the caller does not name one.
    #[serde(default)]
    pub warehouse_id: Option<String>,
    /// Model serving endpoint queried when the caller does not name one.
    #[serde(default)]
    pub serving_endpoint: Option<String>,
    /// Static bearer token. When set, the service principal fields are optional.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Minimum remaining validity of a cached token before it is refreshed.
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_secs: u64,
}

impl Default for DatabricksConfig {
    fn default() -> Self {
        Self {
            workspace_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            warehouse_id: None,
            serving_endpoint: None,
            token: None,
            authority: default_authority(),
            scope: default_scope(),
            token_refresh_margin_secs: default_refresh_margin(),
        }
    }
}

impl DatabricksConfig {
    #[must_use]
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }

    /// Check required fields and normalize the workspace URL.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] naming the first missing or malformed field.
    pub fn validate(&mut self) -> Result<(), MagpieError> {
        if self.workspace_url.is_empty() {
            return Err(MagpieError::Config(
                "DATABRICKS_WORKSPACE_URL is required".into(),
            ));
        }
        if !self.workspace_url.starts_with("https://") && !self.workspace_url.starts_with("http://")
        {
            return Err(MagpieError::Config(
                "DATABRICKS_WORKSPACE_URL must start with http:// or https://".into(),
            ));
        }
        self.workspace_url = self.workspace_url.trim_end_matches('/').to_string();

        let has_static_token = self.token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_static_token {
            for (value, name) in [
                (&self.client_id, "DATABRICKS_CLIENT_ID"),
                (&self.client_secret, "DATABRICKS_CLIENT_SECRET"),
                (&self.tenant_id, "DATABRICKS_TENANT_ID"),
            ] {
                if value.is_empty() {
                    return Err(MagpieError::Config(format!(
                        "{name} is required for service principal authentication"
                    )));
                }
            }
        }

        if let Some(id) = &self.warehouse_id
            && !id.is_empty()
            && id.len() < 10
        {
            tracing::warn!(warehouse_id = %id, "warehouse id seems unusually short");
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    300
}

/// Settings for the pooled HTTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total timeout of a single HTTP call (defaults to 300).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Interval and ceiling of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
}

fn default_sql_poll() -> PollSettings {
    PollSettings {
        interval_secs: 2,
        max_wait_secs: 300,
    }
}
fn default_jobs_poll() -> PollSettings {
    PollSettings {
        interval_secs: 10,
        max_wait_secs: 3600,
    }
}
fn default_wait_timeout() -> String {
    "30s".to_string()
}

/// Polling policies for the asynchronous remote operations.
///
/// SQL statements poll fast with a short ceiling, job runs poll slowly with a
/// long one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_sql_poll")]
    pub sql: PollSettings,
    #[serde(default = "default_jobs_poll")]
    pub jobs: PollSettings,
    /// Server-side `wait_timeout` sent with a statement submission.
    #[serde(default = "default_wait_timeout")]
    pub sql_wait_timeout: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sql: default_sql_poll(),
            jobs: default_jobs_poll(),
            sql_wait_timeout: default_wait_timeout(),
        }
    }
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Tool server listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_level() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `magpie_databricks=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub databricks: DatabricksConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub models: ModelConfig,
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &std::path::Path) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    /// Loads defaults, then the optional YAML file, then the process
    /// environment, and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] if any layer fails to parse or a
    /// required value is missing.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, MagpieError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an injectable environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] if any layer fails to parse or a
    /// required value is missing.
    pub fn load_with(
        path: Option<&std::path::Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MagpieError> {
        Self::merge_with(path, lookup)?.validate()
    }

    /// Merge every layer like [`Config::load_with`] without validating, for
    /// commands that never reach the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] if any layer fails to parse.
    pub fn merge_with(
        path: Option<&std::path::Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MagpieError> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(MagpieError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = crate::env::merge_env(figment, &lookup)?
            .merge(Env::prefixed("MAGPIE_").split("__"));

        figment
            .extract()
            .map_err(|e| MagpieError::Config(e.to_string()))
    }

    /// Validate and normalize the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] describing the first invalid value.
    pub fn validate(mut self) -> Result<Self, MagpieError> {
        self.databricks.validate()?;
        if self.http.timeout_secs == 0 {
            return Err(MagpieError::Config("http.timeout_secs must be > 0".into()));
        }
        for (name, poll) in [("sql", self.polling.sql), ("jobs", self.polling.jobs)] {
            if poll.interval_secs == 0 {
                return Err(MagpieError::Config(format!(
                    "polling.{name}.interval_secs must be > 0"
                )));
            }
        }
        Ok(self)
    }
}
