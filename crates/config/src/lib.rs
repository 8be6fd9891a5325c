//! Configuration loading for the magpie tool layer.
//!
//! Uses figment to layer serialized defaults, an optional YAML file and the
//! process environment.

pub mod env;
pub mod models;
pub mod schema;

pub use models::{ModelConfig, ModelParams, ModelStrategy, ModelTuning};
pub use schema::{
    Config, DATABRICKS_SCOPE, DEFAULT_AUTHORITY, DatabricksConfig, HttpConfig, LogConfig,
    LogFormat, PollSettings, PollingConfig, ServerConfig,
};
