//! Environment-variable layer.
//!
//! Maps the platform's flat variable names (`DATABRICKS_WORKSPACE_URL`,
//! `SERVER_PORT`, `DATA_SCIENTIST_AGENT_MODEL`, …) onto nested config keys.
//! Values are typed here so numeric-looking ids stay strings.

use figment::{Figment, providers::Serialized};
use magpie_types::{AgentKind, MagpieError};

#[derive(Clone, Copy)]
enum Kind {
    Str,
    Lower,
    U64,
    U16,
    F64,
}

const VARS: &[(&str, &str, Kind)] = &[
    ("DATABRICKS_WORKSPACE_URL", "databricks.workspace_url", Kind::Str),
    ("DATABRICKS_CLIENT_ID", "databricks.client_id", Kind::Str),
    ("DATABRICKS_CLIENT_SECRET", "databricks.client_secret", Kind::Str),
    ("DATABRICKS_TENANT_ID", "databricks.tenant_id", Kind::Str),
    ("DATABRICKS_WAREHOUSE_ID", "databricks.warehouse_id", Kind::Str),
    ("DATABRICKS_SERVING_ENDPOINT", "databricks.serving_endpoint", Kind::Str),
    ("DATABRICKS_TOKEN", "databricks.token", Kind::Str),
    ("DATABRICKS_AUTHORITY_HOST", "databricks.authority", Kind::Str),
    ("DATABRICKS_HTTP_TIMEOUT", "http.timeout_secs", Kind::U64),
    ("SERVER_HOST", "server.host", Kind::Str),
    ("SERVER_PORT", "server.port", Kind::U16),
    ("LOG_LEVEL", "log.level", Kind::Str),
    ("LOG_FORMAT", "log.format", Kind::Lower),
    ("LOG_FILE", "log.file", Kind::Str),
    ("MODEL_SELECTION_STRATEGY", "models.strategy", Kind::Str),
    ("DEFAULT_LLM_MODEL", "models.default_model", Kind::Str),
    ("AZURE_OPENAI_MODEL", "models.environment_model", Kind::Str),
    ("DEEPSEEK_TIMEOUT", "models.tuning.deepseek_timeout_secs", Kind::U64),
    ("DEEPSEEK_MAX_TOKENS", "models.tuning.deepseek_max_tokens", Kind::U64),
    ("LITELLM_REQUEST_TIMEOUT", "models.tuning.request_timeout_secs", Kind::U64),
    ("LITELLM_MAX_RETRIES", "models.tuning.max_retries", Kind::U64),
    ("DEFAULT_MAX_TOKENS", "models.tuning.max_tokens", Kind::U64),
    ("DEFAULT_TEMPERATURE", "models.tuning.temperature", Kind::F64),
];

fn invalid(var: &str, expected: &str) -> MagpieError {
    MagpieError::Config(format!("{var} must be {expected}"))
}

/// Merge every variable that `lookup` resolves into `figment`.
///
/// # Errors
///
/// Returns [`MagpieError::Config`] when a numeric variable does not parse.
pub fn merge_env(
    mut figment: Figment,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Figment, MagpieError> {
    for &(var, key, kind) in VARS {
        let Some(raw) = lookup(var) else { continue };
        let raw = raw.trim().to_string();
        figment = match kind {
            Kind::Str => figment.merge(Serialized::default(key, raw)),
            Kind::Lower => figment.merge(Serialized::default(key, raw.to_ascii_lowercase())),
            Kind::U64 => {
                let v: u64 = raw.parse().map_err(|_| invalid(var, "an integer"))?;
                figment.merge(Serialized::default(key, v))
            }
            Kind::U16 => {
                let v: u16 = raw.parse().map_err(|_| invalid(var, "a port number"))?;
                figment.merge(Serialized::default(key, v))
            }
            Kind::F64 => {
                let v: f64 = raw.parse().map_err(|_| invalid(var, "a number"))?;
                figment.merge(Serialized::default(key, v))
            }
        };
    }

    for agent in AgentKind::all() {
        if let Some(model) = lookup(agent.model_env_var()).filter(|m| !m.trim().is_empty()) {
            let name = serde_json::to_value(agent)?;
            let name = name.as_str().unwrap_or_default();
            figment = figment.merge(Serialized::default(
                &format!("models.agents.{name}"),
                model.trim().to_string(),
            ));
        }
    }
    Ok(figment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use std::collections::HashMap;

    fn extract(vars: &[(&str, &str)]) -> Result<Config, MagpieError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let figment = Figment::from(Serialized::defaults(Config::default()));
        merge_env(figment, &|k| map.get(k).cloned())?
            .extract()
            .map_err(|e| MagpieError::Config(e.to_string()))
    }

    #[test]
    fn test_databricks_vars() {
        let c = extract(&[
            ("DATABRICKS_WORKSPACE_URL", "https://adb.example.net"),
            ("DATABRICKS_CLIENT_ID", "cid"),
            ("DATABRICKS_TENANT_ID", "tid"),
        ])
        .unwrap();
        assert_eq!(c.databricks.workspace_url, "https://adb.example.net");
        assert_eq!(c.databricks.client_id, "cid");
        assert_eq!(c.databricks.tenant_id, "tid");
    }

    #[test]
    fn test_numeric_warehouse_id_stays_string() {
        let c = extract(&[("DATABRICKS_WAREHOUSE_ID", "1234567890")]).unwrap();
        assert_eq!(c.databricks.warehouse_id.as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_serving_endpoint_var() {
        let c = extract(&[("DATABRICKS_SERVING_ENDPOINT", "rag-advanced")]).unwrap();
        assert_eq!(c.databricks.serving_endpoint.as_deref(), Some("rag-advanced"));
    }

    #[test]
    fn test_port_parsed() {
        let c = extract(&[("SERVER_PORT", "8123")]).unwrap();
        assert_eq!(c.server.port, 8123);
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = extract(&[("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_log_format_case_insensitive() {
        let c = extract(&[("LOG_FORMAT", "JSON")]).unwrap();
        assert_eq!(c.log.format, crate::LogFormat::Json);
    }

    #[test]
    fn test_agent_model_var() {
        let c = extract(&[("DATA_SCIENTIST_AGENT_MODEL", "azure/gpt-4.1-mini")]).unwrap();
        assert_eq!(
            c.models.agents.get(&AgentKind::DataScientist).map(String::as_str),
            Some("azure/gpt-4.1-mini")
        );
    }

    #[test]
    fn test_blank_agent_model_ignored() {
        let c = extract(&[("GENERAL_CHAT_AGENT_MODEL", "  ")]).unwrap();
        assert!(c.models.agents.is_empty());
    }
}
