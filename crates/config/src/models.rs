//! Per-agent LLM model selection.

use magpie_types::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model used when nothing else is configured.
pub const FALLBACK_MODEL: &str = "azure/gpt-4.1";

/// How an agent's model identifier is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStrategy {
    /// The agent's own variable, falling back to [`ModelStrategy::Default`].
    #[default]
    AgentSpecific,
    /// `DEFAULT_LLM_MODEL`, falling back to [`ModelStrategy::Environment`].
    Default,
    /// `AZURE_OPENAI_MODEL` only.
    Environment,
    /// Any unrecognised value; behaves like [`ModelStrategy::Default`].
    #[serde(other)]
    Unknown,
}

fn default_environment_model() -> String {
    FALLBACK_MODEL.to_string()
}

/// Request tuning applied to every model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTuning {
    #[serde(default = "default_deepseek_timeout")]
    pub deepseek_timeout_secs: u64,
    #[serde(default = "default_deepseek_max_tokens")]
    pub deepseek_max_tokens: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Retries for slow reasoning models.
    #[serde(default = "default_max_retries")]
    pub max_retries: u64,
}

fn default_deepseek_timeout() -> u64 {
    180
}
fn default_deepseek_max_tokens() -> u64 {
    4000
}
fn default_request_timeout() -> u64 {
    60
}
fn default_max_tokens() -> u64 {
    1000
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_retries() -> u64 {
    3
}

impl Default for ModelTuning {
    fn default() -> Self {
        Self {
            deepseek_timeout_secs: default_deepseek_timeout(),
            deepseek_max_tokens: default_deepseek_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
        }
    }
}

/// Request parameters for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParams {
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u64>,
}

/// Model selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub strategy: ModelStrategy,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default = "default_environment_model")]
    pub environment_model: String,
    /// Agent-specific model identifiers.
    #[serde(default)]
    pub agents: HashMap<AgentKind, String>,
    #[serde(default)]
    pub tuning: ModelTuning,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            strategy: ModelStrategy::AgentSpecific,
            default_model: None,
            environment_model: default_environment_model(),
            agents: HashMap::new(),
            tuning: ModelTuning::default(),
        }
    }
}

impl ModelConfig {
    /// Model identifier for `agent` under the configured strategy.
    #[must_use]
    pub fn resolve(&self, agent: AgentKind) -> String {
        match self.strategy {
            ModelStrategy::AgentSpecific => {
                if let Some(model) = self.agents.get(&agent).filter(|m| !m.is_empty()) {
                    return model.clone();
                }
                tracing::debug!(
                    agent = %agent,
                    var = agent.model_env_var(),
                    "agent-specific model not configured, using default"
                );
                self.default_or_environment()
            }
            ModelStrategy::Default => self.default_or_environment(),
            ModelStrategy::Environment => self.environment_model.clone(),
            ModelStrategy::Unknown => {
                tracing::warn!("unknown model selection strategy, using default");
                self.default_or_environment()
            }
        }
    }

    fn default_or_environment(&self) -> String {
        self.default_model
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(|| self.environment_model.clone(), str::to_string)
    }

    /// Request parameters for `model`.
    ///
    /// DeepSeek models get a longer timeout, a larger token budget and retries.
    #[must_use]
    pub fn params_for(&self, model: &str) -> ModelParams {
        let t = &self.tuning;
        if model.to_ascii_lowercase().contains("deepseek") {
            ModelParams {
                model: model.to_string(),
                timeout_secs: t.deepseek_timeout_secs,
                max_tokens: t.deepseek_max_tokens,
                temperature: t.temperature,
                max_retries: Some(t.max_retries),
            }
        } else {
            ModelParams {
                model: model.to_string(),
                timeout_secs: t.request_timeout_secs,
                max_tokens: t.max_tokens,
                temperature: t.temperature,
                max_retries: None,
            }
        }
    }

    /// Warnings for agents that fall back to the shared model.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.strategy == ModelStrategy::Unknown {
            issues.push("unknown model selection strategy".to_string());
        }
        if self.strategy == ModelStrategy::AgentSpecific {
            for agent in AgentKind::all() {
                if !self.agents.get(agent).is_some_and(|m| !m.is_empty()) {
                    issues.push(format!("{} not set for {agent}", agent.model_env_var()));
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chain() {
        let mut c = ModelConfig::default();
        assert_eq!(c.resolve(AgentKind::GeneralChat), FALLBACK_MODEL);

        c.default_model = Some("azure/gpt-4.1-mini".into());
        assert_eq!(c.resolve(AgentKind::GeneralChat), "azure/gpt-4.1-mini");

        c.agents
            .insert(AgentKind::GeneralChat, "azure/gpt-4.1-nano".into());
        assert_eq!(c.resolve(AgentKind::GeneralChat), "azure/gpt-4.1-nano");
        assert_eq!(c.resolve(AgentKind::DataScientist), "azure/gpt-4.1-mini");
    }

    #[test]
    fn test_environment_strategy_ignores_overrides() {
        let mut c = ModelConfig {
            strategy: ModelStrategy::Environment,
            default_model: Some("azure/gpt-4.1-mini".into()),
            ..ModelConfig::default()
        };
        c.agents
            .insert(AgentKind::MasterCoordinator, "azure/o3".into());
        assert_eq!(c.resolve(AgentKind::MasterCoordinator), FALLBACK_MODEL);
    }

    #[test]
    fn test_unknown_strategy_deserializes() {
        let c: ModelConfig = serde_json::from_str(r#"{"strategy":"round_robin"}"#).unwrap();
        assert_eq!(c.strategy, ModelStrategy::Unknown);
        assert_eq!(c.resolve(AgentKind::GeneralChat), FALLBACK_MODEL);
        assert!(!c.validate().is_empty());
    }

    #[test]
    fn test_params_for_deepseek() {
        let c = ModelConfig::default();
        let p = c.params_for("azure/DeepSeek-R1-0528");
        assert_eq!(p.timeout_secs, 180);
        assert_eq!(p.max_tokens, 4000);
        assert_eq!(p.max_retries, Some(3));
        assert!((p.temperature - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_params_for_standard_model() {
        let p = ModelConfig::default().params_for("azure/gpt-4.1");
        assert_eq!(p.timeout_secs, 60);
        assert_eq!(p.max_tokens, 1000);
        assert_eq!(p.max_retries, None);
    }

    #[test]
    fn test_validate_reports_missing_agents() {
        let mut c = ModelConfig::default();
        assert_eq!(c.validate().len(), AgentKind::all().len());
        for agent in AgentKind::all() {
            c.agents.insert(*agent, "azure/gpt-4.1".into());
        }
        assert!(c.validate().is_empty());
    }
}
