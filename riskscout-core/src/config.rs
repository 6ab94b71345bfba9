//! Configuration system for Riskscout.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from the user config dir (`riskscout/config.toml`) and/or
//! `.riskscout/config.toml` in the workspace directory, then passed explicitly into the
//! orchestrator and provider constructors.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

impl ScoutConfig {
    /// Validate every section, returning human-readable problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.llm.validate();
        problems.extend(self.search.validate());
        problems.extend(self.breaker.validate());
        problems.extend(self.research.validate());
        problems
    }

    /// Like [`validate`](Self::validate), but fails on any problem.
    pub fn check(&self) -> std::result::Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

/// Configuration for the LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend: `openai`, `openai_compatible`, `azure`, `ollama` or `vllm`.
    pub provider: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Pricing used when the model is not in the built-in table.
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.2,
            max_tokens: 2048,
            timeout_secs: 60,
            input_cost_per_million: 0.15,
            output_cost_per_million: 0.60,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let provider = self.provider.trim().to_lowercase().replace('-', "_");
        if !crate::llm::KNOWN_PROVIDERS.contains(&provider.as_str()) {
            problems.push(format!("llm.provider '{}' is not supported", self.provider));
        }
        if self.model.trim().is_empty() {
            problems.push("llm.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            problems.push(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            problems.push("llm.max_tokens must be greater than 0".to_string());
        }
        problems
    }
}

/// Policy for the supplementary low-priority provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplementaryConfig {
    /// Global switch; when false the supplementary provider never runs.
    pub enabled: bool,
    /// When false, the provider is included for every query.
    pub context_aware: bool,
    /// Decision when no heuristic rule matches.
    pub default_include: bool,
    /// Cap on supplementary results, independent of the primary cap.
    pub max_results: usize,
    pub provider: String,
}

impl Default for SupplementaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_aware: true,
            default_include: true,
            max_results: 2,
            provider: "wikipedia".to_string(),
        }
    }
}

/// Configuration for search providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Primary web provider name.
    pub provider: String,
    /// Whether the academic branch runs.
    pub enable_academic: bool,
    pub academic_provider: String,
    pub tavily_api_key_env: String,
    pub semantic_scholar_api_key_env: String,
    /// Per-call timeout; a timed-out call counts as a provider failure.
    pub timeout_secs: u64,
    #[serde(default)]
    pub supplementary: SupplementaryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
            enable_academic: false,
            academic_provider: "semantic_scholar".to_string(),
            tavily_api_key_env: "TAVILY_API_KEY".to_string(),
            semantic_scholar_api_key_env: "SEMANTIC_SCHOLAR_API_KEY".to_string(),
            timeout_secs: 20,
            supplementary: SupplementaryConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.timeout_secs == 0 {
            problems.push("search.timeout_secs must be greater than 0".to_string());
        }
        if self.supplementary.max_results == 0 {
            problems.push("search.supplementary.max_results must be greater than 0".to_string());
        }
        problems
    }
}

/// Threshold and timeout for one class of breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    pub failure_threshold: usize,
    pub reset_timeout_secs: u64,
}

/// Breaker settings for the LLM backend and for each search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub llm: BreakerSettings,
    pub search: BreakerSettings,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            llm: BreakerSettings {
                failure_threshold: 5,
                reset_timeout_secs: 60,
            },
            search: BreakerSettings {
                failure_threshold: 3,
                reset_timeout_secs: 30,
            },
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, settings) in [("llm", &self.llm), ("search", &self.search)] {
            if settings.failure_threshold == 0 {
                problems.push(format!(
                    "breaker.{name}.failure_threshold must be greater than 0"
                ));
            }
        }
        problems
    }
}

/// Configuration for the research pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Similarity ratio at or above which two key points are merged.
    pub similarity_threshold: f64,
    /// Upper bound on key points entering the quadratic fuzzy merge.
    pub max_key_points: usize,
    /// Number of top-scored sources surfaced as "recommended to review".
    pub review_shortlist: usize,
    /// Maximum concurrent extraction calls per branch.
    pub extraction_concurrency: usize,
    /// Source content is truncated to this many characters in prompts.
    pub max_content_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            max_key_points: 200,
            review_shortlist: 2,
            extraction_concurrency: 4,
            max_content_chars: 4000,
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            problems.push(format!(
                "research.similarity_threshold must be within 0.0..=1.0, got {}",
                self.similarity_threshold
            ));
        }
        if self.extraction_concurrency == 0 {
            problems.push("research.extraction_concurrency must be greater than 0".to_string());
        }
        if self.max_key_points == 0 {
            problems.push("research.max_key_points must be greater than 0".to_string());
        }
        problems
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RISKSCOUT_`)
/// 3. Workspace-local config (`.riskscout/config.toml`)
/// 4. User config (`~/.config/riskscout/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ScoutConfig>,
) -> Result<ScoutConfig> {
    let mut figment = Figment::from(Serialized::defaults(ScoutConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "riskscout", "riskscout") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".riskscout").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RISKSCOUT_LLM__MODEL, RISKSCOUT_SEARCH__PROVIDER, etc.
    figment = figment.merge(Env::prefixed("RISKSCOUT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    Ok(config)
}
