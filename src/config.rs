//! Configuration file loading.
//!
//! Every section is optional; a missing file section or key falls back to the
//! built-in default. API keys are resolved from the command line, then the
//! file, then the provider's environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::authenticity::{AuthenticityChecker, DEFAULT_SUSPICIOUS_VALUES};
use crate::inference::{
    ChatCompletionModel, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS, ProviderError, ProviderKind,
};
use crate::keywords::{DEFAULT_RANKING_TOP_K, DEFAULT_SUMMARY_TOP_K};
use crate::planner::{DEFAULT_MAX_INSIGHTS, DEFAULT_MAX_KEY_POINTS, PlannerOptions, VisualizationPlanner};
use crate::prompting::{self, FormatType, PromptBuilderError, PromptTemplates};
use crate::sentiment::{DEFAULT_NEGATIVE_THRESHOLD, DEFAULT_POSITIVE_THRESHOLD, SentimentScorer};
use crate::summary::SummaryBuilder;

pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid provider base_url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid prompt templates: {0}")]
    Prompts(#[from] PromptBuilderError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Defaults to the provider's standard chat model.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
    /// YAML or JSON file overriding the built-in prompts.
    pub prompts_file: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            prompts_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ranking_top_k: usize,
    pub summary_top_k: usize,
    pub positive_threshold: f64,
    pub negative_threshold: f64,
    /// Extra jieba-format dictionary entries for the segmenter.
    pub user_dictionary: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ranking_top_k: DEFAULT_RANKING_TOP_K,
            summary_top_k: DEFAULT_SUMMARY_TOP_K,
            positive_threshold: DEFAULT_POSITIVE_THRESHOLD,
            negative_threshold: DEFAULT_NEGATIVE_THRESHOLD,
            user_dictionary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_key_points: usize,
    pub max_insights: usize,
    pub suspicious_values: Vec<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_key_points: DEFAULT_MAX_KEY_POINTS,
            max_insights: DEFAULT_MAX_INSIGHTS,
            suspicious_values: DEFAULT_SUSPICIOUS_VALUES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub analysis: AnalysisConfig,
    pub planner: PlannerConfig,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            analysis: AnalysisConfig::default(),
            planner: PlannerConfig::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Read and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: shown.clone(),
            source,
        })?;
        config.validate()?;
        info!(path = %shown, provider = %config.provider.kind, "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: "<string>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be greater than 0".to_string()));
        }
        if self.analysis.negative_threshold > self.analysis.positive_threshold {
            return Err(ConfigError::Invalid(format!(
                "analysis.negative_threshold ({}) is above positive_threshold ({})",
                self.analysis.negative_threshold, self.analysis.positive_threshold
            )));
        }
        if self.analysis.summary_top_k == 0 || self.analysis.ranking_top_k == 0 {
            return Err(ConfigError::Invalid("analysis top_k values must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Option<Url>, ConfigError> {
        self.provider
            .base_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|source| ConfigError::InvalidBaseUrl {
                    url: url.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Command line, then config file, then the provider's environment variable.
    pub fn resolve_api_key(&self, cli_api_key: Option<&str>) -> Option<String> {
        self.resolve_api_key_with(cli_api_key, |name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with<F>(&self, cli_api_key: Option<&str>, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| !key.trim().is_empty();
        cli_api_key
            .filter(|k| non_empty(*k))
            .map(str::to_string)
            .or_else(|| self.provider.api_key.clone().filter(|k| non_empty(k.as_str())))
            .or_else(|| env(self.provider.kind.api_key_env()).filter(|k| non_empty(k.as_str())))
    }

    pub fn prompt_templates(&self) -> Result<PromptTemplates, ConfigError> {
        match &self.provider.prompts_file {
            Some(path) => Ok(prompting::read_prompt_templates_from_file(path, FormatType::from_path(path))?),
            None => Ok(PromptTemplates::default()),
        }
    }

    pub fn summary_builder(&self) -> SummaryBuilder {
        SummaryBuilder::new(
            SentimentScorer::new(self.analysis.positive_threshold, self.analysis.negative_threshold),
            self.analysis.ranking_top_k,
            self.analysis.summary_top_k,
        )
    }

    pub fn planner(&self) -> VisualizationPlanner {
        VisualizationPlanner::new(PlannerOptions {
            max_key_points: self.planner.max_key_points,
            max_insights: self.planner.max_insights,
        })
    }

    pub fn authenticity_checker(&self) -> AuthenticityChecker {
        AuthenticityChecker::new(self.planner.suspicious_values.clone())
    }

    /// Build the configured chat-completion client. Fails with an auth error when no key is found.
    pub fn build_provider(
        &self,
        api_key: Option<String>,
        templates: PromptTemplates,
    ) -> Result<ChatCompletionModel, ProviderError> {
        let mut model = ChatCompletionModel::new(self.provider.kind, api_key)?
            .with_temperature(self.provider.temperature)
            .with_max_tokens(self.provider.max_tokens)
            .with_timeout(Duration::from_secs(self.provider.timeout_secs))
            .with_templates(templates);
        if let Some(name) = &self.provider.model {
            model = model.with_model(name.clone());
        }
        if let Some(url) = self.base_url().map_err(|e| ProviderError::http(e.to_string()))? {
            model = model.with_base_url(url);
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider.kind, ProviderKind::DeepSeek);
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.analysis.ranking_top_k, 20);
        assert_eq!(config.analysis.summary_top_k, 10);
        assert_eq!(config.planner.max_key_points, 5);
        assert_eq!(config.planner.suspicious_values.len(), 9);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str("provider:\n  kind: qwen\n  timeout_secs: 5\nplanner:\n  max_insights: 2\n").unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Qwen);
        assert_eq!(config.provider.timeout_secs, 5);
        assert_eq!(config.provider.temperature, 0.3);
        assert_eq!(config.planner.max_insights, 2);
        assert_eq!(config.planner.max_key_points, 5);
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Config::from_yaml_str("provider:\n  base_url: not a url\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_invalid_thresholds() {
        let err = Config::from_yaml_str("analysis:\n  positive_threshold: -0.5\n  negative_threshold: 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_provider_kind() {
        assert!(matches!(
            Config::from_yaml_str("provider:\n  kind: mystery\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_api_key_precedence() {
        let mut config = Config::default();
        let env = |name: &str| (name == "DEEPSEEK_API_KEY").then(|| "from-env".to_string());

        assert_eq!(config.resolve_api_key_with(None, env), Some("from-env".to_string()));
        config.provider.api_key = Some("from-file".to_string());
        assert_eq!(config.resolve_api_key_with(None, env), Some("from-file".to_string()));
        assert_eq!(config.resolve_api_key_with(Some("from-cli"), env), Some("from-cli".to_string()));
        assert_eq!(config.resolve_api_key_with(Some(""), env), Some("from-file".to_string()));

        config.provider.api_key = None;
        config.provider.kind = ProviderKind::OpenAI;
        assert_eq!(config.resolve_api_key_with(None, env), None);
    }

    #[test]
    fn test_build_provider_without_key() {
        let err = Config::default().build_provider(None, PromptTemplates::default()).unwrap_err();
        assert_eq!(err.kind, crate::inference::ProviderErrorKind::Auth);
    }

    #[test]
    fn test_build_provider_applies_overrides() {
        let config = Config::from_yaml_str("provider:\n  model: deepseek-reasoner\n  timeout_secs: 7\n").unwrap();
        let model = config
            .build_provider(Some("k".to_string()), PromptTemplates::default())
            .unwrap();
        assert_eq!(model.model_id(), "deepseek-reasoner");
        assert_eq!(model.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output_dir: reports\nanalysis:\n  summary_top_k: 3").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("reports"));
        assert_eq!(config.summary_builder().summary_top_k, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
