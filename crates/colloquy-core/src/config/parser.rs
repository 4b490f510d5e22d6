//! Configuration parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::report::InterpretationThresholds;
use crate::rubric::JudgeConfig;
use crate::safety::SafetyConfig;
use crate::signal::SignalTokens;

use super::schema;

/// Errors that can occur when loading configuration.
///
/// Any of these is fatal at startup; nothing else in the system treats
/// configuration problems as recoverable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config schema validation failed: {0}")]
    SchemaError(String),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Pipeline loop limits and handoff signal tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Revision rounds the critic may request before the draft ships
    /// with its critique unresolved.
    pub max_revisions: u32,

    /// Tool-call rounds the researcher may run in one turn.
    pub max_tool_rounds: u32,

    /// Hard ceiling on trace steps per session.
    pub max_steps: u32,

    pub signals: SignalTokens,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_revisions: 3,
            max_tool_rounds: 3,
            max_steps: 16,
            signals: SignalTokens::default(),
        }
    }
}

/// Batch evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Queries evaluated concurrently.
    pub max_concurrency: usize,

    /// Optional cap on how many queries from the set are run.
    pub max_queries: Option<usize>,

    /// Default query set path for the batch command.
    pub queries_path: Option<String>,

    /// Judge with every configured perspective rather than the first.
    pub multi_perspective: bool,

    /// Directory reports are written to.
    pub output_dir: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_queries: None,
            queries_path: None,
            multi_perspective: true,
            output_dir: "outputs".to_string(),
        }
    }
}

/// Top-level configuration.
///
/// Every section has working defaults; an empty file is a valid config.
/// The provider section is structurally validated here but read by the
/// runtime crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub safety: SafetyConfig,
    pub judge: JudgeConfig,
    pub pipeline: PipelineConfig,
    pub evaluation: EvaluationConfig,
    pub thresholds: InterpretationThresholds,
}

impl Config {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut value: serde_json::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            value = serde_json::json!({});
        }

        schema::validate_config_schema(&value)
            .map_err(|errors| ConfigError::SchemaError(errors.join("; ")))?;

        // The provider section belongs to the runtime crate; it has
        // passed the schema, so drop it before typing the rest.
        if let Some(map) = value.as_object_mut() {
            map.remove("provider");
        }

        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Semantic validation beyond what the schema can express.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.safety.min_query_length >= self.safety.max_query_length {
            return Err(ConfigError::ValidationError(format!(
                "safety.min_query_length ({}) must be below max_query_length ({})",
                self.safety.min_query_length, self.safety.max_query_length
            )));
        }

        if self.safety.topic_keywords.is_empty() {
            return Err(ConfigError::ValidationError(
                "safety.topic_keywords must not be empty; every query would be off-topic"
                    .to_string(),
            ));
        }

        if self.judge.criteria.is_empty() {
            return Err(ConfigError::ValidationError(
                "judge.criteria must not be empty".to_string(),
            ));
        }

        if self.judge.perspectives.is_empty() {
            return Err(ConfigError::ValidationError(
                "judge.perspectives must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for perspective in &self.judge.perspectives {
            if !seen.insert(&perspective.id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate perspective id: {}",
                    perspective.id
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for criterion in &self.judge.criteria {
            if !seen.insert(&criterion.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate criterion name: {}",
                    criterion.name
                )));
            }
        }

        let signals = &self.pipeline.signals;
        if signals.approve == signals.revise
            || signals.handoff == signals.approve
            || signals.handoff == signals.revise
        {
            return Err(ConfigError::ValidationError(
                "pipeline.signals tokens must be pairwise distinct".to_string(),
            ));
        }

        let t = &self.thresholds;
        if !(t.moderate < t.good && t.good < t.excellent) {
            return Err(ConfigError::ValidationError(format!(
                "thresholds must be ordered: moderate ({}) < good ({}) < excellent ({})",
                t.moderate, t.good, t.excellent
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_valid_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.pipeline.max_revisions, 3);
        assert_eq!(config.evaluation.max_concurrency, 4);
    }

    #[test]
    fn test_partial_yaml_overrides_one_section() {
        let config = Config::from_yaml(
            r#"
pipeline:
  max_revisions: 1
"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.max_revisions, 1);
        assert_eq!(config.pipeline.max_steps, 16);
        assert_eq!(config.safety, crate::safety::SafetyConfig::default());
    }

    #[test]
    fn test_provider_section_is_tolerated() {
        let config = Config::from_yaml(
            r#"
provider:
  name: anthropic
  model: claude-3-5-haiku-latest
  timeout: 30s
"#,
        )
        .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_section_fails_schema() {
        let result = Config::from_yaml("observability:\n  level: debug\n");
        assert!(matches!(result, Err(ConfigError::SchemaError(_))));
    }

    #[test]
    fn test_inverted_lengths_fail_validation() {
        let result = Config::from_yaml(
            r#"
safety:
  min_query_length: 100
  max_query_length: 50
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_topic_keywords_fail_validation() {
        let result = Config::from_yaml("safety:\n  topic_keywords: []\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_duplicate_perspective_ids_fail() {
        let result = Config::from_yaml(
            r#"
judge:
  perspectives:
    - id: academic
      name: "First"
      system_prompt: "p"
    - id: academic
      name: "Second"
      system_prompt: "p"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_criterion_weight_fails_schema() {
        let result = Config::from_yaml(
            r#"
judge:
  criteria:
    - name: relevance
      weight: 0.0
"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaError(_))));
    }

    #[test]
    fn test_zero_perspective_weight_fails_schema() {
        let result = Config::from_yaml(
            r#"
judge:
  perspectives:
    - id: harsh
      name: Harsh Reviewer
      system_prompt: Judge harshly.
      weight: 0.0
"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaError(_))));
    }

    #[test]
    fn test_empty_signal_token_fails_schema() {
        let result = Config::from_yaml(
            r#"
pipeline:
  signals:
    handoff: ""
"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaError(_))));
    }

    #[test]
    fn test_identical_signal_tokens_fail() {
        let result = Config::from_yaml(
            r#"
pipeline:
  signals:
    approve: "SAME"
    revise: "SAME"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unordered_thresholds_fail() {
        let result = Config::from_yaml(
            r#"
thresholds:
  excellent: 0.5
  good: 0.6
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "colloquy-config-{}.yaml",
            std::process::id()
        ));
        fs::write(&path, "evaluation:\n  max_concurrency: 2\n").unwrap();

        let config = Config::from_yaml_file(&path).unwrap();
        assert_eq!(config.evaluation.max_concurrency, 2);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::from_yaml_file("/nonexistent/colloquy.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
