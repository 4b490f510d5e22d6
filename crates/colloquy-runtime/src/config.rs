//! Runtime provider settings.
//!
//! The deterministic core parses and validates the shared config file but
//! deliberately ignores the `provider` section. This module owns that
//! section: which backend to talk to, the model knobs, the judge-score
//! cache, and optional token budgets. [`load_config`] reads one YAML file
//! and hands back both halves.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use colloquy_core::{Config, ConfigError, RoleKind};

use crate::providers::CompletionConfig;

/// Serde adapter for human-readable durations ("30s", "10m").
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// The `provider` section of the config file.
///
/// Every field has a default, so a file without a `provider` section
/// yields a usable Anthropic configuration that reads its key from
/// `ANTHROPIC_API_KEY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    /// Backend name, resolved through the provider registry
    pub name: String,

    /// Model identifier passed to the backend
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Override for the backend endpoint
    pub base_url: Option<String>,

    /// Per-request timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Admission bound on concurrent completion calls
    pub max_concurrent_requests: usize,

    /// Judge-score cache settings
    pub cache: CacheSettings,

    /// Optional token budgets
    pub budgets: BudgetSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "anthropic".to_string(),
            model: "claude-sonnet-4-5-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            timeout: Duration::from_secs(30),
            max_tokens: 1024,
            temperature: 0.2,
            max_concurrent_requests: 4,
            cache: CacheSettings::default(),
            budgets: BudgetSettings::default(),
        }
    }
}

/// Judge-score cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Whether judge completions are cached at all
    pub enabled: bool,

    /// Maximum cached entries
    pub capacity: u64,

    /// Time-to-live per entry
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Optional token budgets enforced by the orchestrator.
///
/// Keys of `per_role` are lowercase role names ("planner", "writer").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetSettings {
    /// Cap on total tokens across a session, unlimited when absent
    pub global: Option<u32>,

    /// Per-role caps, unlimited for roles not listed
    pub per_role: BTreeMap<String, u32>,
}

impl ProviderSettings {
    /// Parse the `provider` section out of a full config document.
    ///
    /// A document without the section (or an empty document) yields the
    /// defaults. The section itself is validated afterwards.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        let section = match value.get("provider") {
            Some(section) => section.clone(),
            None => serde_json::json!({}),
        };
        let settings: ProviderSettings = serde_json::from_value(section)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a config file's `provider` section.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Semantic validation beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.name must not be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.model must not be empty".to_string(),
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.api_key_env must not be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "provider.timeout must be positive".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_tokens must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "provider.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "provider.cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "provider.cache.ttl must be positive".to_string(),
            ));
        }
        self.budgets.validate()?;
        Ok(())
    }

    /// Per-call completion knobs derived from these settings.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            prompt_caching: true,
        }
    }
}

impl BudgetSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.global == Some(0) {
            return Err(ConfigError::ValidationError(
                "provider.budgets.global must be at least 1".to_string(),
            ));
        }
        for (role, limit) in &self.per_role {
            if !known_role_key(role) {
                return Err(ConfigError::ValidationError(format!(
                    "provider.budgets.per_role names unknown role '{}'",
                    role
                )));
            }
            if *limit == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "provider.budgets.per_role['{}'] must be at least 1",
                    role
                )));
            }
        }
        Ok(())
    }

    /// Budget for one role, if configured.
    pub fn for_role(&self, role: RoleKind) -> Option<u32> {
        self.per_role.get(&role_key(role)).copied()
    }
}

/// Lowercase role name as used for budget keys.
pub(crate) fn role_key(role: RoleKind) -> String {
    role.to_string().to_lowercase()
}

fn known_role_key(key: &str) -> bool {
    RoleKind::pipeline_order()
        .iter()
        .any(|role| role_key(*role) == key)
}

/// Load the shared core config and the provider settings from one file.
///
/// The core parse runs first so schema and semantic validation cover the
/// whole document, including the `provider` section this module consumes.
pub fn load_config(path: impl AsRef<Path>) -> Result<(Config, ProviderSettings), ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config = Config::from_yaml(&contents)?;
    let settings = ProviderSettings::from_yaml(&contents)?;
    Ok((config, settings))
}
