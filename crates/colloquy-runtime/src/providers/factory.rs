//! Provider factory pattern for dynamic completion-backend registration.
//!
//! New backends register factories that build instances from the shared
//! [`ProviderSettings`], so adding one never touches an enum.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let service = registry.create(&settings)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ProviderSettings;

use super::{CompletionService, ProviderError};

/// Factory for creating completion services from settings.
///
/// Each factory is responsible for:
/// 1. Validating the settings it understands
/// 2. Creating service instances
/// 3. Providing a unique type identifier
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier for this provider type, matched against
    /// `provider.name` in the config.
    fn provider_type(&self) -> &'static str;

    /// Create a service instance from settings.
    fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn CompletionService>, ProviderError>;

    /// Validate settings without creating a service.
    ///
    /// Use this for fast checks during startup.
    fn validate_settings(&self, settings: &ProviderSettings) -> Result<(), ProviderError>;

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "Completion provider"
    }
}

/// Registry of available provider factories.
///
/// Maps `provider.name` values to their factories; the CLI resolves its
/// backend through this at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory.
    ///
    /// If a factory with the same type already exists, it will be replaced.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create a service for the backend the settings name.
    pub fn create(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn CompletionService>, ProviderError> {
        self.factories
            .get(&settings.name)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Unknown provider type: '{}'. Available: {:?}",
                    settings.name,
                    self.available_types()
                ))
            })?
            .create(settings)
    }

    /// Validate settings for the backend they name.
    pub fn validate(&self, settings: &ProviderSettings) -> Result<(), ProviderError> {
        self.factories
            .get(&settings.name)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("Unknown provider type: '{}'", settings.name))
            })?
            .validate_settings(settings)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a provider type is registered.
    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Get the factory for a provider type.
    pub fn get_factory(&self, provider_type: &str) -> Option<&Arc<dyn ProviderFactory>> {
        self.factories.get(provider_type)
    }

    /// Create a registry with all built-in providers registered.
    #[cfg(feature = "anthropic")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::AnthropicProviderFactory));
        registry
    }

    /// Create a registry with all built-in providers registered.
    #[cfg(not(feature = "anthropic"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
