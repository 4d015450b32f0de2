//! Walk configuration
//!
//! [`WalkConfig`] carries the knobs shared by the converter, pruner, populator
//! and mapper. It can be built in code or loaded from JSON/YAML.

use serde::{Deserialize, Serialize};

/// Default recursion depth cap
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default name of the per-node hook
pub const DEFAULT_HOOK_NAME: &str = "Run";

/// Settings shared by the graph walkers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct WalkConfig {
    /// Recursion depth past which walkers stop descending
    pub max_depth: usize,
    /// Desired key of the hook attached to every converted node
    pub hook_name: String,
    /// Keep absent fields as explicit nulls in converted maps
    pub include_nulls: bool,
    /// Let the pruner set emptied collections absent
    pub null_empty_collections: bool,
}

impl WalkConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With depth cap
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// With hook name
    #[inline]
    #[must_use]
    pub fn with_hook_name(mut self, name: impl Into<String>) -> Self {
        self.hook_name = name.into();
        self
    }

    /// With null retention
    #[inline]
    #[must_use]
    pub fn with_include_nulls(mut self, include: bool) -> Self {
        self.include_nulls = include;
        self
    }

    /// With empty-collection nulling
    #[inline]
    #[must_use]
    pub fn with_null_empty_collections(mut self, null_empty: bool) -> Self {
        self.null_empty_collections = null_empty;
        self
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// Returns error if the depth cap is zero or the hook name is blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be positive".into()));
        }
        if self.hook_name.trim().is_empty() {
            return Err(ConfigError::Invalid("hook_name must not be empty".into()));
        }
        Ok(())
    }

    /// Load and validate from JSON; missing keys take their defaults
    ///
    /// # Errors
    /// Returns error on malformed input or invalid settings
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate from YAML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns error on malformed input or invalid settings
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            hook_name: DEFAULT_HOOK_NAME.to_string(),
            include_nulls: false,
            null_empty_collections: true,
        }
    }
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed JSON source
    #[error("invalid JSON configuration: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Malformed YAML source
    #[error("invalid YAML configuration: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Parsed fine but failed validation
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WalkConfig::new();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.hook_name, "Run");
        assert!(!config.include_nulls);
        assert!(config.null_empty_collections);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = WalkConfig::new()
            .with_max_depth(8)
            .with_hook_name("Inspect")
            .with_include_nulls(true);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.hook_name, "Inspect");
        assert!(config.include_nulls);
    }

    #[test]
    fn json_partial_uses_defaults() {
        let config = WalkConfig::from_json(r#"{"max_depth": 10}"#).unwrap();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.hook_name, "Run");
    }

    #[test]
    fn yaml_loading() {
        let config = WalkConfig::from_yaml("hook_name: Touch\ninclude_nulls: true\n").unwrap();
        assert_eq!(config.hook_name, "Touch");
        assert!(config.include_nulls);
    }

    #[test]
    fn invalid_settings_rejected() {
        assert!(matches!(
            WalkConfig::from_json(r#"{"max_depth": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WalkConfig::from_yaml("hook_name: '  '"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WalkConfig::from_json("{"),
            Err(ConfigError::InvalidJson(_))
        ));
    }
}
