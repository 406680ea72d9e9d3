//! Action configuration
//!
//! Settings can be built in code or loaded from YAML/JSON documents, e.g.
//!
//! ```yaml
//! name: submit-form
//! observer_capacity: 64
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_NAME: &str = "action";

/// Settings for a single [`Action`](crate::Action)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Label attached to every log event emitted by the action
    #[serde(default = "default_name")]
    pub name: String,

    /// Per-observer buffer size. `None` keeps observers unbounded.
    ///
    /// An observer that falls this far behind is disconnected: its stream
    /// ends and the action carries on for everyone else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer_capacity: Option<usize>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            observer_capacity: None,
        }
    }
}

impl ActionConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound every observer's buffer
    pub fn with_observer_capacity(mut self, capacity: usize) -> Self {
        self.observer_capacity = Some(capacity);
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings for values the action cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name must not be empty"));
        }
        if self.observer_capacity == Some(0) {
            return Err(Error::config("observer_capacity must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActionConfig::default();
        assert_eq!(config.name, "action");
        assert_eq!(config.observer_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
name: submit-form
observer_capacity: 64
"#;
        let config = ActionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.name, "submit-form");
        assert_eq!(config.observer_capacity, Some(64));
    }

    #[test]
    fn test_parse_json_fills_defaults() {
        let config = ActionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ActionConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ActionConfig::from_yaml_str("observer_capacity: 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = ActionConfig::new().with_name("  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("name must not be empty"));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = ActionConfig::from_yaml_str("observer_capacity: [");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_round_trip_skips_unbounded_capacity() {
        let json = serde_json::to_string(&ActionConfig::new().with_name("save")).unwrap();
        assert_eq!(json, r#"{"name":"save"}"#);
    }
}
