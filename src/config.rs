//! Engine configuration, loadable from TOML.

use crate::{FormtableError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Page size used when a query asks for page size 0
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound applied to every requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Whether search also matches `submission_ref_id`
    #[serde(default = "default_true")]
    pub search_metadata: bool,
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            search_metadata: default_true(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.default_page_size == 0 {
            Some("default_page_size must be at least 1".to_string())
        } else if self.max_page_size == 0 {
            Some("max_page_size must be at least 1".to_string())
        } else if self.default_page_size > self.max_page_size {
            Some(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.default_page_size, self.max_page_size
            ))
        } else {
            None
        };
        match problem {
            Some(message) => {
                warn!(%message, "rejecting engine config");
                Err(FormtableError::InvalidConfig(message))
            }
            None => Ok(()),
        }
    }

    /// Resolves a requested page size: 0 means the default, and the result
    /// never exceeds `max_page_size`.
    pub fn effective_page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 { self.default_page_size } else { requested };
        size.min(self.max_page_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 500);
        assert!(config.search_metadata);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = EngineConfig::from_toml_str("default_page_size = 25\n").unwrap();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.max_page_size, 500);
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("default_page_size = 0").unwrap_err();
        assert!(matches!(err, FormtableError::InvalidConfig(_)));
        let err = EngineConfig::from_toml_str("default_page_size = 50\nmax_page_size = 20").unwrap_err();
        assert!(matches!(err, FormtableError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("default_page_size = \"ten\"").unwrap_err();
        assert!(matches!(err, FormtableError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/formtable.toml").unwrap_err();
        assert!(matches!(err, FormtableError::Io(_)));
    }

    #[test]
    fn test_effective_page_size() {
        let config = EngineConfig::default();
        assert_eq!(config.effective_page_size(0), 10);
        assert_eq!(config.effective_page_size(25), 25);
        assert_eq!(config.effective_page_size(10_000), 500);
    }
}
