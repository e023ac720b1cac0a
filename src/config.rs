//! Kernel configuration.
//!
//! Configuration is a JSON document (all fields optional) plus environment
//! overrides:
//!
//! - `SIGN_STREAM_CONFIG`: path to the JSON document
//! - `SIGN_STREAM_CACHE_ENTRIES`: linearization cache capacity
//! - `SIGN_STREAM_CACHE_ENABLED`: `true`/`false`
//! - `SIGN_STREAM_ALIGNMENT_HINT`: `strict`, `prefer-earlier` or `prefer-later`
//! - `SIGN_STREAM_AUTHOR`: author id recorded on edges created by reconciliation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cache::CacheConfig;
use crate::reconciler::AlignmentConfig;
use crate::types::AuthorId;
use crate::vocabulary::AttributeVocabulary;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_VAR: &str = "SIGN_STREAM_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document is not valid configuration (including vocabulary errors).
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kernel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Attribute-value ids with special meaning.
    pub vocabulary: AttributeVocabulary,
    /// Alignment settings for reconciliation.
    pub alignment: AlignmentConfig,
    /// Linearization cache settings.
    pub cache: CacheConfig,
    /// Author of edges created by reconciliation.
    pub author: AuthorId,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            vocabulary: AttributeVocabulary::default(),
            alignment: AlignmentConfig::default(),
            cache: CacheConfig::default(),
            author: AuthorId::new(1),
        }
    }
}

impl KernelConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `SIGN_STREAM_CONFIG` (or defaults) and apply environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        Ok(base.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply overrides from a variable lookup. Unparseable values are
    /// ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = parsed::<usize>(&lookup, "SIGN_STREAM_CACHE_ENTRIES") {
            self.cache.max_entries = n;
        }
        if let Some(enabled) = parsed::<bool>(&lookup, "SIGN_STREAM_CACHE_ENABLED") {
            self.cache.enabled = enabled;
        }
        if let Some(hint) = parsed(&lookup, "SIGN_STREAM_ALIGNMENT_HINT") {
            self.alignment.hint = hint;
        }
        if let Some(author) = parsed::<u32>(&lookup, "SIGN_STREAM_AUTHOR") {
            self.author = AuthorId::new(author);
        }
        self
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::AlignmentHint;
    use crate::vocabulary::AttributeRole;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(KernelConfig::from_json("{}").unwrap(), KernelConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = KernelConfig::from_json(
            r#"{"alignment": {"hint": "prefer-later"}, "cache": {"max_entries": 5}, "author": 42}"#,
        )
        .unwrap();
        assert_eq!(config.alignment.hint, AlignmentHint::PreferLaterMatch);
        assert_eq!(config.cache.max_entries, 5);
        assert!(config.cache.enabled);
        assert_eq!(config.author, AuthorId::new(42));
    }

    #[test]
    fn test_vocabulary_round_trips_through_config() {
        let config = KernelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back = KernelConfig::from_json(&json).unwrap();
        assert_eq!(back.vocabulary.id(AttributeRole::Vacat), config.vocabulary.id(AttributeRole::Vacat));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SIGN_STREAM_CACHE_ENTRIES", "64"),
            ("SIGN_STREAM_CACHE_ENABLED", "false"),
            ("SIGN_STREAM_ALIGNMENT_HINT", "prefer-earlier"),
            ("SIGN_STREAM_AUTHOR", "not-a-number"),
        ]);
        let config = KernelConfig::default().with_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.cache.max_entries, 64);
        assert!(!config.cache.enabled);
        assert_eq!(config.alignment.hint, AlignmentHint::PreferEarlierMatch);
        assert_eq!(config.author, AuthorId::new(1));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            KernelConfig::from_file("/nonexistent/sign-stream.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
