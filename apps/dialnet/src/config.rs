//! # Configuration
//!
//! Optional `dialnet.toml` read at startup.
//!
//! ```toml
//! [naming]
//! lowercase = true
//! max_length = 32
//!
//! [logging]
//! format = "json"
//! ```
//!
//! A missing file means defaults; a malformed file is an error.

use dialnet_core::primitives::MAX_NAME_LENGTH;
use dialnet_core::{DialnetError, IdentifierNormalizer, System, SystemBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dialnet.toml";

/// Environment variable overriding `[logging] format`.
pub const LOG_FORMAT_ENV: &str = "DIALNET_LOG_FORMAT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub naming: NamingConfig,
    pub logging: LoggingConfig,
}

/// Settings of the node/arc namespace normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub lowercase: bool,
    pub max_length: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            lowercase: false,
            max_length: MAX_NAME_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Output layer of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse `text` or `json`; anything else is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl AppConfig {
    /// Load the config at `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, DialnetError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            DialnetError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DialnetError> {
        let config: Self =
            toml::from_str(text).map_err(|e| DialnetError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DialnetError> {
        if self.naming.max_length == 0 {
            return Err(DialnetError::ConfigError(
                "naming.max_length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective log format: the environment wins over the file.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|value| LogFormat::parse(&value))
            .unwrap_or(self.logging.format)
    }

    #[must_use]
    pub fn normalizer(&self) -> IdentifierNormalizer {
        IdentifierNormalizer {
            lowercase: self.naming.lowercase,
            max_length: self.naming.max_length,
        }
    }

    /// A fresh model using the configured normalizer for both namespaces.
    #[must_use]
    pub fn build_system(&self) -> System {
        SystemBuilder::new()
            .normalizer(self.normalizer())
            .predicate_normalizer(self.normalizer())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialnet_core::TextNormalizer;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.naming.max_length, MAX_NAME_LENGTH);
    }

    #[test]
    fn sections_parse() {
        let config = AppConfig::from_toml_str(
            "[naming]\nlowercase = true\nmax_length = 8\n\n[logging]\nformat = \"json\"\n",
        )
        .expect("parse");
        assert!(config.naming.lowercase);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.normalizer().normalize("Hello World"), "hello_wo");
    }

    #[test]
    fn malformed_is_config_error() {
        for text in ["[naming\n", "[naming]\nmax_length = 0\n", "[other]\nx = 1\n"] {
            assert!(matches!(
                AppConfig::from_toml_str(text),
                Err(DialnetError::ConfigError(_))
            ));
        }
    }

    #[test]
    fn log_format_parse() {
        assert_eq!(LogFormat::parse(" JSON "), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
