pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which decoder handles a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Structured code-mode object (`Text`, `Files`, `Conclusion`, ...).
    Fields,
    /// Free-form markdown with code fences.
    Fenced,
    /// Pick from the first non-whitespace character of the response.
    #[default]
    Auto,
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::Fields => write!(f, "fields"),
            DecodeMode::Fenced => write!(f, "fenced"),
            DecodeMode::Auto => write!(f, "auto"),
        }
    }
}

/// Decoder selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub mode: DecodeMode,
}

/// How input is split into fragments when replaying a captured response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    64
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// What the binary prints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub events: bool,
    #[serde(default = "default_true")]
    pub snapshot: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            events: true,
            snapshot: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            decoder: DecoderConfig::default(),
            replay: ReplayConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.decoder.mode, DecodeMode::Auto);
        assert_eq!(config.replay.chunk_size, 64);
        assert!(config.output.events);
        assert!(config.output.snapshot);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.decoder.mode, DecodeMode::Auto);
        assert_eq!(config.replay.chunk_size, 64);
    }

    #[test]
    fn test_decode_mode_serde() {
        let json = serde_json::to_string(&DecodeMode::Fenced).unwrap();
        assert_eq!(json, "\"fenced\"");
        let mode: DecodeMode = serde_yaml::from_str("fields").unwrap();
        assert_eq!(mode, DecodeMode::Fields);
        assert_eq!(DecodeMode::Auto.to_string(), "auto");
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let err = parse_config("replay: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
