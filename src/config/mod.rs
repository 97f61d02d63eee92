//! Configuration management for chatnoir-retrieve
//!
//! Settings live in a TOML file with one section per concern. A missing file
//! means defaults; selected keys can be overridden from the environment.

use crate::client::{Index, Slop, DEFAULT_BASE_URL};
use crate::error::{Result, RetrieveError};
use crate::retrieval::{Feature, FeatureSet, RetrieverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::{ConfigValidator, MAX_BACKOFF_SECONDS};

/// Schema version written to new configuration files
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Prefix of environment overrides, e.g. `CHATNOIR_RETRIEVE_RETRIEVAL__PAGE_SIZE`
pub const ENV_PREFIX: &str = "CHATNOIR_RETRIEVE_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub api: ApiConfig,
    pub retrieval: RetrieverConfig,
    pub output: OutputConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Search API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

/// Run file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Run tag written in the last column of TREC runs
    pub tag: String,
    pub format: String, // "trec" or "jsonl"
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RetrieveError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        let config: Config = toml::from_str(&content)?;

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RetrieveError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CHATNOIR_RETRIEVE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |message: String| RetrieveError::InvalidConfigValue {
            path: path.to_string(),
            message,
        };

        match path {
            "API__BASE_URL" => {
                self.api.base_url = value.to_string();
            }
            "API__API_KEY_ENV" => {
                self.api.api_key_env = value.to_string();
            }
            "RETRIEVAL__INDEX" => {
                self.retrieval.index = value
                    .split(',')
                    .map(str::parse::<Index>)
                    .collect::<Result<_>>()?;
            }
            "RETRIEVAL__FEATURES" => {
                self.retrieval.features = value
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(str::parse::<Feature>)
                    .collect::<Result<FeatureSet>>()?;
            }
            "RETRIEVAL__PHRASES" => {
                self.retrieval.phrases = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as boolean", value)))?;
            }
            "RETRIEVAL__SLOP" => {
                let slop: u8 = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
                self.retrieval.slop = Slop::try_from(slop)?;
            }
            "RETRIEVAL__NUM_RESULTS" => {
                self.retrieval.num_results = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        invalid(format!("Cannot parse '{}' as integer", value))
                    })?)
                };
            }
            "RETRIEVAL__PAGE_SIZE" => {
                self.retrieval.page_size = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
            }
            "OUTPUT__TAG" => {
                self.output.tag = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Read the API key from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        match std::env::var(&self.api.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(RetrieveError::Config(format!(
                "Must specify the ChatNoir API key in the {} environment variable",
                self.api.api_key_env
            ))),
        }
    }

    /// Retriever settings with the given API key filled in
    pub fn retriever_config(&self, api_key: impl Into<String>) -> RetrieverConfig {
        RetrieverConfig {
            api_key: api_key.into(),
            ..self.retrieval.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            RetrieveError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("chatnoir-retrieve").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key_env: "CHATNOIR_API_KEY".to_string(),
                timeout_seconds: 60,
            },
            retrieval: RetrieverConfig::default(),
            output: OutputConfig {
                tag: "chatnoir".to_string(),
                format: "trec".to_string(),
            },
        }
    }
}
