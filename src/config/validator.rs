use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Result, RetrieveError, ValidationError};

/// Longest accepted delay between retries
pub const MAX_BACKOFF_SECONDS: f64 = 3600.0;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_api(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_output(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RetrieveError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_api(config: &Config, errors: &mut Vec<ValidationError>) {
        let url = &config.api.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ValidationError::new(
                "api.base_url",
                format!("Base URL must start with http:// or https://, got '{}'", url),
            ));
        }

        if config.api.api_key_env.trim().is_empty() {
            errors.push(ValidationError::new(
                "api.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if config.api.timeout_seconds == 0 {
            errors.push(ValidationError::new(
                "api.timeout_seconds",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.index.is_empty() {
            errors.push(ValidationError::new(
                "retrieval.index",
                "At least one index must be selected",
            ));
        }

        if retrieval.page_size == 0 {
            errors.push(ValidationError::new(
                "retrieval.page_size",
                "Page size must be greater than 0",
            ));
        }

        let backoff = retrieval.backoff_seconds;
        if !(0.0..=MAX_BACKOFF_SECONDS).contains(&backoff) {
            errors.push(ValidationError::new(
                "retrieval.backoff_seconds",
                format!(
                    "Backoff must be between 0 and {} seconds, got {}",
                    MAX_BACKOFF_SECONDS, backoff
                ),
            ));
        }
    }

    fn validate_output(config: &Config, errors: &mut Vec<ValidationError>) {
        let tag = &config.output.tag;
        if tag.is_empty() || tag.contains(char::is_whitespace) {
            errors.push(ValidationError::new(
                "output.tag",
                format!("Run tag must be a non-empty word, got '{}'", tag),
            ));
        }

        let format = &config.output.format;
        if format != "trec" && format != "jsonl" {
            errors.push(ValidationError::new(
                "output.format",
                format!("Format must be 'trec' or 'jsonl', got '{}'", format),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_page_size() {
        let mut config = Config::default();
        config.retrieval.page_size = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.index.clear();
        config.retrieval.backoff_seconds = f64::NAN;
        config.output.format = "csv".to_string();

        match ConfigValidator::validate(&config) {
            Err(RetrieveError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(
                    paths,
                    vec!["retrieval.index", "retrieval.backoff_seconds", "output.format"]
                );
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = Config::default();
        config.retrieval.backoff_seconds = MAX_BACKOFF_SECONDS;
        assert!(ConfigValidator::validate(&config).is_ok());

        for bad in [1e20, MAX_BACKOFF_SECONDS + 1.0, -0.5, f64::INFINITY] {
            config.retrieval.backoff_seconds = bad;
            assert!(ConfigValidator::validate(&config).is_err());
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "chatnoir.eu".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
