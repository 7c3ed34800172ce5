//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::ProviderConfig;
use super::validation::Validator;
use std::path::Path;

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<ProviderConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load_str(&self, content: &str) -> ConfigResult<ProviderConfig> {
        let config: ProviderConfig = toml::from_str(content)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration against all registered validators.
    fn validate(&self, config: &ProviderConfig) -> ConfigResult<()> {
        for validator in &self.validators {
            let result = validator.validate(config);
            if !result.is_valid() {
                let errors: Vec<String> = result
                    .errors_only()
                    .iter()
                    .map(|e| e.to_string())
                    .collect();
                return Err(ConfigError::ValidationError(errors.join("; ")));
            }
        }
        Ok(())
    }

    /// Load configuration or return default if file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(&self, path: P) -> ConfigResult<ProviderConfig> {
        let path = path.as_ref();
        if path.exists() {
            self.load(path)
        } else {
            Ok(ProviderConfig::default())
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, config: &ProviderConfig, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::validation::DeclaredResourcesValidator;
    use super::*;
    use tempfile::tempdir;

    const BASIC: &str = r#"
        [provider]
        name = "edge"
        default_scope = "CLOUDFRONT"

        [[web_acls]]
        name = "edge-acl"
        scope = "CLOUDFRONT"
        default_action = "allow"

        [web_acls.visibility_config]
        sampled_requests_enabled = false
        cloud_watch_metrics_enabled = false
        metric_name = "edge-acl"

        [[web_acls.rules]]
        name = "block-admin"
        priority = 0
        action = "block"

        [web_acls.rules.statement.byte_match]
        positional_constraint = "starts_with"
        search_string = "/admin"
        field_to_match = "uri_path"

        [[web_acls.rules.statement.byte_match.text_transformations]]
        priority = 0
        kind = "lowercase"

        [web_acls.rules.visibility_config]
        sampled_requests_enabled = false
        cloud_watch_metrics_enabled = false
        metric_name = "block-admin"
    "#;

    #[test]
    fn test_load_from_string() {
        let loader = ConfigLoader::new();
        let config = loader.load_str(BASIC).unwrap();
        assert_eq!(config.provider.name, "edge");
        assert_eq!(config.web_acls.len(), 1);
        assert_eq!(config.web_acls[0].rules[0].name, "block-admin");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, BASIC).unwrap();

        let loader = ConfigLoader::new();
        let config = loader.load(&config_path).unwrap();
        assert_eq!(config.web_acls[0].name, "edge-acl");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let loader = ConfigLoader::new();
        let result = loader.load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new();
        let config = loader.load_or_default("/nonexistent/path").unwrap();
        assert_eq!(config.provider.name, "waf-provider");
    }

    #[test]
    fn test_validator_rejects_bad_resource() {
        let bad = BASIC.replace("priority = 0\n", "priority = 7\n");
        let loader = ConfigLoader::new().with_validator(DeclaredResourcesValidator::new());
        let result = loader.load_str(&bad);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("saved.toml");

        let loader = ConfigLoader::new();
        let mut config = loader.load_str(BASIC).unwrap();
        config.provider.name = "saved-provider".to_string();
        loader.save(&config, &config_path).unwrap();

        let loaded = loader.load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }
}
