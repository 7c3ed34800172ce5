//! Pluggable validators over a loaded configuration.

use super::types::ProviderConfig;
use crate::validation::{Validate, ValidationError, ValidationResult};

/// A validator run by the loader after parsing.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any issues.
    fn validate(&self, config: &ProviderConfig) -> ValidationResult;
}

/// Built-in validator: checks every declared resource structurally and
/// rejects duplicate resource names within a kind.
#[derive(Debug, Default)]
pub struct DeclaredResourcesValidator;

impl DeclaredResourcesValidator {
    /// Create a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for DeclaredResourcesValidator {
    fn validate(&self, config: &ProviderConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut acl_names: Vec<&str> = Vec::new();
        for (idx, acl) in config.web_acls.iter().enumerate() {
            let path = format!("web_acls[{idx}]");
            if acl_names.contains(&acl.name.as_str()) {
                result.add_error(ValidationError::error(
                    format!("{path}.name"),
                    format!("duplicate web ACL name '{}'", acl.name),
                ));
            } else {
                acl_names.push(acl.name.as_str());
            }
            acl.validate(&path, &mut result);
        }

        let mut group_names: Vec<&str> = Vec::new();
        for (idx, group) in config.rule_groups.iter().enumerate() {
            let path = format!("rule_groups[{idx}]");
            if group_names.contains(&group.name.as_str()) {
                result.add_error(ValidationError::error(
                    format!("{path}.name"),
                    format!("duplicate rule group name '{}'", group.name),
                ));
            } else {
                group_names.push(group.name.as_str());
            }
            group.validate(&path, &mut result);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{DefaultAction, Scope, WebAcl};
    use crate::rule::VisibilityConfig;

    fn acl(name: &str) -> WebAcl {
        WebAcl {
            name: name.to_string(),
            scope: Scope::Regional,
            default_action: DefaultAction::Allow,
            description: None,
            rules: Vec::new(),
            visibility_config: VisibilityConfig::disabled(name),
        }
    }

    #[test]
    fn test_empty_config_is_valid() {
        let result = DeclaredResourcesValidator::new().validate(&ProviderConfig::default());
        assert!(result.is_valid());
    }

    #[test]
    fn test_duplicate_acl_names_rejected() {
        let config = ProviderConfig {
            web_acls: vec![acl("edge"), acl("edge")],
            ..ProviderConfig::default()
        };
        let result = DeclaredResourcesValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("duplicate web ACL"));
    }

    #[test]
    fn test_resource_errors_carry_indexed_path() {
        let mut bad = acl("edge");
        bad.visibility_config.metric_name.clear();
        let config = ProviderConfig {
            web_acls: vec![acl("other"), bad],
            ..ProviderConfig::default()
        };
        let result = DeclaredResourcesValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert!(result.errors_only()[0].field.starts_with("web_acls[1]"));
    }
}
