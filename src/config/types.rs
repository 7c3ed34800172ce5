//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::acl::{RuleGroup, Scope, WebAcl};

/// Top-level configuration: everything the provider is asked to keep
/// converged on the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider-wide settings.
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Declared web ACLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_acls: Vec<WebAcl>,

    /// Declared rule groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_groups: Vec<RuleGroup>,
}

/// Provider-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// Name used in logs and metrics.
    #[serde(default = "default_name")]
    pub name: String,

    /// Scope applied to resources that do not set their own.
    #[serde(default = "default_scope")]
    pub default_scope: Scope,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            default_scope: default_scope(),
        }
    }
}

fn default_name() -> String {
    "waf-provider".to_string()
}

fn default_scope() -> Scope {
    Scope::Regional
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.provider.name, "waf-provider");
        assert_eq!(config.provider.default_scope, Scope::Regional);
        assert!(config.web_acls.is_empty());
        assert!(config.rule_groups.is_empty());
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: ProviderConfig = toml::from_str("").unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let result: Result<ProviderConfig, _> = toml::from_str("[gateway]\nname = \"x\"\n");
        assert!(result.is_err());
    }
}
