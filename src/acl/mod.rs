//! Top-level declared resources: web ACLs and rule groups.
//!
//! These are the aggregates handed to the remote control plane. Each one
//! owns an ordered set of [`Rule`]s and is validated as a whole before
//! any remote call.

use serde::{Deserialize, Serialize};

use crate::rule::{
    validate_rules, Rule, RuleWire, VisibilityConfig, VisibilityConfigWire,
};
use crate::statement::{DecodeError, DecodeResult, EmptyMarker, NodePath};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// Where the resource is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Deployed at the CDN edge.
    Cloudfront,
    /// Deployed in a single region.
    Regional,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cloudfront => write!(f, "CLOUDFRONT"),
            Self::Regional => write!(f, "REGIONAL"),
        }
    }
}

/// What a web ACL does with requests no rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    Allow,
    Block,
}

/// Wire form of [`DefaultAction`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct DefaultActionWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<EmptyMarker>,
}

impl DefaultAction {
    #[must_use]
    pub fn to_wire(&self) -> DefaultActionWire {
        let mut wire = DefaultActionWire::default();
        match self {
            Self::Allow => wire.allow = Some(EmptyMarker {}),
            Self::Block => wire.block = Some(EmptyMarker {}),
        }
        wire
    }

    /// Decode the wire form.
    ///
    /// # Errors
    ///
    /// Fails when no alternative is populated.
    pub fn from_wire(wire: &DefaultActionWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.allow.is_some() && wire.block.is_some() {
            tracing::warn!(path = %path, "default action populated both alternatives");
        }
        if wire.allow.is_some() {
            Ok(Self::Allow)
        } else if wire.block.is_some() {
            Ok(Self::Block)
        } else {
            Err(DecodeError::NoAlternative { path: path.clone() })
        }
    }
}

/// A web ACL: the entry point evaluated against incoming requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WebAcl {
    pub name: String,
    pub scope: Scope,
    /// Taken when no rule matches.
    pub default_action: DefaultAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    pub visibility_config: VisibilityConfig,
}

/// Wire form of [`WebAcl`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct WebAclWire {
    pub name: String,
    pub default_action: DefaultActionWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleWire>>,
    pub visibility_config: VisibilityConfigWire,
}

impl WebAcl {
    /// Build the wire form. Scope travels as a request parameter, not
    /// in the resource body.
    #[must_use]
    pub fn to_wire(&self) -> WebAclWire {
        WebAclWire {
            name: self.name.clone(),
            default_action: self.default_action.to_wire(),
            description: self.description.clone(),
            rules: if self.rules.is_empty() {
                None
            } else {
                Some(self.rules.iter().map(Rule::to_wire).collect())
            },
            visibility_config: self.visibility_config.to_wire(),
        }
    }

    /// Decode the wire form as fetched from the control plane.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or any rule fails to decode; the
    /// error path identifies the owning rule and the failing node.
    pub fn from_wire(wire: &WebAclWire, scope: Scope) -> DecodeResult<Self> {
        let path = NodePath::root(&wire.name);
        if wire.name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "WebACL",
                path,
            });
        }
        Ok(Self {
            name: wire.name.clone(),
            scope,
            default_action: DefaultAction::from_wire(
                &wire.default_action,
                &path.child("DefaultAction"),
            )?,
            description: wire.description.clone(),
            rules: decode_rules(wire.rules.as_deref().unwrap_or_default(), &path)?,
            visibility_config: VisibilityConfig::from_wire(&wire.visibility_config),
        })
    }
}

impl Validate for WebAcl {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.name"),
                "web ACL name cannot be empty",
            ));
        }
        self.visibility_config
            .validate(&format!("{path}.visibility_config"), result);
        validate_rules(&self.rules, path, result);
    }
}

/// A reusable rule group referenced from web ACLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleGroup {
    pub name: String,
    pub scope: Scope,
    /// Compute budget reserved at creation; immutable afterwards.
    pub capacity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    pub visibility_config: VisibilityConfig,
}

/// Wire form of [`RuleGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RuleGroupWire {
    pub name: String,
    pub capacity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleWire>>,
    pub visibility_config: VisibilityConfigWire,
}

impl RuleGroup {
    /// Build the wire form.
    #[must_use]
    pub fn to_wire(&self) -> RuleGroupWire {
        RuleGroupWire {
            name: self.name.clone(),
            capacity: self.capacity,
            description: self.description.clone(),
            rules: if self.rules.is_empty() {
                None
            } else {
                Some(self.rules.iter().map(Rule::to_wire).collect())
            },
            visibility_config: self.visibility_config.to_wire(),
        }
    }

    /// Decode the wire form as fetched from the control plane.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or any rule fails to decode.
    pub fn from_wire(wire: &RuleGroupWire, scope: Scope) -> DecodeResult<Self> {
        let path = NodePath::root(&wire.name);
        if wire.name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "RuleGroup",
                path,
            });
        }
        Ok(Self {
            name: wire.name.clone(),
            scope,
            capacity: wire.capacity,
            description: wire.description.clone(),
            rules: decode_rules(wire.rules.as_deref().unwrap_or_default(), &path)?,
            visibility_config: VisibilityConfig::from_wire(&wire.visibility_config),
        })
    }
}

impl Validate for RuleGroup {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.name"),
                "rule group name cannot be empty",
            ));
        }
        if self.capacity == 0 {
            result.add_error(ValidationError::error(
                format!("{path}.capacity"),
                "rule group capacity must be positive",
            ));
        }
        self.visibility_config
            .validate(&format!("{path}.visibility_config"), result);
        validate_rules(&self.rules, path, result);
    }
}

fn decode_rules(wires: &[RuleWire], path: &NodePath) -> DecodeResult<Vec<Rule>> {
    let mut rules = Vec::with_capacity(wires.len());
    for (idx, wire) in wires.iter().enumerate() {
        rules.push(Rule::from_wire(wire, &path.index("Rules", idx))?);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleAction;
    use crate::statement::{
        ByteMatchStatement, FieldToMatch, GeoMatchStatement, PositionalConstraint, Statement,
        TextTransformation, TransformationKind,
    };

    fn byte_match(search: &str) -> Statement {
        Statement::ByteMatch(ByteMatchStatement {
            field_to_match: FieldToMatch::UriPath,
            positional_constraint: PositionalConstraint::StartsWith,
            search_string: search.to_string(),
            text_transformations: vec![TextTransformation::new(0, TransformationKind::None)],
        })
    }

    fn rule(name: &str, priority: u32, statement: Statement) -> Rule {
        Rule {
            name: name.to_string(),
            priority,
            statement,
            action: Some(RuleAction::Block),
            override_action: None,
            rule_labels: Vec::new(),
            visibility_config: VisibilityConfig::disabled(name),
        }
    }

    fn acl() -> WebAcl {
        WebAcl {
            name: "edge-acl".to_string(),
            scope: Scope::Cloudfront,
            default_action: DefaultAction::Allow,
            description: None,
            rules: vec![
                rule(
                    "block-admin-from-abroad",
                    0,
                    Statement::or(vec![
                        byte_match("/admin"),
                        Statement::GeoMatch(GeoMatchStatement {
                            country_codes: vec!["CN".to_string(), "RU".to_string()],
                            forwarded_ip_config: None,
                        }),
                    ]),
                ),
                rule("block-internal", 1, byte_match("/internal")),
            ],
            visibility_config: VisibilityConfig::disabled("edge-acl"),
        }
    }

    #[test]
    fn test_web_acl_round_trip() {
        let acl = acl();
        let wire = acl.to_wire();
        let decoded = WebAcl::from_wire(&wire, Scope::Cloudfront).unwrap();
        assert_eq!(decoded, acl);
    }

    #[test]
    fn test_web_acl_wire_shape() {
        let json = serde_json::to_value(acl().to_wire()).unwrap();
        assert_eq!(json["DefaultAction"], serde_json::json!({"Allow": {}}));
        let or = &json["Rules"][0]["Statement"]["OrStatement"]["Statements"];
        assert_eq!(or.as_array().unwrap().len(), 2);
        // Absent optionals are omitted, never serialized as null.
        assert!(json.as_object().unwrap().get("Description").is_none());
    }

    #[test]
    fn test_web_acl_validates_rules_collectively() {
        let mut acl = acl();
        acl.rules[1].priority = 5;
        acl.rules[1].name = "block-admin-from-abroad".to_string();
        let result = acl.check("acl");
        let errors = result.errors_only();
        assert!(errors.iter().any(|e| e.message.contains("priorities")));
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_empty_acl_name_rejected_on_decode() {
        let mut wire = acl().to_wire();
        wire.name.clear();
        let err = WebAcl::from_wire(&wire, Scope::Regional).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyName { kind: "WebACL", .. }));
    }

    #[test]
    fn test_bad_rule_decode_names_owning_rule() {
        let mut wire = acl().to_wire();
        wire.rules.as_mut().unwrap()[1].statement = Default::default();
        let err = WebAcl::from_wire(&wire, Scope::Cloudfront).unwrap_err();
        assert!(err.to_string().contains("Rules[1].Statement"));
    }

    #[test]
    fn test_rule_group_round_trip_and_capacity_check() {
        let group = RuleGroup {
            name: "shared-baseline".to_string(),
            scope: Scope::Regional,
            capacity: 100,
            description: Some("shared rules".to_string()),
            rules: vec![rule("block-admin", 0, byte_match("/admin"))],
            visibility_config: VisibilityConfig::disabled("shared-baseline"),
        };
        let decoded = RuleGroup::from_wire(&group.to_wire(), Scope::Regional).unwrap();
        assert_eq!(decoded, group);

        let mut zero = group;
        zero.capacity = 0;
        assert!(!zero.check("group").is_valid());
    }

    #[test]
    fn test_scope_serializes_screaming() {
        assert_eq!(
            serde_json::to_value(Scope::Cloudfront).unwrap(),
            serde_json::json!("CLOUDFRONT")
        );
        assert_eq!(Scope::Regional.to_string(), "REGIONAL");
    }
}
