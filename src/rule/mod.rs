//! Rules: a named, prioritized statement with an action.
//!
//! A [`Rule`] binds a match-condition tree to the action taken when it
//! matches. Rules live inside a web ACL or rule group and carry a
//! priority that orders evaluation; priorities within one container
//! must be exactly `0..n-1` (in any order).

use serde::{Deserialize, Serialize};

use crate::statement::{
    DecodeError, DecodeResult, EmptyMarker, NodePath, Statement, StatementWire,
};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// What happens when a rule's statement matches the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Let the request through.
    Allow,
    /// Reject the request.
    Block,
    /// Count the match and continue evaluation.
    Count,
}

/// Wire form of [`RuleAction`]: one empty-object alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct RuleActionWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<EmptyMarker>,
}

impl RuleAction {
    /// Build the wire form, populating exactly one alternative.
    #[must_use]
    pub fn to_wire(&self) -> RuleActionWire {
        let mut wire = RuleActionWire::default();
        match self {
            Self::Allow => wire.allow = Some(EmptyMarker {}),
            Self::Block => wire.block = Some(EmptyMarker {}),
            Self::Count => wire.count = Some(EmptyMarker {}),
        }
        wire
    }

    /// Decode the wire form.
    ///
    /// # Errors
    ///
    /// Fails when no alternative is populated.
    pub fn from_wire(wire: &RuleActionWire, path: &NodePath) -> DecodeResult<Self> {
        let populated = [wire.allow.is_some(), wire.block.is_some(), wire.count.is_some()]
            .iter()
            .filter(|p| **p)
            .count();
        if populated > 1 {
            tracing::warn!(path = %path, populated, "rule action populated more than one alternative");
        }
        if wire.allow.is_some() {
            Ok(Self::Allow)
        } else if wire.block.is_some() {
            Ok(Self::Block)
        } else if wire.count.is_some() {
            Ok(Self::Count)
        } else {
            Err(DecodeError::NoAlternative { path: path.clone() })
        }
    }
}

/// How a rule handles the actions produced inside a referenced rule
/// group. Required instead of [`RuleAction`] for rule-group rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Override every group action to count-only.
    Count,
    /// Keep the group's own actions.
    None,
}

/// Wire form of [`OverrideAction`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct OverrideActionWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub none: Option<EmptyMarker>,
}

impl OverrideAction {
    #[must_use]
    pub fn to_wire(&self) -> OverrideActionWire {
        let mut wire = OverrideActionWire::default();
        match self {
            Self::Count => wire.count = Some(EmptyMarker {}),
            Self::None => wire.none = Some(EmptyMarker {}),
        }
        wire
    }

    /// Decode the wire form.
    ///
    /// # Errors
    ///
    /// Fails when no alternative is populated.
    pub fn from_wire(wire: &OverrideActionWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.count.is_some() && wire.none.is_some() {
            tracing::warn!(path = %path, "override action populated both alternatives");
        }
        if wire.count.is_some() {
            Ok(Self::Count)
        } else if wire.none.is_some() {
            Ok(Self::None)
        } else {
            Err(DecodeError::NoAlternative { path: path.clone() })
        }
    }
}

/// A label applied to the request when the rule matches, visible to
/// label-match statements in later rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Label {
    pub name: String,
}

/// Wire form of [`Label`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct LabelWire {
    pub name: String,
}

/// Metrics and request-sampling settings for a rule or container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisibilityConfig {
    pub sampled_requests_enabled: bool,
    pub cloud_watch_metrics_enabled: bool,
    pub metric_name: String,
}

/// Wire form of [`VisibilityConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct VisibilityConfigWire {
    pub sampled_requests_enabled: bool,
    pub cloud_watch_metrics_enabled: bool,
    pub metric_name: String,
}

impl VisibilityConfig {
    /// Metrics off, sampling off, for the given metric name.
    #[must_use]
    pub fn disabled(metric_name: impl Into<String>) -> Self {
        Self {
            sampled_requests_enabled: false,
            cloud_watch_metrics_enabled: false,
            metric_name: metric_name.into(),
        }
    }

    pub(crate) fn to_wire(&self) -> VisibilityConfigWire {
        VisibilityConfigWire {
            sampled_requests_enabled: self.sampled_requests_enabled,
            cloud_watch_metrics_enabled: self.cloud_watch_metrics_enabled,
            metric_name: self.metric_name.clone(),
        }
    }

    pub(crate) fn from_wire(wire: &VisibilityConfigWire) -> Self {
        Self {
            sampled_requests_enabled: wire.sampled_requests_enabled,
            cloud_watch_metrics_enabled: wire.cloud_watch_metrics_enabled,
            metric_name: wire.metric_name.clone(),
        }
    }
}

impl Validate for VisibilityConfig {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.metric_name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.metric_name"),
                "metric name cannot be empty",
            ));
        }
    }
}

/// One rule inside a web ACL or rule group.
///
/// Regular rules carry an `action`; rules whose statement references a
/// rule group carry an `override_action` instead. Exactly one of the
/// two must be set, and which one is dictated by the statement kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Rule {
    /// Name, unique within the owning container.
    pub name: String,
    /// Evaluation order; must be dense `0..n-1` within the container.
    pub priority: u32,
    /// The match condition.
    pub statement: Statement,
    /// Action for regular rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    /// Override for rule-group-reference rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_action: Option<OverrideAction>,
    /// Labels applied on match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_labels: Vec<Label>,
    pub visibility_config: VisibilityConfig,
}

/// Wire form of [`Rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RuleWire {
    pub name: String,
    pub priority: u32,
    pub statement: StatementWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleActionWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_action: Option<OverrideActionWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_labels: Option<Vec<LabelWire>>,
    pub visibility_config: VisibilityConfigWire,
}

impl Rule {
    /// Build the wire form.
    #[must_use]
    pub fn to_wire(&self) -> RuleWire {
        RuleWire {
            name: self.name.clone(),
            priority: self.priority,
            statement: self.statement.to_wire(),
            action: self.action.as_ref().map(RuleAction::to_wire),
            override_action: self.override_action.as_ref().map(OverrideAction::to_wire),
            rule_labels: if self.rule_labels.is_empty() {
                None
            } else {
                Some(
                    self.rule_labels
                        .iter()
                        .map(|l| LabelWire {
                            name: l.name.clone(),
                        })
                        .collect(),
                )
            },
            visibility_config: self.visibility_config.to_wire(),
        }
    }

    /// Decode the wire form. The path names the owning rule so nested
    /// statement failures identify both the rule and the node.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or any nested node is malformed.
    pub fn from_wire(wire: &RuleWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "Rule",
                path: path.clone(),
            });
        }
        let action = match &wire.action {
            Some(a) => Some(RuleAction::from_wire(a, &path.child("Action"))?),
            None => None,
        };
        let override_action = match &wire.override_action {
            Some(a) => Some(OverrideAction::from_wire(a, &path.child("OverrideAction"))?),
            None => None,
        };
        Ok(Self {
            name: wire.name.clone(),
            priority: wire.priority,
            statement: Statement::from_wire(&wire.statement, &path.child("Statement"))?,
            action,
            override_action,
            rule_labels: wire
                .rule_labels
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|l| Label {
                    name: l.name.clone(),
                })
                .collect(),
            visibility_config: VisibilityConfig::from_wire(&wire.visibility_config),
        })
    }
}

impl Validate for Rule {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.name"),
                "rule name cannot be empty",
            ));
        }
        if self.statement.is_rule_group_reference() {
            if self.override_action.is_none() {
                result.add_error(ValidationError::error(
                    format!("{path}.override_action"),
                    "rules referencing a rule group require an override action",
                ));
            }
            if self.action.is_some() {
                result.add_error(ValidationError::error(
                    format!("{path}.action"),
                    "rules referencing a rule group cannot carry a plain action",
                ));
            }
        } else {
            if self.action.is_none() {
                result.add_error(ValidationError::error(
                    format!("{path}.action"),
                    "rule requires an action",
                ));
            }
            if self.override_action.is_some() {
                result.add_error(ValidationError::error(
                    format!("{path}.override_action"),
                    "override action is only valid on rule-group references",
                ));
            }
        }
        for (idx, label) in self.rule_labels.iter().enumerate() {
            if label.name.is_empty() {
                result.add_error(ValidationError::error(
                    format!("{path}.rule_labels[{idx}]"),
                    "label name cannot be empty",
                ));
            }
        }
        self.visibility_config
            .validate(&format!("{path}.visibility_config"), result);
        self.statement
            .validate(&format!("{path}.statement"), result);
    }
}

/// Collection-level checks shared by web ACLs and rule groups:
/// dense priorities and unique names, plus per-rule validation.
pub fn validate_rules(rules: &[Rule], path: &str, result: &mut ValidationResult) {
    let mut priorities: Vec<u32> = rules.iter().map(|r| r.priority).collect();
    priorities.sort_unstable();
    let dense = priorities
        .iter()
        .enumerate()
        .all(|(idx, p)| *p as usize == idx);
    if !dense {
        result.add_error(ValidationError::error(
            format!("{path}.rules"),
            format!(
                "rule priorities must be exactly 0..{} in some order, got {priorities:?}",
                rules.len().saturating_sub(1)
            ),
        ));
    }

    let mut seen: Vec<&str> = Vec::with_capacity(rules.len());
    for (idx, rule) in rules.iter().enumerate() {
        if seen.contains(&rule.name.as_str()) {
            result.add_error(ValidationError::error(
                format!("{path}.rules[{idx}].name"),
                format!("duplicate rule name '{}'", rule.name),
            ));
        } else {
            seen.push(rule.name.as_str());
        }
        rule.validate(&format!("{path}.rules[{idx}]"), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{
        ByteMatchStatement, FieldToMatch, NodePath, PositionalConstraint,
        RuleGroupReferenceStatement, TextTransformation, TransformationKind,
    };

    fn statement() -> Statement {
        Statement::ByteMatch(ByteMatchStatement {
            field_to_match: FieldToMatch::UriPath,
            positional_constraint: PositionalConstraint::StartsWith,
            search_string: "/admin".to_string(),
            text_transformations: vec![TextTransformation::new(0, TransformationKind::Lowercase)],
        })
    }

    fn rule(name: &str, priority: u32) -> Rule {
        Rule {
            name: name.to_string(),
            priority,
            statement: statement(),
            action: Some(RuleAction::Block),
            override_action: None,
            rule_labels: Vec::new(),
            visibility_config: VisibilityConfig::disabled(name),
        }
    }

    #[test]
    fn test_rule_action_wire_shape() {
        let json = serde_json::to_value(RuleAction::Block.to_wire()).unwrap();
        assert_eq!(json, serde_json::json!({"Block": {}}));
    }

    #[test]
    fn test_rule_action_empty_wire_fails() {
        let err = RuleAction::from_wire(&RuleActionWire::default(), &NodePath::root("r"));
        assert!(err.is_err());
    }

    #[test]
    fn test_override_action_round_trip() {
        for action in [OverrideAction::Count, OverrideAction::None] {
            let wire = action.to_wire();
            assert_eq!(
                OverrideAction::from_wire(&wire, &NodePath::root("r")).unwrap(),
                action
            );
        }
    }

    #[test]
    fn test_rule_round_trip() {
        let rule = rule("block-admin", 0);
        let wire = rule.to_wire();
        let decoded = Rule::from_wire(&wire, &NodePath::root("rules[0]")).unwrap();
        assert_eq!(decoded, rule);
    }

    #[test]
    fn test_rule_wire_omits_absent_fields() {
        let json = serde_json::to_value(rule("r0", 0).to_wire()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("OverrideAction"));
        assert!(!obj.contains_key("RuleLabels"));
        assert!(obj.contains_key("Action"));
    }

    #[test]
    fn test_empty_rule_name_is_decode_error() {
        let mut wire = rule("r0", 0).to_wire();
        wire.name.clear();
        let err = Rule::from_wire(&wire, &NodePath::root("rules[0]")).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyName { kind: "Rule", .. }));
    }

    #[test]
    fn test_regular_rule_requires_action() {
        let mut r = rule("r0", 0);
        r.action = None;
        let result = r.check("acl.rules[0]");
        assert!(!result.is_valid());
        assert!(result.errors()[0].field.ends_with(".action"));
    }

    #[test]
    fn test_rule_over_unnamed_header_fails_validation() {
        // The selector name is only checked structurally at wire decode;
        // declared config never crosses the wire, so validation has to
        // catch it before a remote push.
        let mut r = rule("header-check", 0);
        r.statement = Statement::ByteMatch(ByteMatchStatement {
            field_to_match: FieldToMatch::single_header(""),
            positional_constraint: PositionalConstraint::Exactly,
            search_string: "1".to_string(),
            text_transformations: vec![TextTransformation::new(0, TransformationKind::None)],
        });
        let result = r.check("acl.rules[0]");
        assert!(!result.is_valid());
        assert!(result.errors_only()[0]
            .field
            .contains("statement.byte_match.field_to_match"));
    }

    #[test]
    fn test_group_reference_rule_requires_override() {
        let mut r = rule("managed", 0);
        r.statement = Statement::RuleGroupReference(RuleGroupReferenceStatement {
            arn: "arn:aws:wafv2:::rulegroup/common".to_string(),
            excluded_rules: Vec::new(),
            rule_action_overrides: Vec::new(),
        });
        // Plain action on a group reference is rejected both ways.
        let result = r.check("acl.rules[0]");
        assert_eq!(result.errors_only().len(), 2);

        r.action = None;
        r.override_action = Some(OverrideAction::None);
        assert!(r.check("acl.rules[0]").is_valid());
    }

    #[test]
    fn test_dense_priorities_accept_any_order() {
        for priorities in [vec![0, 1, 2], vec![2, 0, 1]] {
            let rules: Vec<Rule> = priorities
                .iter()
                .enumerate()
                .map(|(idx, p)| rule(&format!("r{idx}"), *p))
                .collect();
            let mut result = ValidationResult::new();
            validate_rules(&rules, "acl", &mut result);
            assert!(result.is_valid(), "priorities {priorities:?} should pass");
        }
    }

    #[test]
    fn test_sparse_or_duplicate_priorities_rejected() {
        for priorities in [vec![0, 1, 3], vec![0, 0, 1], vec![1, 2, 3]] {
            let rules: Vec<Rule> = priorities
                .iter()
                .enumerate()
                .map(|(idx, p)| rule(&format!("r{idx}"), *p))
                .collect();
            let mut result = ValidationResult::new();
            validate_rules(&rules, "acl", &mut result);
            assert!(!result.is_valid(), "priorities {priorities:?} should fail");
        }
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let rules = vec![rule("same", 0), rule("same", 1)];
        let mut result = ValidationResult::new();
        validate_rules(&rules, "acl", &mut result);
        assert!(result
            .errors()
            .iter()
            .any(|e| e.message.contains("duplicate rule name")));
    }
}
