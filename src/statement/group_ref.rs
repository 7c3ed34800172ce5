//! References to externally defined rule collections.

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, DecodeResult, NodePath};
use super::{Statement, StatementWire};
use crate::rule::{RuleAction, RuleActionWire};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// A rule excluded from a referenced group (its matches are counted,
/// not acted on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExcludedRule {
    /// Name of the rule inside the referenced group.
    pub name: String,
}

/// Wire form of [`ExcludedRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ExcludedRuleWire {
    pub name: String,
}

/// Replaces the action of one rule inside a referenced group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleActionOverride {
    /// Name of the rule inside the referenced group.
    pub name: String,
    /// Action to use instead of the rule's own.
    pub action_to_use: RuleAction,
}

/// Wire form of [`RuleActionOverride`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RuleActionOverrideWire {
    pub name: String,
    pub action_to_use: RuleActionWire,
}

impl RuleActionOverride {
    fn to_wire(&self) -> RuleActionOverrideWire {
        RuleActionOverrideWire {
            name: self.name.clone(),
            action_to_use: self.action_to_use.to_wire(),
        }
    }

    fn from_wire(wire: &RuleActionOverrideWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "RuleActionOverride",
                path: path.clone(),
            });
        }
        Ok(Self {
            name: wire.name.clone(),
            action_to_use: RuleAction::from_wire(&wire.action_to_use, path)?,
        })
    }
}

/// References a vendor-managed rule group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManagedRuleGroupStatement {
    /// Vendor publishing the group.
    pub vendor_name: String,
    /// Group name within the vendor's catalog.
    pub name: String,
    /// Pinned group version; the vendor's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Rules whose matches are only counted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_rules: Vec<ExcludedRule>,
    /// Per-rule action replacements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_action_overrides: Vec<RuleActionOverride>,
    /// Restricts which requests the group evaluates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_down_statement: Option<Box<Statement>>,
}

/// Wire form of [`ManagedRuleGroupStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ManagedRuleGroupStatementWire {
    pub vendor_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_rules: Option<Vec<ExcludedRuleWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_action_overrides: Option<Vec<RuleActionOverrideWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_down_statement: Option<Box<StatementWire>>,
}

impl ManagedRuleGroupStatement {
    pub(crate) fn to_wire(&self) -> ManagedRuleGroupStatementWire {
        ManagedRuleGroupStatementWire {
            vendor_name: self.vendor_name.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            excluded_rules: if self.excluded_rules.is_empty() {
                None
            } else {
                Some(
                    self.excluded_rules
                        .iter()
                        .map(|r| ExcludedRuleWire {
                            name: r.name.clone(),
                        })
                        .collect(),
                )
            },
            rule_action_overrides: if self.rule_action_overrides.is_empty() {
                None
            } else {
                Some(
                    self.rule_action_overrides
                        .iter()
                        .map(RuleActionOverride::to_wire)
                        .collect(),
                )
            },
            scope_down_statement: self
                .scope_down_statement
                .as_ref()
                .map(|s| Box::new(s.to_wire())),
        }
    }

    pub(crate) fn from_wire(
        wire: &ManagedRuleGroupStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        if wire.vendor_name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "ManagedRuleGroupStatement.VendorName",
                path: path.clone(),
            });
        }
        if wire.name.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "ManagedRuleGroupStatement.Name",
                path: path.clone(),
            });
        }
        let scope_down_statement = match &wire.scope_down_statement {
            Some(inner) => Some(Box::new(Statement::from_wire(
                inner,
                &path.child("ScopeDownStatement"),
            )?)),
            None => None,
        };
        let mut rule_action_overrides = Vec::new();
        for (idx, o) in wire.rule_action_overrides.as_deref().unwrap_or_default().iter().enumerate()
        {
            rule_action_overrides.push(RuleActionOverride::from_wire(
                o,
                &path.index("RuleActionOverrides", idx),
            )?);
        }
        Ok(Self {
            vendor_name: wire.vendor_name.clone(),
            name: wire.name.clone(),
            version: wire.version.clone(),
            excluded_rules: wire
                .excluded_rules
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|r| ExcludedRule {
                    name: r.name.clone(),
                })
                .collect(),
            rule_action_overrides,
            scope_down_statement,
        })
    }
}

impl Validate for ManagedRuleGroupStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.vendor_name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.vendor_name"),
                "vendor name cannot be empty",
            ));
        }
        if self.name.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.name"),
                "managed rule group name cannot be empty",
            ));
        }
        if let Some(scope_down) = &self.scope_down_statement {
            scope_down.validate(&format!("{path}.scope_down_statement"), result);
        }
    }
}

/// References a user-defined rule group by ARN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleGroupReferenceStatement {
    /// ARN of the rule group.
    pub arn: String,
    /// Rules whose matches are only counted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_rules: Vec<ExcludedRule>,
    /// Per-rule action replacements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_action_overrides: Vec<RuleActionOverride>,
}

/// Wire form of [`RuleGroupReferenceStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RuleGroupReferenceStatementWire {
    #[serde(rename = "ARN")]
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_rules: Option<Vec<ExcludedRuleWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_action_overrides: Option<Vec<RuleActionOverrideWire>>,
}

impl RuleGroupReferenceStatement {
    pub(crate) fn to_wire(&self) -> RuleGroupReferenceStatementWire {
        RuleGroupReferenceStatementWire {
            arn: self.arn.clone(),
            excluded_rules: if self.excluded_rules.is_empty() {
                None
            } else {
                Some(
                    self.excluded_rules
                        .iter()
                        .map(|r| ExcludedRuleWire {
                            name: r.name.clone(),
                        })
                        .collect(),
                )
            },
            rule_action_overrides: if self.rule_action_overrides.is_empty() {
                None
            } else {
                Some(
                    self.rule_action_overrides
                        .iter()
                        .map(RuleActionOverride::to_wire)
                        .collect(),
                )
            },
        }
    }

    pub(crate) fn from_wire(
        wire: &RuleGroupReferenceStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        if wire.arn.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "RuleGroupReferenceStatement.ARN",
                path: path.clone(),
            });
        }
        let mut rule_action_overrides = Vec::new();
        for (idx, o) in wire.rule_action_overrides.as_deref().unwrap_or_default().iter().enumerate()
        {
            rule_action_overrides.push(RuleActionOverride::from_wire(
                o,
                &path.index("RuleActionOverrides", idx),
            )?);
        }
        Ok(Self {
            arn: wire.arn.clone(),
            excluded_rules: wire
                .excluded_rules
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|r| ExcludedRule {
                    name: r.name.clone(),
                })
                .collect(),
            rule_action_overrides,
        })
    }
}

impl Validate for RuleGroupReferenceStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.arn.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.arn"),
                "rule group ARN cannot be empty",
            ));
        }
    }
}
