//! The recursive rule-statement model.
//!
//! A [`Statement`] is one node in a boolean match-condition tree
//! evaluated against an HTTP request: logical combinators over leaf
//! predicates, plus rate-based throttling and rule-group references.
//! The model is a tagged union — exactly one alternative, enforced by
//! representation. The wire schema is a flat object with one optional
//! field per alternative; presence-inference happens at decode time
//! only, never as a runtime branching strategy elsewhere.

mod error;
mod field;
mod group_ref;
mod leaves;
mod rate_based;
mod transform;

pub use error::{DecodeError, DecodeResult, NodePath};
pub use field::{
    BodyParsingFallback, CookieMatchPattern, CookieMatchPatternWire, CookiesWire, EmptyMarker,
    FieldToMatch, FieldToMatchWire, HeaderMatchPattern, HeaderMatchPatternWire, HeadersWire,
    Ja3FingerprintWire, JsonBodyWire, JsonMatchPattern, JsonMatchPatternWire, JsonMatchScope,
    MatchFallback, MatchScope, OversizeHandling, SingleHeaderWire, SingleQueryArgumentWire,
};
pub use group_ref::{
    ExcludedRule, ExcludedRuleWire, ManagedRuleGroupStatement, ManagedRuleGroupStatementWire,
    RuleActionOverride, RuleActionOverrideWire, RuleGroupReferenceStatement,
    RuleGroupReferenceStatementWire,
};
pub use leaves::{
    ByteMatchStatement, ByteMatchStatementWire, ComparisonOperator, ForwardedIpConfig,
    ForwardedIpConfigWire, ForwardedIpPosition, GeoMatchStatement, GeoMatchStatementWire,
    IpSetForwardedIpConfig, IpSetForwardedIpConfigWire, IpSetReferenceStatement,
    IpSetReferenceStatementWire, LabelMatchScope, LabelMatchStatement, LabelMatchStatementWire,
    PositionalConstraint, RegexMatchStatement, RegexMatchStatementWire,
    RegexPatternSetReferenceStatement, RegexPatternSetReferenceStatementWire,
    SizeConstraintStatement, SizeConstraintStatementWire, SqliMatchStatement,
    SqliMatchStatementWire, SqliSensitivity, XssMatchStatement, XssMatchStatementWire,
};
pub use rate_based::{
    AggregateKeyType, RateBasedCustomKey, RateBasedCustomKeyWire, RateBasedStatement,
    RateBasedStatementWire, RateLimitCookie, RateLimitCookieWire, RateLimitHeader,
    RateLimitHeaderWire, RateLimitLabelNamespace, RateLimitLabelNamespaceWire,
    RateLimitQueryArgument, RateLimitQueryArgumentWire, RateLimitQueryString,
    RateLimitQueryStringWire, RateLimitUriPath, RateLimitUriPathWire,
};
pub use transform::{
    ordered, TextTransformation, TextTransformationWire, TransformationKind,
    TransformationKindWire,
};

use serde::{Deserialize, Serialize};

use crate::validation::{Validate, ValidationError, ValidationResult};

/// One node in the match-condition tree. Exactly one alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// All children must match.
    And(Vec<Statement>),
    /// At least one child must match.
    Or(Vec<Statement>),
    /// The child must not match.
    Not(Box<Statement>),
    /// Byte sequence comparison.
    ByteMatch(ByteMatchStatement),
    /// Inline regex comparison.
    RegexMatch(RegexMatchStatement),
    /// Component size comparison.
    SizeConstraint(SizeConstraintStatement),
    /// SQL-injection detection.
    SqliMatch(SqliMatchStatement),
    /// Cross-site-scripting detection.
    XssMatch(XssMatchStatement),
    /// Origin-country match.
    GeoMatch(GeoMatchStatement),
    /// Reference to an external IP set.
    IpSetReference(IpSetReferenceStatement),
    /// Reference to an external regex pattern set.
    RegexPatternSetReference(RegexPatternSetReferenceStatement),
    /// Match on labels applied by earlier rules.
    LabelMatch(LabelMatchStatement),
    /// Rate-based throttling.
    RateBased(RateBasedStatement),
    /// Reference to a vendor-managed rule group.
    ManagedRuleGroup(ManagedRuleGroupStatement),
    /// Reference to a user-defined rule group.
    RuleGroupReference(RuleGroupReferenceStatement),
}

impl Statement {
    /// AND combinator over the given children.
    #[must_use]
    pub fn and(children: Vec<Statement>) -> Self {
        Self::And(children)
    }

    /// OR combinator over the given children.
    #[must_use]
    pub fn or(children: Vec<Statement>) -> Self {
        Self::Or(children)
    }

    /// Negation of the given child.
    #[must_use]
    pub fn not(child: Statement) -> Self {
        Self::Not(Box::new(child))
    }

    /// Whether this statement wraps a rule-group reference. Rules over
    /// these take an override action instead of a plain action.
    #[must_use]
    pub fn is_rule_group_reference(&self) -> bool {
        matches!(self, Self::ManagedRuleGroup(_) | Self::RuleGroupReference(_))
    }

    /// The statement's direct children, for recursive walks.
    #[must_use]
    pub fn children(&self) -> Vec<&Statement> {
        match self {
            Self::And(children) | Self::Or(children) => children.iter().collect(),
            Self::Not(child) => vec![child.as_ref()],
            Self::RateBased(rate) => rate
                .scope_down_statement
                .as_deref()
                .into_iter()
                .collect(),
            Self::ManagedRuleGroup(group) => group
                .scope_down_statement
                .as_deref()
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Build the flat wire form, populating exactly one alternative.
    #[must_use]
    pub fn to_wire(&self) -> StatementWire {
        let mut wire = StatementWire::default();
        match self {
            Self::And(children) => {
                wire.and_statement = Some(AndStatementWire {
                    statements: children.iter().map(Statement::to_wire).collect(),
                });
            }
            Self::Or(children) => {
                wire.or_statement = Some(OrStatementWire {
                    statements: children.iter().map(Statement::to_wire).collect(),
                });
            }
            Self::Not(child) => {
                wire.not_statement = Some(Box::new(NotStatementWire {
                    statement: Box::new(child.to_wire()),
                }));
            }
            Self::ByteMatch(s) => wire.byte_match_statement = Some(s.to_wire()),
            Self::RegexMatch(s) => wire.regex_match_statement = Some(s.to_wire()),
            Self::SizeConstraint(s) => wire.size_constraint_statement = Some(s.to_wire()),
            Self::SqliMatch(s) => wire.sqli_match_statement = Some(s.to_wire()),
            Self::XssMatch(s) => wire.xss_match_statement = Some(s.to_wire()),
            Self::GeoMatch(s) => wire.geo_match_statement = Some(s.to_wire()),
            Self::IpSetReference(s) => wire.ip_set_reference_statement = Some(s.to_wire()),
            Self::RegexPatternSetReference(s) => {
                wire.regex_pattern_set_reference_statement = Some(s.to_wire());
            }
            Self::LabelMatch(s) => wire.label_match_statement = Some(s.to_wire()),
            Self::RateBased(s) => wire.rate_based_statement = Some(Box::new(s.to_wire())),
            Self::ManagedRuleGroup(s) => {
                wire.managed_rule_group_statement = Some(Box::new(s.to_wire()));
            }
            Self::RuleGroupReference(s) => {
                wire.rule_group_reference_statement = Some(s.to_wire());
            }
        }
        wire
    }

    /// Decode the flat wire form into the tree, depth-first.
    ///
    /// When a payload populates more than one alternative the decode
    /// takes the first in a fixed priority order (combinators, then
    /// leaves in wire declaration order) and reports the anomaly at
    /// warning level. Zero populated alternatives is a
    /// [`DecodeError::NoAlternative`] identifying the failing path.
    ///
    /// # Errors
    ///
    /// Fails when the payload resolves to no alternative or a nested
    /// node is malformed; the error is fatal for the owning aggregate's
    /// refresh.
    pub fn from_wire(wire: &StatementWire, path: &NodePath) -> DecodeResult<Self> {
        let populated = wire.populated();
        if populated > 1 {
            tracing::warn!(
                path = %path,
                populated,
                "statement populated more than one alternative; taking the first in priority order"
            );
        }

        if let Some(and) = &wire.and_statement {
            let mut children = Vec::with_capacity(and.statements.len());
            for (idx, child) in and.statements.iter().enumerate() {
                children.push(Self::from_wire(
                    child,
                    &path.index("AndStatement.Statements", idx),
                )?);
            }
            return Ok(Self::And(children));
        }
        if let Some(or) = &wire.or_statement {
            let mut children = Vec::with_capacity(or.statements.len());
            for (idx, child) in or.statements.iter().enumerate() {
                children.push(Self::from_wire(
                    child,
                    &path.index("OrStatement.Statements", idx),
                )?);
            }
            return Ok(Self::Or(children));
        }
        if let Some(not) = &wire.not_statement {
            return Ok(Self::Not(Box::new(Self::from_wire(
                &not.statement,
                &path.child("NotStatement.Statement"),
            )?)));
        }
        if let Some(s) = &wire.byte_match_statement {
            return Ok(Self::ByteMatch(ByteMatchStatement::from_wire(
                s,
                &path.child("ByteMatchStatement"),
            )?));
        }
        if let Some(s) = &wire.regex_match_statement {
            return Ok(Self::RegexMatch(RegexMatchStatement::from_wire(
                s,
                &path.child("RegexMatchStatement"),
            )?));
        }
        if let Some(s) = &wire.size_constraint_statement {
            return Ok(Self::SizeConstraint(SizeConstraintStatement::from_wire(
                s,
                &path.child("SizeConstraintStatement"),
            )?));
        }
        if let Some(s) = &wire.sqli_match_statement {
            return Ok(Self::SqliMatch(SqliMatchStatement::from_wire(
                s,
                &path.child("SqliMatchStatement"),
            )?));
        }
        if let Some(s) = &wire.xss_match_statement {
            return Ok(Self::XssMatch(XssMatchStatement::from_wire(
                s,
                &path.child("XssMatchStatement"),
            )?));
        }
        if let Some(s) = &wire.geo_match_statement {
            return Ok(Self::GeoMatch(GeoMatchStatement::from_wire(s)));
        }
        if let Some(s) = &wire.ip_set_reference_statement {
            return Ok(Self::IpSetReference(IpSetReferenceStatement::from_wire(s)));
        }
        if let Some(s) = &wire.regex_pattern_set_reference_statement {
            return Ok(Self::RegexPatternSetReference(
                RegexPatternSetReferenceStatement::from_wire(
                    s,
                    &path.child("RegexPatternSetReferenceStatement"),
                )?,
            ));
        }
        if let Some(s) = &wire.label_match_statement {
            return Ok(Self::LabelMatch(LabelMatchStatement::from_wire(
                s,
                &path.child("LabelMatchStatement"),
            )?));
        }
        if let Some(s) = &wire.rate_based_statement {
            return Ok(Self::RateBased(RateBasedStatement::from_wire(
                s,
                &path.child("RateBasedStatement"),
            )?));
        }
        if let Some(s) = &wire.managed_rule_group_statement {
            return Ok(Self::ManagedRuleGroup(ManagedRuleGroupStatement::from_wire(
                s,
                &path.child("ManagedRuleGroupStatement"),
            )?));
        }
        if let Some(s) = &wire.rule_group_reference_statement {
            return Ok(Self::RuleGroupReference(
                RuleGroupReferenceStatement::from_wire(
                    s,
                    &path.child("RuleGroupReferenceStatement"),
                )?,
            ));
        }

        Err(DecodeError::NoAlternative { path: path.clone() })
    }
}

impl Validate for Statement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        match self {
            Self::And(children) | Self::Or(children) => {
                let kind = if matches!(self, Self::And(_)) { "and" } else { "or" };
                if children.len() < 2 {
                    // The remote API requires two children; not enforced
                    // locally, surfaced as a warning.
                    result.add_error(ValidationError::warning(
                        path,
                        format!(
                            "{kind} statement has {} child(ren); the remote API requires at least 2",
                            children.len()
                        ),
                    ));
                }
                for (idx, child) in children.iter().enumerate() {
                    child.validate(&format!("{path}.{kind}[{idx}]"), result);
                }
            }
            Self::Not(child) => child.validate(&format!("{path}.not"), result),
            Self::ByteMatch(s) => s.validate(&format!("{path}.byte_match"), result),
            Self::RegexMatch(s) => s.validate(&format!("{path}.regex_match"), result),
            Self::GeoMatch(s) => s.validate(&format!("{path}.geo_match"), result),
            Self::IpSetReference(s) => {
                if s.arn.is_empty() {
                    result.add_error(ValidationError::error(
                        format!("{path}.ip_set_reference.arn"),
                        "IP set ARN cannot be empty",
                    ));
                }
            }
            Self::RegexPatternSetReference(s) => {
                s.validate(&format!("{path}.regex_pattern_set_reference"), result);
            }
            Self::RateBased(s) => s.validate(&format!("{path}.rate_based"), result),
            Self::ManagedRuleGroup(s) => {
                s.validate(&format!("{path}.managed_rule_group"), result);
            }
            Self::RuleGroupReference(s) => {
                s.validate(&format!("{path}.rule_group_reference"), result);
            }
            Self::SizeConstraint(s) => s.validate(&format!("{path}.size_constraint"), result),
            Self::SqliMatch(s) => s.validate(&format!("{path}.sqli_match"), result),
            Self::XssMatch(s) => s.validate(&format!("{path}.xss_match"), result),
            Self::LabelMatch(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Flat wire form of a statement: one alternative populated, the other
/// fourteen absent. Unknown alternatives are rejected at
/// deserialization rather than silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct StatementWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and_statement: Option<AndStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or_statement: Option<OrStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_statement: Option<Box<NotStatementWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_match_statement: Option<ByteMatchStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_match_statement: Option<RegexMatchStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_constraint_statement: Option<SizeConstraintStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqli_match_statement: Option<SqliMatchStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xss_match_statement: Option<XssMatchStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_match_statement: Option<GeoMatchStatementWire>,
    #[serde(rename = "IPSetReferenceStatement", skip_serializing_if = "Option::is_none")]
    pub ip_set_reference_statement: Option<IpSetReferenceStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_pattern_set_reference_statement: Option<RegexPatternSetReferenceStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_match_statement: Option<LabelMatchStatementWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_based_statement: Option<Box<RateBasedStatementWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_rule_group_statement: Option<Box<ManagedRuleGroupStatementWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_group_reference_statement: Option<RuleGroupReferenceStatementWire>,
}

impl StatementWire {
    /// Count the populated alternatives.
    #[must_use]
    pub fn populated(&self) -> usize {
        [
            self.and_statement.is_some(),
            self.or_statement.is_some(),
            self.not_statement.is_some(),
            self.byte_match_statement.is_some(),
            self.regex_match_statement.is_some(),
            self.size_constraint_statement.is_some(),
            self.sqli_match_statement.is_some(),
            self.xss_match_statement.is_some(),
            self.geo_match_statement.is_some(),
            self.ip_set_reference_statement.is_some(),
            self.regex_pattern_set_reference_statement.is_some(),
            self.label_match_statement.is_some(),
            self.rate_based_statement.is_some(),
            self.managed_rule_group_statement.is_some(),
            self.rule_group_reference_statement.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

/// Wire payload for the AND combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct AndStatementWire {
    pub statements: Vec<StatementWire>,
}

/// Wire payload for the OR combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct OrStatementWire {
    pub statements: Vec<StatementWire>,
}

/// Wire payload for the NOT combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NotStatementWire {
    pub statement: Box<StatementWire>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> NodePath {
        NodePath::root("test")
    }

    fn byte_match(search: &str) -> Statement {
        Statement::ByteMatch(ByteMatchStatement {
            field_to_match: FieldToMatch::UriPath,
            positional_constraint: PositionalConstraint::Contains,
            search_string: search.to_string(),
            text_transformations: vec![TextTransformation::new(0, TransformationKind::None)],
        })
    }

    fn geo(codes: &[&str]) -> Statement {
        Statement::GeoMatch(GeoMatchStatement {
            country_codes: codes.iter().map(|c| c.to_string()).collect(),
            forwarded_ip_config: None,
        })
    }

    #[test]
    fn test_combinator_round_trip() {
        let stmt = Statement::and(vec![
            byte_match("/admin"),
            Statement::not(geo(&["US"])),
            Statement::or(vec![byte_match("a"), byte_match("b")]),
        ]);
        let wire = stmt.to_wire();
        assert_eq!(wire.populated(), 1);
        assert_eq!(Statement::from_wire(&wire, &path()).unwrap(), stmt);
    }

    #[test]
    fn test_wire_round_trip_is_lossless() {
        let stmt = Statement::or(vec![byte_match("/login"), geo(&["CN", "RU"])]);
        let wire = stmt.to_wire();
        let rewired = Statement::from_wire(&wire, &path()).unwrap().to_wire();
        assert_eq!(rewired, wire);
    }

    #[test]
    fn test_empty_wire_is_decode_error() {
        let err = Statement::from_wire(&StatementWire::default(), &path()).unwrap_err();
        assert!(matches!(err, DecodeError::NoAlternative { .. }));
    }

    #[test]
    fn test_multi_populated_takes_priority_order() {
        // Combinators win over leaves regardless of wire field order.
        let mut wire = byte_match("x").to_wire();
        wire.not_statement = Some(Box::new(NotStatementWire {
            statement: Box::new(geo(&["DE"]).to_wire()),
        }));
        assert_eq!(wire.populated(), 2);
        let decoded = Statement::from_wire(&wire, &path()).unwrap();
        assert!(matches!(decoded, Statement::Not(_)));
    }

    #[test]
    fn test_nested_decode_error_path() {
        let wire = StatementWire {
            and_statement: Some(AndStatementWire {
                // Second child populates nothing.
                statements: vec![byte_match("ok").to_wire(), StatementWire::default()],
            }),
            ..StatementWire::default()
        };
        let err = Statement::from_wire(&wire, &NodePath::root("rules[0].Statement")).unwrap_err();
        assert!(err
            .to_string()
            .contains("rules[0].Statement.AndStatement.Statements[1]"));
    }

    #[test]
    fn test_serialized_wire_has_single_key() {
        let json = serde_json::to_value(byte_match("x").to_wire()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("ByteMatchStatement"));
    }

    #[test]
    fn test_unknown_statement_alternative_rejected() {
        let result: Result<StatementWire, _> = serde_json::from_value(serde_json::json!({
            "AsnMatchStatement": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_child_combinator_warns_not_errors() {
        let stmt = Statement::and(vec![byte_match("x")]);
        let result = stmt.check("statement");
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn test_validation_recurses_into_children() {
        let stmt = Statement::or(vec![byte_match(""), geo(&[])]);
        let result = stmt.check("statement");
        assert!(!result.is_valid());
        assert_eq!(result.errors_only().len(), 2);
    }

    #[test]
    fn test_children_walk() {
        let stmt = Statement::and(vec![byte_match("a"), Statement::not(geo(&["FR"]))]);
        assert_eq!(stmt.children().len(), 2);
        assert_eq!(stmt.children()[1].children().len(), 1);
        assert!(byte_match("a").children().is_empty());
    }

    #[test]
    fn test_is_rule_group_reference() {
        let reference = Statement::RuleGroupReference(RuleGroupReferenceStatement {
            arn: "arn:aws:wafv2:::rulegroup/x".to_string(),
            excluded_rules: Vec::new(),
            rule_action_overrides: Vec::new(),
        });
        assert!(reference.is_rule_group_reference());
        assert!(!byte_match("x").is_rule_group_reference());
    }
}
