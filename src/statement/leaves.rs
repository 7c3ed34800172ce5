//! Leaf predicate statements.
//!
//! Each leaf pairs a [`FieldToMatch`] (where applicable) with its
//! comparison parameters. Leaves have no natural business key; the
//! reconciliation engine identifies them by content hash.

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, DecodeResult, NodePath};
use super::field::{FieldToMatch, FieldToMatchWire, MatchFallback};
use super::transform::{
    from_wire_list, to_wire_list, TextTransformation, TextTransformationWire,
};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// Checks shared by every leaf that inspects a request component: the
/// field selector must be well-formed and the remote API requires at
/// least one text transformation.
fn validate_predicate(
    field: &FieldToMatch,
    transforms: &[TextTransformation],
    path: &str,
    result: &mut ValidationResult,
) {
    field.validate(&format!("{path}.field_to_match"), result);
    if transforms.is_empty() {
        result.add_error(ValidationError::error(
            format!("{path}.text_transformations"),
            "at least one text transformation is required (use `none`)",
        ));
    }
}

/// Where the search string must sit inside the inspected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionalConstraint {
    Exactly,
    StartsWith,
    EndsWith,
    Contains,
    ContainsWord,
}

/// Numeric comparison operator for size constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
}

/// Sensitivity of the SQL-injection detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqliSensitivity {
    Low,
    High,
}

/// Scope of a label match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelMatchScope {
    Label,
    Namespace,
}

/// Where in the forwarded-IP header chain to take the address from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardedIpPosition {
    First,
    Last,
    Any,
}

/// Use a forwarded address from a header instead of the source IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForwardedIpConfig {
    /// Header carrying the original client address.
    pub header_name: String,
    /// What to do when the header is missing or malformed.
    pub fallback_behavior: MatchFallback,
}

/// Wire form of [`ForwardedIpConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ForwardedIpConfigWire {
    pub header_name: String,
    pub fallback_behavior: MatchFallback,
}

impl ForwardedIpConfig {
    fn to_wire(&self) -> ForwardedIpConfigWire {
        ForwardedIpConfigWire {
            header_name: self.header_name.clone(),
            fallback_behavior: self.fallback_behavior,
        }
    }

    fn from_wire(wire: &ForwardedIpConfigWire) -> Self {
        Self {
            header_name: wire.header_name.clone(),
            fallback_behavior: wire.fallback_behavior,
        }
    }
}

/// Forwarded-IP configuration for IP-set references, which additionally
/// selects a position within the header chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IpSetForwardedIpConfig {
    /// Header carrying the original client address.
    pub header_name: String,
    /// What to do when the header is missing or malformed.
    pub fallback_behavior: MatchFallback,
    /// Which address to take from a multi-address header.
    pub position: ForwardedIpPosition,
}

/// Wire form of [`IpSetForwardedIpConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct IpSetForwardedIpConfigWire {
    pub header_name: String,
    pub fallback_behavior: MatchFallback,
    pub position: ForwardedIpPosition,
}

impl IpSetForwardedIpConfig {
    fn to_wire(&self) -> IpSetForwardedIpConfigWire {
        IpSetForwardedIpConfigWire {
            header_name: self.header_name.clone(),
            fallback_behavior: self.fallback_behavior,
            position: self.position,
        }
    }

    fn from_wire(wire: &IpSetForwardedIpConfigWire) -> Self {
        Self {
            header_name: wire.header_name.clone(),
            fallback_behavior: wire.fallback_behavior,
            position: wire.position,
        }
    }
}

// ---------------------------------------------------------------------------
// ByteMatch
// ---------------------------------------------------------------------------

/// Matches a byte sequence against part of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ByteMatchStatement {
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Where the search string must appear.
    pub positional_constraint: PositionalConstraint,
    /// The bytes to search for.
    pub search_string: String,
    /// Normalizations applied before comparison.
    pub text_transformations: Vec<TextTransformation>,
}

/// Wire form of [`ByteMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ByteMatchStatementWire {
    pub field_to_match: FieldToMatchWire,
    pub positional_constraint: PositionalConstraint,
    pub search_string: String,
    pub text_transformations: Vec<TextTransformationWire>,
}

impl ByteMatchStatement {
    pub(crate) fn to_wire(&self) -> ByteMatchStatementWire {
        ByteMatchStatementWire {
            field_to_match: self.field_to_match.to_wire(),
            positional_constraint: self.positional_constraint,
            search_string: self.search_string.clone(),
            text_transformations: to_wire_list(&self.text_transformations),
        }
    }

    pub(crate) fn from_wire(
        wire: &ByteMatchStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            positional_constraint: wire.positional_constraint,
            search_string: wire.search_string.clone(),
            text_transformations: from_wire_list(&wire.text_transformations),
        })
    }
}

impl Validate for ByteMatchStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.search_string.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.search_string"),
                "search string cannot be empty",
            ));
        }
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

// ---------------------------------------------------------------------------
// RegexMatch
// ---------------------------------------------------------------------------

/// Matches an inline regular expression against part of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegexMatchStatement {
    /// The pattern, in the remote engine's regex dialect.
    pub regex_string: String,
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Normalizations applied before comparison.
    pub text_transformations: Vec<TextTransformation>,
}

/// Wire form of [`RegexMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RegexMatchStatementWire {
    pub regex_string: String,
    pub field_to_match: FieldToMatchWire,
    pub text_transformations: Vec<TextTransformationWire>,
}

impl RegexMatchStatement {
    pub(crate) fn to_wire(&self) -> RegexMatchStatementWire {
        RegexMatchStatementWire {
            regex_string: self.regex_string.clone(),
            field_to_match: self.field_to_match.to_wire(),
            text_transformations: to_wire_list(&self.text_transformations),
        }
    }

    pub(crate) fn from_wire(
        wire: &RegexMatchStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            regex_string: wire.regex_string.clone(),
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            text_transformations: from_wire_list(&wire.text_transformations),
        })
    }
}

impl Validate for RegexMatchStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.regex_string.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.regex_string"),
                "regex cannot be empty",
            ));
        }
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

// ---------------------------------------------------------------------------
// SizeConstraint
// ---------------------------------------------------------------------------

/// Compares the size of a request component against a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SizeConstraintStatement {
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Comparison operator.
    pub comparison_operator: ComparisonOperator,
    /// Size threshold in bytes.
    pub size: u64,
    /// Normalizations applied before measuring.
    pub text_transformations: Vec<TextTransformation>,
}

/// Wire form of [`SizeConstraintStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SizeConstraintStatementWire {
    pub field_to_match: FieldToMatchWire,
    pub comparison_operator: ComparisonOperator,
    pub size: u64,
    pub text_transformations: Vec<TextTransformationWire>,
}

impl SizeConstraintStatement {
    pub(crate) fn to_wire(&self) -> SizeConstraintStatementWire {
        SizeConstraintStatementWire {
            field_to_match: self.field_to_match.to_wire(),
            comparison_operator: self.comparison_operator,
            size: self.size,
            text_transformations: to_wire_list(&self.text_transformations),
        }
    }

    pub(crate) fn from_wire(
        wire: &SizeConstraintStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            comparison_operator: wire.comparison_operator,
            size: wire.size,
            text_transformations: from_wire_list(&wire.text_transformations),
        })
    }
}

impl Validate for SizeConstraintStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

// ---------------------------------------------------------------------------
// SqliMatch / XssMatch
// ---------------------------------------------------------------------------

/// Detects SQL-injection attempts in part of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqliMatchStatement {
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Normalizations applied before detection.
    pub text_transformations: Vec<TextTransformation>,
    /// Detector sensitivity; the remote default is low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_level: Option<SqliSensitivity>,
}

/// Wire form of [`SqliMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SqliMatchStatementWire {
    pub field_to_match: FieldToMatchWire,
    pub text_transformations: Vec<TextTransformationWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_level: Option<SqliSensitivity>,
}

impl SqliMatchStatement {
    pub(crate) fn to_wire(&self) -> SqliMatchStatementWire {
        SqliMatchStatementWire {
            field_to_match: self.field_to_match.to_wire(),
            text_transformations: to_wire_list(&self.text_transformations),
            sensitivity_level: self.sensitivity_level,
        }
    }

    pub(crate) fn from_wire(
        wire: &SqliMatchStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            text_transformations: from_wire_list(&wire.text_transformations),
            sensitivity_level: wire.sensitivity_level,
        })
    }
}

impl Validate for SqliMatchStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

/// Detects cross-site-scripting attempts in part of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct XssMatchStatement {
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Normalizations applied before detection.
    pub text_transformations: Vec<TextTransformation>,
}

/// Wire form of [`XssMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct XssMatchStatementWire {
    pub field_to_match: FieldToMatchWire,
    pub text_transformations: Vec<TextTransformationWire>,
}

impl XssMatchStatement {
    pub(crate) fn to_wire(&self) -> XssMatchStatementWire {
        XssMatchStatementWire {
            field_to_match: self.field_to_match.to_wire(),
            text_transformations: to_wire_list(&self.text_transformations),
        }
    }

    pub(crate) fn from_wire(
        wire: &XssMatchStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            text_transformations: from_wire_list(&wire.text_transformations),
        })
    }
}

impl Validate for XssMatchStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

// ---------------------------------------------------------------------------
// GeoMatch
// ---------------------------------------------------------------------------

/// Matches requests by origin country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeoMatchStatement {
    /// Two-letter country codes to match.
    pub country_codes: Vec<String>,
    /// Take the address from a forwarded header instead of the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_ip_config: Option<ForwardedIpConfig>,
}

/// Wire form of [`GeoMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GeoMatchStatementWire {
    pub country_codes: Vec<String>,
    #[serde(rename = "ForwardedIPConfig", default, skip_serializing_if = "Option::is_none")]
    pub forwarded_ip_config: Option<ForwardedIpConfigWire>,
}

impl GeoMatchStatement {
    pub(crate) fn to_wire(&self) -> GeoMatchStatementWire {
        GeoMatchStatementWire {
            country_codes: self.country_codes.clone(),
            forwarded_ip_config: self.forwarded_ip_config.as_ref().map(ForwardedIpConfig::to_wire),
        }
    }

    pub(crate) fn from_wire(wire: &GeoMatchStatementWire) -> Self {
        Self {
            country_codes: wire.country_codes.clone(),
            forwarded_ip_config: wire
                .forwarded_ip_config
                .as_ref()
                .map(ForwardedIpConfig::from_wire),
        }
    }
}

impl Validate for GeoMatchStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.country_codes.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.country_codes"),
                "at least one country code is required",
            ));
        }
        for (idx, code) in self.country_codes.iter().enumerate() {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                result.add_error(ValidationError::error(
                    format!("{path}.country_codes[{idx}]"),
                    format!("'{code}' is not a two-letter upper-case country code"),
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Set references
// ---------------------------------------------------------------------------

/// References an externally managed IP set by ARN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IpSetReferenceStatement {
    /// ARN of the IP set.
    pub arn: String,
    /// Take the address from a forwarded header instead of the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_ip_config: Option<IpSetForwardedIpConfig>,
}

/// Wire form of [`IpSetReferenceStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct IpSetReferenceStatementWire {
    #[serde(rename = "ARN")]
    pub arn: String,
    #[serde(
        rename = "IPSetForwardedIPConfig",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub forwarded_ip_config: Option<IpSetForwardedIpConfigWire>,
}

impl IpSetReferenceStatement {
    pub(crate) fn to_wire(&self) -> IpSetReferenceStatementWire {
        IpSetReferenceStatementWire {
            arn: self.arn.clone(),
            forwarded_ip_config: self
                .forwarded_ip_config
                .as_ref()
                .map(IpSetForwardedIpConfig::to_wire),
        }
    }

    pub(crate) fn from_wire(wire: &IpSetReferenceStatementWire) -> Self {
        Self {
            arn: wire.arn.clone(),
            forwarded_ip_config: wire
                .forwarded_ip_config
                .as_ref()
                .map(IpSetForwardedIpConfig::from_wire),
        }
    }
}

/// References an externally managed regex pattern set by ARN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegexPatternSetReferenceStatement {
    /// ARN of the pattern set.
    pub arn: String,
    /// Which part of the request to inspect.
    pub field_to_match: FieldToMatch,
    /// Normalizations applied before comparison.
    pub text_transformations: Vec<TextTransformation>,
}

/// Wire form of [`RegexPatternSetReferenceStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RegexPatternSetReferenceStatementWire {
    #[serde(rename = "ARN")]
    pub arn: String,
    pub field_to_match: FieldToMatchWire,
    pub text_transformations: Vec<TextTransformationWire>,
}

impl RegexPatternSetReferenceStatement {
    pub(crate) fn to_wire(&self) -> RegexPatternSetReferenceStatementWire {
        RegexPatternSetReferenceStatementWire {
            arn: self.arn.clone(),
            field_to_match: self.field_to_match.to_wire(),
            text_transformations: to_wire_list(&self.text_transformations),
        }
    }

    pub(crate) fn from_wire(
        wire: &RegexPatternSetReferenceStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        Ok(Self {
            arn: wire.arn.clone(),
            field_to_match: FieldToMatch::from_wire(
                &wire.field_to_match,
                &path.child("FieldToMatch"),
            )?,
            text_transformations: from_wire_list(&wire.text_transformations),
        })
    }
}

impl Validate for RegexPatternSetReferenceStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.arn.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.arn"),
                "pattern set ARN cannot be empty",
            ));
        }
        validate_predicate(&self.field_to_match, &self.text_transformations, path, result);
    }
}

// ---------------------------------------------------------------------------
// LabelMatch
// ---------------------------------------------------------------------------

/// Matches labels applied to the request by earlier rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LabelMatchStatement {
    /// Match a full label or a namespace prefix.
    pub scope: LabelMatchScope,
    /// The label or namespace to match.
    pub key: String,
}

/// Wire form of [`LabelMatchStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct LabelMatchStatementWire {
    pub scope: LabelMatchScope,
    pub key: String,
}

impl LabelMatchStatement {
    pub(crate) fn to_wire(&self) -> LabelMatchStatementWire {
        LabelMatchStatementWire {
            scope: self.scope,
            key: self.key.clone(),
        }
    }

    pub(crate) fn from_wire(
        wire: &LabelMatchStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        if wire.key.is_empty() {
            return Err(DecodeError::EmptyName {
                kind: "LabelMatchStatement",
                path: path.clone(),
            });
        }
        Ok(Self {
            scope: wire.scope,
            key: wire.key.clone(),
        })
    }
}
