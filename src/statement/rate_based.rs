//! Rate-based throttling statements.
//!
//! A rate-based statement is a leaf with a numeric limit, an
//! aggregation key, and an optional scope-down condition that is itself
//! a full [`Statement`] — the one place recursion re-enters the whole
//! subsystem from a leaf rather than a combinator.

use serde::{Deserialize, Serialize};

use super::error::{DecodeResult, NodePath};
use super::field::EmptyMarker;
use super::leaves::{ForwardedIpConfig, ForwardedIpConfigWire};
use super::transform::{
    from_wire_list, to_wire_list, TextTransformation, TextTransformationWire,
};
use super::{Statement, StatementWire};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// How requests are aggregated when counting toward the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateKeyType {
    /// Aggregate by source IP.
    Ip,
    /// Aggregate by the forwarded client IP.
    ForwardedIp,
    /// Aggregate by a composite of custom keys.
    CustomKeys,
    /// Count all matching requests together.
    Constant,
}

/// Throttles requests that exceed a count threshold over the remote
/// service's fixed evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateBasedStatement {
    /// Request-count threshold; must be positive.
    pub limit: u64,
    /// Aggregation key selection.
    pub aggregate_key_type: AggregateKeyType,
    /// Composite key parts, used only with [`AggregateKeyType::CustomKeys`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_keys: Vec<RateBasedCustomKey>,
    /// Restricts which requests count toward the rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_down_statement: Option<Box<Statement>>,
    /// Required with [`AggregateKeyType::ForwardedIp`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_ip_config: Option<ForwardedIpConfig>,
}

/// One part of a composite aggregation key.
///
/// The wire schema allows the illegal all-absent and multi-set states,
/// so this is a struct of optionals checked by validation rather than a
/// representation-enforced variant: decode never fails on cardinality,
/// [`Validate`] does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RateBasedCustomKey {
    /// Key on a header value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<RateLimitHeader>,
    /// Key on a cookie value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<RateLimitCookie>,
    /// Key on a query argument value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_argument: Option<RateLimitQueryArgument>,
    /// Key on the whole query string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<RateLimitQueryString>,
    /// Key on the HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<EmptyMarker>,
    /// Key on the source IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<EmptyMarker>,
    /// Key on the forwarded client IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_ip: Option<EmptyMarker>,
    /// Key on a label namespace applied by earlier rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_namespace: Option<RateLimitLabelNamespace>,
    /// Key on the URI path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_path: Option<RateLimitUriPath>,
}

/// Names of the nine legal custom-key alternatives, used in the
/// cardinality validation message.
const CUSTOM_KEY_ALTERNATIVES: &str =
    "header, cookie, query_argument, query_string, http_method, ip, forwarded_ip, \
     label_namespace, uri_path";

impl RateBasedCustomKey {
    /// Count the populated alternatives.
    #[must_use]
    pub fn populated(&self) -> usize {
        [
            self.header.is_some(),
            self.cookie.is_some(),
            self.query_argument.is_some(),
            self.query_string.is_some(),
            self.http_method.is_some(),
            self.ip.is_some(),
            self.forwarded_ip.is_some(),
            self.label_namespace.is_some(),
            self.uri_path.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    /// Key on the source IP.
    #[must_use]
    pub fn ip() -> Self {
        Self {
            ip: Some(EmptyMarker {}),
            ..Self::default()
        }
    }

    /// Key on a header value.
    #[must_use]
    pub fn header(name: impl Into<String>) -> Self {
        Self {
            header: Some(RateLimitHeader {
                name: name.into(),
                text_transformations: Vec::new(),
            }),
            ..Self::default()
        }
    }
}

impl Validate for RateBasedCustomKey {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        let populated = self.populated();
        if populated != 1 {
            result.add_error(ValidationError::error(
                path,
                format!(
                    "exactly one of {CUSTOM_KEY_ALTERNATIVES} must be set; found {populated}"
                ),
            ));
        }
        if let Some(header) = &self.header {
            if header.name.is_empty() {
                result.add_error(ValidationError::error(
                    format!("{path}.header.name"),
                    "header name cannot be empty",
                ));
            }
        }
        if let Some(cookie) = &self.cookie {
            if cookie.name.is_empty() {
                result.add_error(ValidationError::error(
                    format!("{path}.cookie.name"),
                    "cookie name cannot be empty",
                ));
            }
        }
        if let Some(arg) = &self.query_argument {
            if arg.name.is_empty() {
                result.add_error(ValidationError::error(
                    format!("{path}.query_argument.name"),
                    "query argument name cannot be empty",
                ));
            }
        }
        if let Some(ns) = &self.label_namespace {
            if ns.namespace.is_empty() {
                result.add_error(ValidationError::error(
                    format!("{path}.label_namespace.namespace"),
                    "label namespace cannot be empty",
                ));
            }
        }
    }
}

/// Header-derived key part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitHeader {
    /// Header name.
    pub name: String,
    /// Normalizations applied before keying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_transformations: Vec<TextTransformation>,
}

/// Cookie-derived key part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitCookie {
    /// Cookie name.
    pub name: String,
    /// Normalizations applied before keying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_transformations: Vec<TextTransformation>,
}

/// Query-argument-derived key part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitQueryArgument {
    /// Argument name.
    pub name: String,
    /// Normalizations applied before keying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_transformations: Vec<TextTransformation>,
}

/// Query-string-derived key part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitQueryString {
    /// Normalizations applied before keying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_transformations: Vec<TextTransformation>,
}

/// Label-namespace-derived key part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitLabelNamespace {
    /// Namespace prefix, e.g. `awswaf:managed:`.
    pub namespace: String,
}

/// URI-path-derived key part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitUriPath {
    /// Normalizations applied before keying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_transformations: Vec<TextTransformation>,
}

impl Validate for RateBasedStatement {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        if self.limit == 0 {
            result.add_error(ValidationError::error(
                format!("{path}.limit"),
                "rate limit must be a positive request count",
            ));
        }
        match self.aggregate_key_type {
            AggregateKeyType::CustomKeys => {
                if self.custom_keys.is_empty() {
                    result.add_error(ValidationError::error(
                        format!("{path}.custom_keys"),
                        "aggregate key type CUSTOM_KEYS requires at least one custom key",
                    ));
                }
            }
            AggregateKeyType::ForwardedIp => {
                if self.forwarded_ip_config.is_none() {
                    result.add_error(ValidationError::error(
                        format!("{path}.forwarded_ip_config"),
                        "aggregate key type FORWARDED_IP requires a forwarded IP config",
                    ));
                }
            }
            AggregateKeyType::Constant => {
                if self.scope_down_statement.is_none() {
                    result.add_error(ValidationError::error(
                        format!("{path}.scope_down_statement"),
                        "aggregate key type CONSTANT requires a scope-down statement",
                    ));
                }
            }
            AggregateKeyType::Ip => {}
        }
        if self.aggregate_key_type != AggregateKeyType::CustomKeys && !self.custom_keys.is_empty() {
            result.add_error(ValidationError::error(
                format!("{path}.custom_keys"),
                "custom keys are only allowed with aggregate key type CUSTOM_KEYS",
            ));
        }
        for (idx, key) in self.custom_keys.iter().enumerate() {
            key.validate(&format!("{path}.custom_keys[{idx}]"), result);
        }
        if let Some(scope_down) = &self.scope_down_statement {
            scope_down.validate(&format!("{path}.scope_down_statement"), result);
        }
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Wire form of [`RateBasedStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RateBasedStatementWire {
    pub limit: u64,
    pub aggregate_key_type: AggregateKeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_keys: Option<Vec<RateBasedCustomKeyWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_down_statement: Option<Box<StatementWire>>,
    #[serde(
        rename = "ForwardedIPConfig",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub forwarded_ip_config: Option<ForwardedIpConfigWire>,
}

/// Wire form of [`RateBasedCustomKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct RateBasedCustomKeyWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<RateLimitHeaderWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<RateLimitCookieWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_argument: Option<RateLimitQueryArgumentWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<RateLimitQueryStringWire>,
    #[serde(rename = "HTTPMethod", skip_serializing_if = "Option::is_none")]
    pub http_method: Option<EmptyMarker>,
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    pub ip: Option<EmptyMarker>,
    #[serde(rename = "ForwardedIP", skip_serializing_if = "Option::is_none")]
    pub forwarded_ip: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_namespace: Option<RateLimitLabelNamespaceWire>,
    #[serde(rename = "UriPath", skip_serializing_if = "Option::is_none")]
    pub uri_path: Option<RateLimitUriPathWire>,
}

/// Wire form of [`RateLimitHeader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RateLimitHeaderWire {
    pub name: String,
    #[serde(default)]
    pub text_transformations: Vec<TextTransformationWire>,
}

/// Wire form of [`RateLimitCookie`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RateLimitCookieWire {
    pub name: String,
    #[serde(default)]
    pub text_transformations: Vec<TextTransformationWire>,
}

/// Wire form of [`RateLimitQueryArgument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RateLimitQueryArgumentWire {
    pub name: String,
    #[serde(default)]
    pub text_transformations: Vec<TextTransformationWire>,
}

/// Wire form of [`RateLimitQueryString`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct RateLimitQueryStringWire {
    pub text_transformations: Vec<TextTransformationWire>,
}

/// Wire form of [`RateLimitLabelNamespace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RateLimitLabelNamespaceWire {
    pub namespace: String,
}

/// Wire form of [`RateLimitUriPath`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct RateLimitUriPathWire {
    pub text_transformations: Vec<TextTransformationWire>,
}

impl RateBasedStatement {
    pub(crate) fn to_wire(&self) -> RateBasedStatementWire {
        RateBasedStatementWire {
            limit: self.limit,
            aggregate_key_type: self.aggregate_key_type,
            custom_keys: if self.custom_keys.is_empty() {
                None
            } else {
                Some(self.custom_keys.iter().map(RateBasedCustomKey::to_wire).collect())
            },
            scope_down_statement: self
                .scope_down_statement
                .as_ref()
                .map(|s| Box::new(s.to_wire())),
            forwarded_ip_config: self.forwarded_ip_config.as_ref().map(|c| ForwardedIpConfigWire {
                header_name: c.header_name.clone(),
                fallback_behavior: c.fallback_behavior,
            }),
        }
    }

    pub(crate) fn from_wire(
        wire: &RateBasedStatementWire,
        path: &NodePath,
    ) -> DecodeResult<Self> {
        let scope_down_statement = match &wire.scope_down_statement {
            Some(inner) => Some(Box::new(Statement::from_wire(
                inner,
                &path.child("ScopeDownStatement"),
            )?)),
            None => None,
        };
        Ok(Self {
            limit: wire.limit,
            aggregate_key_type: wire.aggregate_key_type,
            custom_keys: wire
                .custom_keys
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(RateBasedCustomKey::from_wire)
                .collect(),
            scope_down_statement,
            forwarded_ip_config: wire.forwarded_ip_config.as_ref().map(|c| ForwardedIpConfig {
                header_name: c.header_name.clone(),
                fallback_behavior: c.fallback_behavior,
            }),
        })
    }
}

impl RateBasedCustomKey {
    fn to_wire(&self) -> RateBasedCustomKeyWire {
        RateBasedCustomKeyWire {
            header: self.header.as_ref().map(|h| RateLimitHeaderWire {
                name: h.name.clone(),
                text_transformations: to_wire_list(&h.text_transformations),
            }),
            cookie: self.cookie.as_ref().map(|c| RateLimitCookieWire {
                name: c.name.clone(),
                text_transformations: to_wire_list(&c.text_transformations),
            }),
            query_argument: self.query_argument.as_ref().map(|a| RateLimitQueryArgumentWire {
                name: a.name.clone(),
                text_transformations: to_wire_list(&a.text_transformations),
            }),
            query_string: self.query_string.as_ref().map(|q| RateLimitQueryStringWire {
                text_transformations: to_wire_list(&q.text_transformations),
            }),
            http_method: self.http_method,
            ip: self.ip,
            forwarded_ip: self.forwarded_ip,
            label_namespace: self.label_namespace.as_ref().map(|n| {
                RateLimitLabelNamespaceWire {
                    namespace: n.namespace.clone(),
                }
            }),
            uri_path: self.uri_path.as_ref().map(|u| RateLimitUriPathWire {
                text_transformations: to_wire_list(&u.text_transformations),
            }),
        }
    }

    fn from_wire(wire: &RateBasedCustomKeyWire) -> Self {
        Self {
            header: wire.header.as_ref().map(|h| RateLimitHeader {
                name: h.name.clone(),
                text_transformations: from_wire_list(&h.text_transformations),
            }),
            cookie: wire.cookie.as_ref().map(|c| RateLimitCookie {
                name: c.name.clone(),
                text_transformations: from_wire_list(&c.text_transformations),
            }),
            query_argument: wire.query_argument.as_ref().map(|a| RateLimitQueryArgument {
                name: a.name.clone(),
                text_transformations: from_wire_list(&a.text_transformations),
            }),
            query_string: wire.query_string.as_ref().map(|q| RateLimitQueryString {
                text_transformations: from_wire_list(&q.text_transformations),
            }),
            http_method: wire.http_method,
            ip: wire.ip,
            forwarded_ip: wire.forwarded_ip,
            label_namespace: wire.label_namespace.as_ref().map(|n| RateLimitLabelNamespace {
                namespace: n.namespace.clone(),
            }),
            uri_path: wire.uri_path.as_ref().map(|u| RateLimitUriPath {
                text_transformations: from_wire_list(&u.text_transformations),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::field::FieldToMatch;
    use crate::statement::leaves::{ByteMatchStatement, PositionalConstraint};
    use crate::statement::transform::TransformationKind;

    fn path() -> NodePath {
        NodePath::root("test")
    }

    fn ip_rate(limit: u64) -> RateBasedStatement {
        RateBasedStatement {
            limit,
            aggregate_key_type: AggregateKeyType::Ip,
            custom_keys: Vec::new(),
            scope_down_statement: None,
            forwarded_ip_config: None,
        }
    }

    #[test]
    fn test_custom_key_exactly_one_valid() {
        let stmt = RateBasedStatement {
            limit: 100,
            aggregate_key_type: AggregateKeyType::CustomKeys,
            custom_keys: vec![RateBasedCustomKey::ip()],
            scope_down_statement: None,
            forwarded_ip_config: None,
        };
        assert!(stmt.check("statement.rate_based").is_valid());
    }

    #[test]
    fn test_custom_key_zero_set_fails() {
        let key = RateBasedCustomKey::default();
        let result = key.check("key");
        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("label_namespace"));
        assert!(result.errors()[0].message.contains("found 0"));
    }

    #[test]
    fn test_custom_key_two_set_fails() {
        let mut key = RateBasedCustomKey::ip();
        key.header = Some(RateLimitHeader {
            name: "X".to_string(),
            text_transformations: Vec::new(),
        });
        let result = key.check("key");
        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("found 2"));
    }

    #[test]
    fn test_zero_limit_fails() {
        let result = ip_rate(0).check("statement.rate_based");
        assert!(!result.is_valid());
        assert!(result.errors()[0].field.ends_with(".limit"));
    }

    #[test]
    fn test_custom_keys_outside_custom_mode_fail() {
        let mut stmt = ip_rate(50);
        stmt.custom_keys = vec![RateBasedCustomKey::ip()];
        let result = stmt.check("statement.rate_based");
        assert!(!result.is_valid());
    }

    #[test]
    fn test_scope_down_round_trip() {
        let stmt = RateBasedStatement {
            limit: 1000,
            aggregate_key_type: AggregateKeyType::Ip,
            custom_keys: Vec::new(),
            scope_down_statement: Some(Box::new(Statement::ByteMatch(ByteMatchStatement {
                field_to_match: FieldToMatch::UriPath,
                positional_constraint: PositionalConstraint::StartsWith,
                search_string: "/login".to_string(),
                text_transformations: vec![TextTransformation::new(
                    0,
                    TransformationKind::Lowercase,
                )],
            }))),
            forwarded_ip_config: None,
        };
        let wire = stmt.to_wire();
        let decoded = RateBasedStatement::from_wire(&wire, &path()).unwrap();
        assert_eq!(decoded, stmt);
    }

    #[test]
    fn test_scope_down_decode_error_carries_path() {
        let wire = RateBasedStatementWire {
            limit: 10,
            aggregate_key_type: AggregateKeyType::Ip,
            custom_keys: None,
            scope_down_statement: Some(Box::new(StatementWire::default())),
            forwarded_ip_config: None,
        };
        let err = RateBasedStatement::from_wire(&wire, &NodePath::root("rules[3]")).unwrap_err();
        assert!(err.to_string().contains("rules[3].ScopeDownStatement"));
    }

    #[test]
    fn test_custom_key_wire_names() {
        let key = RateBasedCustomKey::ip();
        let json = serde_json::to_value(key.to_wire()).unwrap();
        assert_eq!(json, serde_json::json!({ "IP": {} }));
    }
}
