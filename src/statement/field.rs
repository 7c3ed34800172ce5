//! Field-to-match selectors.
//!
//! A predicate inspects exactly one part of the HTTP request. The wire
//! schema signals the selection by field presence: the chosen variant's
//! key is present (an empty marker object for payload-free variants)
//! and every other key is absent.

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, DecodeResult, NodePath};
use crate::validation::{Validate, ValidationError, ValidationResult};

/// Empty wire marker object, `{}`.
///
/// Payload-free selections must serialize to an empty object rather
/// than null; the remote schema distinguishes "key omitted" from "key
/// null".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyMarker {}

/// Which part of the request a predicate inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldToMatch {
    /// The request body.
    Body,
    /// All query arguments.
    AllQueryArguments,
    /// The raw query string.
    QueryString,
    /// The HTTP method.
    Method,
    /// The URI path.
    UriPath,
    /// A single header, by name.
    SingleHeader {
        /// Header name; required, non-empty.
        name: String,
    },
    /// A single query argument, by name.
    SingleQueryArgument {
        /// Argument name; required, non-empty.
        name: String,
    },
    /// Request cookies, filtered by a match pattern.
    Cookies {
        /// Which cookies to inspect.
        pattern: CookieMatchPattern,
        /// Inspect keys, values, or both.
        scope: MatchScope,
        /// What to do when cookies exceed the inspection limit.
        oversize_handling: OversizeHandling,
    },
    /// Request headers, filtered by a match pattern.
    Headers {
        /// Which headers to inspect.
        pattern: HeaderMatchPattern,
        /// Inspect keys, values, or both.
        scope: MatchScope,
        /// What to do when headers exceed the inspection limit.
        oversize_handling: OversizeHandling,
    },
    /// The request body parsed as JSON.
    JsonBody {
        /// Which JSON elements to inspect.
        pattern: JsonMatchPattern,
        /// Inspect keys, values, or both.
        scope: JsonMatchScope,
        /// What to do when the body is not fully parseable.
        invalid_fallback: Option<BodyParsingFallback>,
        /// What to do when the body exceeds the inspection limit.
        oversize_handling: OversizeHandling,
    },
    /// The JA3 fingerprint of the TLS handshake.
    Ja3Fingerprint {
        /// What to do when no fingerprint is available.
        fallback: MatchFallback,
    },
}

impl FieldToMatch {
    /// Single header selector.
    #[must_use]
    pub fn single_header(name: impl Into<String>) -> Self {
        Self::SingleHeader { name: name.into() }
    }

    /// Single query argument selector.
    #[must_use]
    pub fn single_query_argument(name: impl Into<String>) -> Self {
        Self::SingleQueryArgument { name: name.into() }
    }
}

impl Validate for FieldToMatch {
    fn validate(&self, path: &str, result: &mut ValidationResult) {
        match self {
            Self::SingleHeader { name } => {
                if name.is_empty() {
                    result.add_error(ValidationError::error(
                        format!("{path}.single_header.name"),
                        "header name cannot be empty",
                    ));
                }
            }
            Self::SingleQueryArgument { name } => {
                if name.is_empty() {
                    result.add_error(ValidationError::error(
                        format!("{path}.single_query_argument.name"),
                        "query argument name cannot be empty",
                    ));
                }
            }
            _ => {}
        }
    }
}

/// Inspect keys, values, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchScope {
    All,
    Key,
    Value,
}

/// Scope for JSON body inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonMatchScope {
    All,
    Key,
    Value,
}

/// Behavior when a component exceeds the inspection size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OversizeHandling {
    /// Inspect what fits and continue.
    Continue,
    /// Treat the component as matching.
    Match,
    /// Treat the component as not matching.
    NoMatch,
}

/// Behavior when an optional signal is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchFallback {
    Match,
    NoMatch,
}

/// Behavior when the JSON body cannot be fully parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyParsingFallback {
    Match,
    NoMatch,
    EvaluateAsString,
}

/// Which cookies to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieMatchPattern {
    /// All cookies.
    All,
    /// Only the named cookies.
    Included(Vec<String>),
    /// All but the named cookies.
    Excluded(Vec<String>),
}

/// Which headers to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatchPattern {
    /// All headers.
    All,
    /// Only the named headers.
    Included(Vec<String>),
    /// All but the named headers.
    Excluded(Vec<String>),
}

/// Which JSON elements to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonMatchPattern {
    /// The whole document.
    All,
    /// Only the given JSON pointer paths.
    IncludedPaths(Vec<String>),
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Wire form of a field-to-match: one key present, the rest absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct FieldToMatchWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_header: Option<SingleHeaderWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_query_argument: Option<SingleQueryArgumentWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_query_arguments: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_path: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<CookiesWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeadersWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_body: Option<JsonBodyWire>,
    #[serde(rename = "JA3Fingerprint", skip_serializing_if = "Option::is_none")]
    pub ja3_fingerprint: Option<Ja3FingerprintWire>,
}

/// Wire payload for [`FieldToMatch::SingleHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SingleHeaderWire {
    pub name: String,
}

/// Wire payload for [`FieldToMatch::SingleQueryArgument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SingleQueryArgumentWire {
    pub name: String,
}

/// Wire payload for [`FieldToMatch::Cookies`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CookiesWire {
    pub match_pattern: CookieMatchPatternWire,
    pub match_scope: MatchScope,
    pub oversize_handling: OversizeHandling,
}

/// Wire form of a cookie match pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct CookieMatchPatternWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_cookies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_cookies: Option<Vec<String>>,
}

/// Wire payload for [`FieldToMatch::Headers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HeadersWire {
    pub match_pattern: HeaderMatchPatternWire,
    pub match_scope: MatchScope,
    pub oversize_handling: OversizeHandling,
}

/// Wire form of a header match pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct HeaderMatchPatternWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_headers: Option<Vec<String>>,
}

/// Wire payload for [`FieldToMatch::JsonBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct JsonBodyWire {
    pub match_pattern: JsonMatchPatternWire,
    pub match_scope: JsonMatchScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_fallback_behavior: Option<BodyParsingFallback>,
    pub oversize_handling: OversizeHandling,
}

/// Wire form of a JSON match pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct JsonMatchPatternWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<EmptyMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_paths: Option<Vec<String>>,
}

/// Wire payload for [`FieldToMatch::Ja3Fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Ja3FingerprintWire {
    pub fallback_behavior: MatchFallback,
}

impl FieldToMatch {
    /// Build the wire form, populating exactly one alternative.
    #[must_use]
    pub fn to_wire(&self) -> FieldToMatchWire {
        let mut wire = FieldToMatchWire::default();
        match self {
            Self::Body => wire.body = Some(EmptyMarker {}),
            Self::AllQueryArguments => wire.all_query_arguments = Some(EmptyMarker {}),
            Self::QueryString => wire.query_string = Some(EmptyMarker {}),
            Self::Method => wire.method = Some(EmptyMarker {}),
            Self::UriPath => wire.uri_path = Some(EmptyMarker {}),
            Self::SingleHeader { name } => {
                wire.single_header = Some(SingleHeaderWire { name: name.clone() });
            }
            Self::SingleQueryArgument { name } => {
                wire.single_query_argument = Some(SingleQueryArgumentWire { name: name.clone() });
            }
            Self::Cookies {
                pattern,
                scope,
                oversize_handling,
            } => {
                wire.cookies = Some(CookiesWire {
                    match_pattern: pattern.to_wire(),
                    match_scope: *scope,
                    oversize_handling: *oversize_handling,
                });
            }
            Self::Headers {
                pattern,
                scope,
                oversize_handling,
            } => {
                wire.headers = Some(HeadersWire {
                    match_pattern: pattern.to_wire(),
                    match_scope: *scope,
                    oversize_handling: *oversize_handling,
                });
            }
            Self::JsonBody {
                pattern,
                scope,
                invalid_fallback,
                oversize_handling,
            } => {
                wire.json_body = Some(JsonBodyWire {
                    match_pattern: pattern.to_wire(),
                    match_scope: *scope,
                    invalid_fallback_behavior: *invalid_fallback,
                    oversize_handling: *oversize_handling,
                });
            }
            Self::Ja3Fingerprint { fallback } => {
                wire.ja3_fingerprint = Some(Ja3FingerprintWire {
                    fallback_behavior: *fallback,
                });
            }
        }
        wire
    }

    /// Decode the wire form.
    ///
    /// # Errors
    ///
    /// Fails when no alternative is populated, or a name-carrying
    /// alternative has an empty name.
    pub fn from_wire(wire: &FieldToMatchWire, path: &NodePath) -> DecodeResult<Self> {
        let populated = [
            wire.single_header.is_some(),
            wire.single_query_argument.is_some(),
            wire.all_query_arguments.is_some(),
            wire.uri_path.is_some(),
            wire.query_string.is_some(),
            wire.body.is_some(),
            wire.method.is_some(),
            wire.cookies.is_some(),
            wire.headers.is_some(),
            wire.json_body.is_some(),
            wire.ja3_fingerprint.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        if populated > 1 {
            tracing::warn!(
                path = %path,
                populated,
                "field-to-match populated more than one alternative; taking the first in priority order"
            );
        }

        if let Some(header) = &wire.single_header {
            if header.name.is_empty() {
                return Err(DecodeError::EmptyName {
                    kind: "SingleHeader",
                    path: path.child("SingleHeader"),
                });
            }
            return Ok(Self::SingleHeader {
                name: header.name.clone(),
            });
        }
        if let Some(arg) = &wire.single_query_argument {
            if arg.name.is_empty() {
                return Err(DecodeError::EmptyName {
                    kind: "SingleQueryArgument",
                    path: path.child("SingleQueryArgument"),
                });
            }
            return Ok(Self::SingleQueryArgument {
                name: arg.name.clone(),
            });
        }
        if wire.all_query_arguments.is_some() {
            return Ok(Self::AllQueryArguments);
        }
        if wire.uri_path.is_some() {
            return Ok(Self::UriPath);
        }
        if wire.query_string.is_some() {
            return Ok(Self::QueryString);
        }
        if wire.body.is_some() {
            return Ok(Self::Body);
        }
        if wire.method.is_some() {
            return Ok(Self::Method);
        }
        if let Some(cookies) = &wire.cookies {
            return Ok(Self::Cookies {
                pattern: CookieMatchPattern::from_wire(
                    &cookies.match_pattern,
                    &path.child("Cookies.MatchPattern"),
                )?,
                scope: cookies.match_scope,
                oversize_handling: cookies.oversize_handling,
            });
        }
        if let Some(headers) = &wire.headers {
            return Ok(Self::Headers {
                pattern: HeaderMatchPattern::from_wire(
                    &headers.match_pattern,
                    &path.child("Headers.MatchPattern"),
                )?,
                scope: headers.match_scope,
                oversize_handling: headers.oversize_handling,
            });
        }
        if let Some(json_body) = &wire.json_body {
            return Ok(Self::JsonBody {
                pattern: JsonMatchPattern::from_wire(
                    &json_body.match_pattern,
                    &path.child("JsonBody.MatchPattern"),
                )?,
                scope: json_body.match_scope,
                invalid_fallback: json_body.invalid_fallback_behavior,
                oversize_handling: json_body.oversize_handling,
            });
        }
        if let Some(ja3) = &wire.ja3_fingerprint {
            return Ok(Self::Ja3Fingerprint {
                fallback: ja3.fallback_behavior,
            });
        }

        Err(DecodeError::NoFieldToMatch { path: path.clone() })
    }
}

impl CookieMatchPattern {
    fn to_wire(&self) -> CookieMatchPatternWire {
        let mut wire = CookieMatchPatternWire::default();
        match self {
            Self::All => wire.all = Some(EmptyMarker {}),
            Self::Included(names) => wire.included_cookies = Some(names.clone()),
            Self::Excluded(names) => wire.excluded_cookies = Some(names.clone()),
        }
        wire
    }

    fn from_wire(wire: &CookieMatchPatternWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.all.is_some() {
            Ok(Self::All)
        } else if let Some(names) = &wire.included_cookies {
            Ok(Self::Included(names.clone()))
        } else if let Some(names) = &wire.excluded_cookies {
            Ok(Self::Excluded(names.clone()))
        } else {
            Err(DecodeError::Malformed {
                path: path.clone(),
                message: "cookie match pattern selects nothing".to_string(),
            })
        }
    }
}

impl HeaderMatchPattern {
    fn to_wire(&self) -> HeaderMatchPatternWire {
        let mut wire = HeaderMatchPatternWire::default();
        match self {
            Self::All => wire.all = Some(EmptyMarker {}),
            Self::Included(names) => wire.included_headers = Some(names.clone()),
            Self::Excluded(names) => wire.excluded_headers = Some(names.clone()),
        }
        wire
    }

    fn from_wire(wire: &HeaderMatchPatternWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.all.is_some() {
            Ok(Self::All)
        } else if let Some(names) = &wire.included_headers {
            Ok(Self::Included(names.clone()))
        } else if let Some(names) = &wire.excluded_headers {
            Ok(Self::Excluded(names.clone()))
        } else {
            Err(DecodeError::Malformed {
                path: path.clone(),
                message: "header match pattern selects nothing".to_string(),
            })
        }
    }
}

impl JsonMatchPattern {
    fn to_wire(&self) -> JsonMatchPatternWire {
        let mut wire = JsonMatchPatternWire::default();
        match self {
            Self::All => wire.all = Some(EmptyMarker {}),
            Self::IncludedPaths(paths) => wire.included_paths = Some(paths.clone()),
        }
        wire
    }

    fn from_wire(wire: &JsonMatchPatternWire, path: &NodePath) -> DecodeResult<Self> {
        if wire.all.is_some() {
            Ok(Self::All)
        } else if let Some(paths) = &wire.included_paths {
            Ok(Self::IncludedPaths(paths.clone()))
        } else {
            Err(DecodeError::Malformed {
                path: path.clone(),
                message: "JSON match pattern selects nothing".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> NodePath {
        NodePath::root("test")
    }

    #[test]
    fn test_payload_free_variants_serialize_to_empty_marker() {
        let wire = FieldToMatch::UriPath.to_wire();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json, serde_json::json!({ "UriPath": {} }));
    }

    #[test]
    fn test_single_header_round_trip() {
        let field = FieldToMatch::single_header("x-api-key");
        let decoded = FieldToMatch::from_wire(&field.to_wire(), &path()).unwrap();
        assert_eq!(decoded, field);
    }

    #[test]
    fn test_empty_header_name_rejected() {
        let field = FieldToMatch::single_header("");
        let err = FieldToMatch::from_wire(&field.to_wire(), &path()).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyName { kind: "SingleHeader", .. }));
    }

    #[test]
    fn test_empty_names_fail_validation() {
        for field in [
            FieldToMatch::single_header(""),
            FieldToMatch::single_query_argument(""),
        ] {
            let result = field.check("field_to_match");
            assert!(!result.is_valid());
            assert!(result.errors_only()[0].field.contains(".name"));
        }
        assert!(FieldToMatch::single_header("x-api-key").check("field_to_match").is_valid());
    }

    #[test]
    fn test_no_alternative_rejected() {
        let wire = FieldToMatchWire::default();
        let err = FieldToMatch::from_wire(&wire, &path()).unwrap_err();
        assert!(matches!(err, DecodeError::NoFieldToMatch { .. }));
    }

    #[test]
    fn test_json_body_round_trip() {
        let field = FieldToMatch::JsonBody {
            pattern: JsonMatchPattern::IncludedPaths(vec!["/user/id".to_string()]),
            scope: JsonMatchScope::Value,
            invalid_fallback: Some(BodyParsingFallback::EvaluateAsString),
            oversize_handling: OversizeHandling::NoMatch,
        };
        let wire = field.to_wire();
        assert_eq!(FieldToMatch::from_wire(&wire, &path()).unwrap(), field);
    }

    #[test]
    fn test_cookies_round_trip() {
        let field = FieldToMatch::Cookies {
            pattern: CookieMatchPattern::Excluded(vec!["session".to_string()]),
            scope: MatchScope::Key,
            oversize_handling: OversizeHandling::Continue,
        };
        let wire = field.to_wire();
        assert_eq!(FieldToMatch::from_wire(&wire, &path()).unwrap(), field);
    }

    #[test]
    fn test_absent_keys_are_omitted_not_null() {
        let json = serde_json::to_string(&FieldToMatch::Method.to_wire()).unwrap();
        assert_eq!(json, r#"{"Method":{}}"#);
    }

    #[test]
    fn test_unknown_alternative_is_a_decode_error() {
        let result: Result<FieldToMatchWire, _> =
            serde_json::from_value(serde_json::json!({ "HeaderOrder": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn test_ja3_wire_key() {
        let field = FieldToMatch::Ja3Fingerprint {
            fallback: MatchFallback::NoMatch,
        };
        let json = serde_json::to_value(field.to_wire()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "JA3Fingerprint": { "FallbackBehavior": "NO_MATCH" } })
        );
    }
}
