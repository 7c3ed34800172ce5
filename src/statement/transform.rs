//! Text transformations applied to matched input before comparison.

use serde::{Deserialize, Serialize};

/// Normalization applied to a request component before a predicate
/// compares it. A predicate owns a set of these; the enforcement engine
/// applies them in ascending priority order, not insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTransformation {
    /// Relative application order; lower runs first.
    pub priority: i64,
    /// Which normalization to apply.
    pub kind: TransformationKind,
}

impl TextTransformation {
    /// Create a transformation.
    #[must_use]
    pub fn new(priority: i64, kind: TransformationKind) -> Self {
        Self { priority, kind }
    }
}

/// The transformation applied to matched input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    /// No transformation.
    None,
    /// Collapse whitespace runs into a single space.
    CompressWhiteSpace,
    /// Decode HTML entities.
    HtmlEntityDecode,
    /// Lowercase.
    Lowercase,
    /// Command-line normalization (strip escaping, collapse tokens).
    CmdLine,
    /// URL decode.
    UrlDecode,
    /// URL decode including `%uXXXX` escapes.
    UrlDecodeUni,
    /// Base64 decode.
    Base64Decode,
    /// Lenient base64 decode (ignores invalid characters).
    Base64DecodeExt,
    /// Hex decode.
    HexDecode,
    /// MD5 hash of the input.
    Md5,
    /// Replace comments with a single space.
    ReplaceComments,
    /// Remove null bytes.
    RemoveNulls,
    /// Replace null bytes with spaces.
    ReplaceNulls,
    /// Decode ANSI escape sequences.
    EscapeSeqDecode,
    /// Decode SQL hex literals.
    SqlHexDecode,
    /// Decode CSS escapes.
    CssDecode,
    /// Decode JavaScript escapes.
    JsDecode,
    /// Normalize `/./` and `/../` path segments.
    NormalizePath,
    /// Normalize Windows path separators, then path segments.
    NormalizePathWin,
    /// Convert UTF-8 to Unicode escapes.
    Utf8ToUnicode,
}

/// Return the transformations in application order (ascending priority).
///
/// Ties keep their relative wire order; the remote engine treats equal
/// priorities as unordered.
#[must_use]
pub fn ordered(transformations: &[TextTransformation]) -> Vec<&TextTransformation> {
    let mut out: Vec<&TextTransformation> = transformations.iter().collect();
    out.sort_by_key(|t| t.priority);
    out
}

/// Wire form of a text transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TextTransformationWire {
    /// Relative application order.
    pub priority: i64,
    /// Transformation type, e.g. `URL_DECODE`.
    #[serde(rename = "Type")]
    pub kind: TransformationKindWire,
}

/// Wire encoding of [`TransformationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationKindWire {
    None,
    CompressWhiteSpace,
    HtmlEntityDecode,
    Lowercase,
    CmdLine,
    UrlDecode,
    UrlDecodeUni,
    Base64Decode,
    Base64DecodeExt,
    HexDecode,
    #[serde(rename = "MD5")]
    Md5,
    ReplaceComments,
    RemoveNulls,
    ReplaceNulls,
    EscapeSeqDecode,
    SqlHexDecode,
    CssDecode,
    JsDecode,
    NormalizePath,
    NormalizePathWin,
    #[serde(rename = "UTF8_TO_UNICODE")]
    Utf8ToUnicode,
}

impl From<TransformationKind> for TransformationKindWire {
    fn from(kind: TransformationKind) -> Self {
        match kind {
            TransformationKind::None => Self::None,
            TransformationKind::CompressWhiteSpace => Self::CompressWhiteSpace,
            TransformationKind::HtmlEntityDecode => Self::HtmlEntityDecode,
            TransformationKind::Lowercase => Self::Lowercase,
            TransformationKind::CmdLine => Self::CmdLine,
            TransformationKind::UrlDecode => Self::UrlDecode,
            TransformationKind::UrlDecodeUni => Self::UrlDecodeUni,
            TransformationKind::Base64Decode => Self::Base64Decode,
            TransformationKind::Base64DecodeExt => Self::Base64DecodeExt,
            TransformationKind::HexDecode => Self::HexDecode,
            TransformationKind::Md5 => Self::Md5,
            TransformationKind::ReplaceComments => Self::ReplaceComments,
            TransformationKind::RemoveNulls => Self::RemoveNulls,
            TransformationKind::ReplaceNulls => Self::ReplaceNulls,
            TransformationKind::EscapeSeqDecode => Self::EscapeSeqDecode,
            TransformationKind::SqlHexDecode => Self::SqlHexDecode,
            TransformationKind::CssDecode => Self::CssDecode,
            TransformationKind::JsDecode => Self::JsDecode,
            TransformationKind::NormalizePath => Self::NormalizePath,
            TransformationKind::NormalizePathWin => Self::NormalizePathWin,
            TransformationKind::Utf8ToUnicode => Self::Utf8ToUnicode,
        }
    }
}

impl From<TransformationKindWire> for TransformationKind {
    fn from(kind: TransformationKindWire) -> Self {
        match kind {
            TransformationKindWire::None => Self::None,
            TransformationKindWire::CompressWhiteSpace => Self::CompressWhiteSpace,
            TransformationKindWire::HtmlEntityDecode => Self::HtmlEntityDecode,
            TransformationKindWire::Lowercase => Self::Lowercase,
            TransformationKindWire::CmdLine => Self::CmdLine,
            TransformationKindWire::UrlDecode => Self::UrlDecode,
            TransformationKindWire::UrlDecodeUni => Self::UrlDecodeUni,
            TransformationKindWire::Base64Decode => Self::Base64Decode,
            TransformationKindWire::Base64DecodeExt => Self::Base64DecodeExt,
            TransformationKindWire::HexDecode => Self::HexDecode,
            TransformationKindWire::Md5 => Self::Md5,
            TransformationKindWire::ReplaceComments => Self::ReplaceComments,
            TransformationKindWire::RemoveNulls => Self::RemoveNulls,
            TransformationKindWire::ReplaceNulls => Self::ReplaceNulls,
            TransformationKindWire::EscapeSeqDecode => Self::EscapeSeqDecode,
            TransformationKindWire::SqlHexDecode => Self::SqlHexDecode,
            TransformationKindWire::CssDecode => Self::CssDecode,
            TransformationKindWire::JsDecode => Self::JsDecode,
            TransformationKindWire::NormalizePath => Self::NormalizePath,
            TransformationKindWire::NormalizePathWin => Self::NormalizePathWin,
            TransformationKindWire::Utf8ToUnicode => Self::Utf8ToUnicode,
        }
    }
}

impl TextTransformation {
    /// Build the wire form.
    #[must_use]
    pub fn to_wire(&self) -> TextTransformationWire {
        TextTransformationWire {
            priority: self.priority,
            kind: self.kind.into(),
        }
    }

    /// Build the model form from the wire form.
    #[must_use]
    pub fn from_wire(wire: &TextTransformationWire) -> Self {
        Self {
            priority: wire.priority,
            kind: wire.kind.into(),
        }
    }
}

/// Convert a list of transformations to wire form, preserving order.
#[must_use]
pub fn to_wire_list(transformations: &[TextTransformation]) -> Vec<TextTransformationWire> {
    transformations.iter().map(TextTransformation::to_wire).collect()
}

/// Convert a wire list back to model form, preserving order.
#[must_use]
pub fn from_wire_list(wire: &[TextTransformationWire]) -> Vec<TextTransformation> {
    wire.iter().map(TextTransformation::from_wire).collect()
}
