//! Transformation request model.

use serde::{Deserialize, Serialize};

/// The two transformation flavors understood by the engine.
///
/// `Pipe` produces tabular output, `Graft` produces RDF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    Pipe,
    Graft,
}

impl TransformKind {
    /// Engine endpoint path segment and `command` prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Graft => "graft",
        }
    }

    /// Parse a client-supplied kind; anything but "graft" is a pipe.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("graft") => Self::Graft,
            _ => Self::Pipe,
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters accepted by the transformation endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformQuery {
    /// Transformation kind, `pipe` unless explicitly `graft`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Output RDF serialization extension (e.g. "ttl").
    #[serde(default)]
    pub rdf_format: Option<String>,
    /// Result page to return.
    #[serde(default)]
    pub page: Option<i64>,
    /// Result page size.
    #[serde(default)]
    pub page_size: Option<i64>,
    /// Route the evaluation through the cache-enabled engine endpoint.
    #[serde(default)]
    pub use_cache: Option<bool>,
    /// Report errors as JSON instead of an HTML page.
    #[serde(default)]
    pub raw: Option<bool>,
    /// Override for the engine `command` field.
    #[serde(default)]
    pub command: Option<String>,
}

impl TransformQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 50;

    pub fn kind(&self) -> TransformKind {
        TransformKind::parse(self.kind.as_deref())
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache.unwrap_or(false)
    }

    pub fn raw(&self) -> bool {
        self.raw.unwrap_or(false)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE)
    }
}

/// Content length policy for the streamed upload of the source file.
///
/// The source stream is forwarded to the engine while it is still being
/// downloaded, so its length is only known when the asset store declared one.
/// `Unknown` streams require chunked transfer encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthPolicy {
    Known(u64),
    Unknown,
}

impl LengthPolicy {
    /// Derive the policy from a declared `content-length` header value.
    pub fn from_declared(content_length: Option<u64>) -> Self {
        match content_length {
            Some(n) => Self::Known(n),
            None => Self::Unknown,
        }
    }
}

/// Sanitize an attachment base name for use in a download file name.
///
/// Everything outside `[A-Za-z0-9_-]` is stripped and the `-processed`
/// suffix marks the result as engine output.
pub fn sanitize_base_name(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("{clean}-processed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_pipe() {
        assert_eq!(TransformKind::parse(None), TransformKind::Pipe);
        assert_eq!(TransformKind::parse(Some("pipe")), TransformKind::Pipe);
        assert_eq!(TransformKind::parse(Some("graft")), TransformKind::Graft);
        assert_eq!(TransformKind::parse(Some("nonsense")), TransformKind::Pipe);
    }

    #[test]
    fn page_size_defaults_to_fifty() {
        let query = TransformQuery::default();
        assert_eq!(query.page_size(), 50);
        assert!(!query.use_cache());
        assert!(!query.raw());
    }

    #[test]
    fn length_policy_from_header() {
        assert_eq!(
            LengthPolicy::from_declared(Some(1234)),
            LengthPolicy::Known(1234)
        );
        assert_eq!(LengthPolicy::from_declared(None), LengthPolicy::Unknown);
    }

    #[test]
    fn base_name_is_sanitized() {
        assert_eq!(sanitize_base_name("my data (v2)"), "mydatav2-processed");
        assert_eq!(sanitize_base_name("clean_name-1"), "clean_name-1-processed");
    }
}
