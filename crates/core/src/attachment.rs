//! Attachment metadata resolution.
//!
//! Derives file name, type and MIME type from a `content-disposition`
//! response header. This is a pure function over headers: any parse failure
//! falls back to the CSV defaults, since the asset store historically served
//! CSV without a disposition header.

use axum::http::HeaderMap;
use axum::http::header::CONTENT_DISPOSITION;

/// Information about a downloaded attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// File type, from the extension (e.g. "csv", "ttl").
    pub kind: String,
    /// Base name without extension.
    pub name: String,
    /// Full file name.
    pub filename: String,
    /// MIME type for the extension.
    pub mime: String,
}

impl AttachmentInfo {
    /// The fallback used whenever the disposition header is missing or
    /// unparsable.
    pub fn fallback() -> Self {
        Self {
            kind: "csv".to_string(),
            name: "output".to_string(),
            filename: "output.csv".to_string(),
            mime: "text/csv".to_string(),
        }
    }
}

/// MIME type for a file extension (without the leading dot).
///
/// The RDF serialization types are not part of common MIME tables, so they
/// are spelled out here.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "nt" => "application/n-triples",
        "ttl" => "text/turtle",
        "rdf" => "application/rdf+xml",
        "nq" => "application/n-quads",
        "n3" => "text/n3",
        "trix" => "application/trix",
        "trig" => "application/trig",
        "jsonld" => "application/ld+json",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Resolve attachment info from response headers.
pub fn resolve_attachment(headers: &HeaderMap) -> AttachmentInfo {
    let Some(value) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
    else {
        return AttachmentInfo::fallback();
    };

    let Some(filename) = parse_disposition_filename(value) else {
        return AttachmentInfo::fallback();
    };

    // Strip any path component a hostile upstream might have smuggled in.
    let filename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string();
    if filename.is_empty() {
        return AttachmentInfo::fallback();
    }

    let (name, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx + 1..]),
        _ => (filename.as_str(), ""),
    };

    AttachmentInfo {
        kind: ext.to_string(),
        name: name.to_string(),
        mime: mime_for_extension(ext).to_string(),
        filename: filename.clone(),
    }
}

/// Extract the `filename` parameter from a content-disposition value.
///
/// Handles both quoted and unquoted forms. Returns `None` for anything it
/// cannot make sense of; the caller falls back to defaults.
fn parse_disposition_filename(value: &str) -> Option<String> {
    for param in value.split(';').skip(1) {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            continue;
        }
        let raw = raw.trim();
        let filename = if let Some(inner) = raw.strip_prefix('"') {
            inner.strip_suffix('"')?
        } else {
            raw
        };
        if filename.is_empty() {
            return None;
        }
        return Some(filename.to_string());
    }
    None
}
