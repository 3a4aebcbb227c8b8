//! Streaming transformation pipeline orchestrator.
//!
//! The source file is transferred from the asset store straight into the
//! transformation engine: this server never holds a whole file in memory, it
//! only works on streams. Hops within one request are strictly sequential —
//! download, transform, then deliver or stage — because each later hop
//! consumes the previous hop's live stream.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::http::header::ACCEPT;
use graftgate_core::transform::{LengthPolicy, TransformKind, TransformQuery};
use graftgate_core::{AttachmentInfo, StoredToken, resolve_attachment, sanitize_base_name};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};

/// One transformation engine request, fully assembled before any network
/// call.
#[derive(Clone, Debug)]
pub struct TransformRequest {
    /// The transformation code, sent to the engine as a virtual file.
    pub code: String,
    pub kind: TransformKind,
    /// Accept header for the engine response, when the caller wants a
    /// specific output serialization.
    pub accept: Option<String>,
    pub page: Option<i64>,
    pub page_size: i64,
    pub use_cache: bool,
    /// Override for the engine `command` field; defaults to `my-<kind>`.
    pub command: Option<String>,
}

impl TransformRequest {
    pub fn new(code: String, kind: TransformKind) -> Self {
        Self {
            code,
            kind,
            accept: None,
            page: None,
            page_size: TransformQuery::DEFAULT_PAGE_SIZE,
            use_cache: false,
            command: None,
        }
    }

    pub fn from_query(code: String, query: &TransformQuery) -> Self {
        Self {
            code,
            kind: query.kind(),
            accept: None,
            page: query.page,
            page_size: query.page_size(),
            use_cache: query.use_cache(),
            command: query.command.clone(),
        }
    }

    pub fn with_accept(mut self, accept: Option<String>) -> Self {
        self.accept = accept;
        self
    }
}

/// What came out of the engine hop.
pub enum TransformOutcome {
    /// The asset store answered with a non-200 status; its response is
    /// forwarded to the client verbatim so it can render the real error.
    SourcePassThrough(reqwest::Response),
    /// The engine answered with a non-200 status; its body has been drained
    /// into a string. Never retried.
    Rejected { output: String },
    /// The engine is streaming a result.
    Success(TransformSuccess),
}

/// A live engine result stream plus the metadata needed to deliver it.
pub struct TransformSuccess {
    pub response: reqwest::Response,
    pub attachment: AttachmentInfo,
    /// Sanitized attachment base name, suffixed `-processed`.
    pub base_name: String,
    pub kind: TransformKind,
}

/// Resolve a distribution id to its asset-store attachment path.
///
/// Wizard-held files are identified by `upwizards--<number>`; everything else
/// lives in the file store. A file store id starting with `upwizards--`
/// followed by digits cannot exist, so exactly one of the two forms applies.
fn attachment_path(distribution: &str) -> String {
    if let Some(id) = distribution.strip_prefix("upwizards--") {
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            return format!("/myassets/upwizards/{id}/attachment");
        }
    }
    format!("/myassets/filestores/{}/attachment", urlencode(distribution))
}

/// Download the raw distribution stream from the asset store.
///
/// The response is returned live, not buffered; the caller inspects its
/// status before deciding what to do with the stream.
pub async fn download_source(
    state: &AppState,
    distribution: &str,
    token: &StoredToken,
) -> ApiResult<reqwest::Response> {
    let url = format!(
        "{}{}",
        state.config.upstream.asset_store_uri,
        attachment_path(distribution)
    );

    state
        .pool
        .current()
        .get(url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|err| {
            state.pool.replace_on_fault();
            ApiError::UpstreamUnavailable(format!("unable to download the data distribution: {err}"))
        })
}

/// Fetch stored transformation code from the asset store.
pub async fn fetch_transformation_code(
    state: &AppState,
    transformation: &str,
    token: &StoredToken,
) -> ApiResult<String> {
    let url = format!(
        "{}/myassets/transformations/{}/configuration/code",
        state.config.upstream.asset_store_uri,
        urlencode(transformation)
    );

    let response = state
        .pool
        .current()
        .get(url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|err| {
            state.pool.replace_on_fault();
            ApiError::UpstreamUnavailable(format!("unable to load the transformation code: {err}"))
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|err| {
        ApiError::UpstreamUnavailable(format!("unable to load the transformation code: {err}"))
    })?;
    if !status.is_success() {
        return Err(ApiError::UpstreamUnavailable(format!(
            "transformation code endpoint returned {status}: {body}"
        )));
    }
    Ok(body)
}

/// Forward the source stream through the transformation engine.
///
/// The first suspension point (source response headers) has already passed
/// when this is called; the second is the engine's response headers. The
/// source body is piped into the outbound multipart request while it is still
/// downloading.
pub async fn execute(
    state: &AppState,
    source: reqwest::Response,
    request: TransformRequest,
) -> ApiResult<TransformOutcome> {
    if source.status() != StatusCode::OK {
        return Ok(TransformOutcome::SourcePassThrough(source));
    }

    let attachment = resolve_attachment(source.headers());
    let length = LengthPolicy::from_declared(source.content_length());
    let base_name = sanitize_base_name(&attachment.name);
    let kind = request.kind;

    // The engine requires a transformation code file, so a virtual one is
    // attached alongside the live data stream.
    let code_part = Part::text(request.code)
        .file_name("pipeline.clj")
        .mime_str("text/plain")
        .map_err(internal)?;

    let data_body = reqwest::Body::wrap_stream(source.bytes_stream());
    // With a declared source length the engine sees a sized part; otherwise
    // the part is sent with chunked transfer encoding, which keeps the
    // upload streaming without inventing a length.
    let data_part = match length {
        LengthPolicy::Known(n) => Part::stream_with_length(data_body, n),
        LengthPolicy::Unknown => Part::stream(data_body),
    }
    .file_name(attachment.filename.clone())
    .mime_str(&attachment.mime)
    .map_err(internal)?;

    let command = request
        .command
        .unwrap_or_else(|| format!("my-{}", kind.as_str()));

    let mut form = Form::new()
        .part("pipeline", code_part)
        .part("data", data_part)
        .text("command", command)
        .text("page-size", request.page_size.to_string());
    if let Some(page) = request.page {
        form = form.text("page", page.to_string());
    }

    // The cache-enabled endpoint is recommended for slow evaluations, where
    // the client HTTP timeout may fire long before the engine returns.
    let base = if request.use_cache {
        &state.config.upstream.engine_cache_uri
    } else {
        &state.config.upstream.engine_uri
    };
    let url = format!("{}/evaluate/{}", base, kind.as_str());

    let mut engine_request = state.pool.current().post(url).multipart(form);
    if let Some(accept) = &request.accept {
        engine_request = engine_request.header(ACCEPT, accept);
    }

    let response = match engine_request.send().await {
        Ok(response) => response,
        Err(err) => {
            // Dropping the request aborts the still-open source download.
            state.pool.replace_on_fault();
            return Err(ApiError::UpstreamUnavailable(format!(
                "unable to reach the transformation engine: {err}"
            )));
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        let output = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, "the transformation engine rejected the request");
        return Ok(TransformOutcome::Rejected { output });
    }

    Ok(TransformOutcome::Success(TransformSuccess {
        response,
        attachment,
        base_name,
        kind,
    }))
}

fn internal(err: reqwest::Error) -> ApiError {
    ApiError::Internal(err.to_string())
}

pub(crate) fn urlencode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
