//! Stored transformation download endpoint.

use crate::auth::AuthSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{forward_upstream, with_jar};
use crate::pipeline::{self, TransformOutcome, TransformRequest, TransformSuccess};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SERVER};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use graftgate_core::mime_for_extension;
use graftgate_core::transform::{TransformKind, TransformQuery};

/// Error page shown for failed downloads, unless the caller asked for raw
/// JSON errors.
const DOWNLOAD_ERROR_PAGE: &str = "<h3>An error has occured.</h3>\
<p><code><pre>{{OUTPUT}}</pre></code></p>\
<p>Please contact the service operators.</p>";

/// GET /transform/{distribution}/{transformation}
///
/// Unlike the preview endpoints, the code is not sent by the client but
/// fetched from the asset store, so a plain GET with few parameters can
/// download a stored transformation result.
pub async fn transform_stored(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((distribution, transformation)): Path<(String, String)>,
    Query(query): Query<TransformQuery>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;

    let result: ApiResult<Response> = async {
        let code = pipeline::fetch_transformation_code(&state, &transformation, &token).await?;

        let accept = match query.kind() {
            TransformKind::Graft => query
                .rdf_format
                .as_deref()
                .map(|ext| mime_for_extension(ext).to_string()),
            TransformKind::Pipe => Some("application/csv".to_string()),
        };
        let request = TransformRequest::from_query(code, &query).with_accept(accept);

        let source = pipeline::download_source(&state, &distribution, &token).await?;
        match pipeline::execute(&state, source, request).await? {
            TransformOutcome::SourcePassThrough(response) => Ok(forward_upstream(response)),
            TransformOutcome::Rejected { output } => {
                if query.raw() {
                    Err(ApiError::EngineRejected(output))
                } else {
                    Ok(render_error_page(&output))
                }
            }
            TransformOutcome::Success(success) => Ok(deliver_download(success, &query)),
        }
    }
    .await;

    with_jar(jar, result)
}

/// Direct delivery with download-friendly headers.
///
/// When the cache endpoint was used its headers already describe the stored
/// result, so they pass through untouched.
fn deliver_download(success: TransformSuccess, query: &TransformQuery) -> Response {
    let TransformSuccess {
        response,
        base_name,
        kind,
        ..
    } = success;

    let mut delivered = forward_upstream(response);
    if query.use_cache() {
        return delivered;
    }

    let headers = delivered.headers_mut();
    headers.remove(CONTENT_DISPOSITION);
    headers.remove(CONTENT_TYPE);
    headers.remove(SERVER);

    let extension = match kind {
        TransformKind::Graft => query.rdf_format.clone().unwrap_or_else(|| "nt".to_string()),
        TransformKind::Pipe => "csv".to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(mime_for_extension(&extension)) {
        headers.insert(CONTENT_TYPE, value);
    }
    let disposition = format!("attachment; filename=\"{base_name}.{extension}\"");
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    delivered
}

fn render_error_page(output: &str) -> Response {
    let page = DOWNLOAD_ERROR_PAGE.replace("{{OUTPUT}}", &escape_html(output));
    (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
