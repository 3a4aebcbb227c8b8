//! Preview endpoints: raw downloads and ad-hoc transformations.

use crate::auth::AuthSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{forward_upstream, with_jar};
use crate::pipeline::{self, TransformOutcome, TransformRequest};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use graftgate_core::transform::{TransformKind, TransformQuery};

/// Identity transformation: parses the file through the engine without
/// changing it, so the client can display the original content.
const IDENTITY_PIPE: &str = "(defpipe my-pipe [data-file] (-> (read-dataset data-file)))";

/// GET /preview_raw/{distribution}
///
/// Downloads the raw distribution; the engine is not involved.
pub async fn preview_raw(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(distribution): Path<String>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;
    let result: ApiResult<Response> = async {
        let source = pipeline::download_source(&state, &distribution, &token).await?;
        Ok(forward_upstream(source))
    }
    .await;
    with_jar(jar, result)
}

/// GET /preview_original/{distribution}
///
/// Runs the identity transformation so the engine parses the file and the
/// client sees the original content paginated.
pub async fn preview_original(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(distribution): Path<String>,
    Query(query): Query<TransformQuery>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;
    let result = async {
        let mut request = TransformRequest::from_query(IDENTITY_PIPE.to_string(), &query);
        request.kind = TransformKind::Pipe;
        run_preview(&state, &distribution, &token, request).await
    }
    .await;
    with_jar(jar, result)
}

/// POST /preview/{distribution}
///
/// The transformation code is supplied by the client as JSON. The body is
/// validated completely before any network call is made.
pub async fn preview_with_code(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(distribution): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;
    let result = async {
        let code = match body.get("clojure") {
            None | Some(serde_json::Value::Null) => {
                return Err(ApiError::BadRequest(
                    "the clojure transformation code is missing".to_string(),
                ));
            }
            Some(serde_json::Value::String(code)) => code.clone(),
            Some(_) => {
                return Err(ApiError::BadRequest(
                    "the clojure transformation code is not a string".to_string(),
                ));
            }
        };
        let kind = TransformKind::parse(
            body.get("transformationType").and_then(|v| v.as_str()),
        );

        run_preview(&state, &distribution, &token, TransformRequest::new(code, kind)).await
    }
    .await;
    with_jar(jar, result)
}

/// Shared preview delivery: engine output is forwarded without any header
/// rewriting beyond the usual stripping.
async fn run_preview(
    state: &AppState,
    distribution: &str,
    token: &graftgate_core::StoredToken,
    request: TransformRequest,
) -> ApiResult<Response> {
    let source = pipeline::download_source(state, distribution, token).await?;
    match pipeline::execute(state, source, request).await? {
        TransformOutcome::SourcePassThrough(response) => Ok(forward_upstream(response)),
        TransformOutcome::Rejected { output } => Err(ApiError::EngineRejected(output)),
        TransformOutcome::Success(success) => Ok(forward_upstream(success.response)),
    }
}
