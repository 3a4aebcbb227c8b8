//! Sink endpoints: run a stored transformation and push the result into a
//! downstream store.
//!
//! The engine does not declare a content length for RDF output, while the
//! sinks need one before accepting an upload, so the result is staged on
//! disk once before the final hop.

use crate::auth::AuthSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{forward_upstream, with_jar};
use crate::pipeline::{self, TransformOutcome, TransformRequest, urlencode};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use graftgate_core::StoredToken;
use graftgate_core::transform::TransformKind;
use graftgate_staging::StagedFile;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Readiness probe for the triple store; if this fails there is no point in
/// running the transformation at all.
const READINESS_QUERY: &str = "SELECT (count(*) as ?count) WHERE {?s ?p ?o . }";

#[derive(Debug, Deserialize)]
pub struct FillRepoBody {
    #[serde(default)]
    transformation: Option<String>,
    #[serde(default)]
    distribution: Option<String>,
    #[serde(default)]
    queriabledatastore: Option<String>,
    #[serde(default)]
    ontotext: Option<bool>,
}

/// POST /fillRDFrepo
///
/// Runs the stored transformation as a graft and bulk-loads the result into
/// the queriable data store. Only the Ontotext flavor is supported.
pub async fn fill_rdf_repo(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(body): Json<FillRepoBody>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;

    let result: ApiResult<Response> = async {
        let transformation = require(body.transformation, "the transformation URI is missing")?;
        let distribution = require(body.distribution, "the distribution URI is missing")?;
        let store_uri = require(
            body.queriabledatastore,
            "the queriable data store URI is missing",
        )?;
        if !body.ontotext.unwrap_or(false) {
            return Err(ApiError::NotSupported(
                "only Ontotext queriable data stores are supported".to_string(),
            ));
        }

        let authorization = fetch_store_authorization(&state, &token).await?;
        probe_store(&state, &store_uri, &authorization).await?;

        let staged = match transform_and_stage(
            &state,
            &token,
            &distribution,
            &transformation,
            TransformKind::Graft,
        )
        .await?
        {
            Staged::Delivered(response) => return Ok(response),
            Staged::File(staged) => staged,
        };

        let client = state.pool.current();
        let statements_url = format!("{store_uri}/statements");
        let sent = staged
            .consume(|len, stream| async move {
                client
                    .post(statements_url)
                    .header(AUTHORIZATION, authorization)
                    .header(CONTENT_TYPE, "text/x-nquads;charset=UTF-8")
                    .header(CONTENT_LENGTH, len)
                    .body(reqwest::Body::wrap_stream(stream))
                    .send()
                    .await
            })
            .await?;

        match sent {
            Ok(response) => Ok(forward_upstream(response)),
            Err(err) => {
                state.pool.replace_on_fault();
                Err(ApiError::UpstreamUnavailable(format!(
                    "error while transmitting the transformed data to the database: {err}"
                )))
            }
        }
    }
    .await;

    with_jar(jar, result)
}

#[derive(Debug, Deserialize)]
pub struct FillWizardBody {
    #[serde(default)]
    transformation: Option<String>,
    #[serde(default)]
    distribution: Option<String>,
    #[serde(default, rename = "wizardId")]
    wizard_id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// POST /fillWizard
///
/// Runs the stored transformation and saves the output back into a wizard
/// instance on the asset store.
pub async fn fill_wizard(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(body): Json<FillWizardBody>,
) -> Response {
    let AuthSession { jar, token, .. } = auth;

    let result: ApiResult<Response> = async {
        let transformation = require(body.transformation, "the transformation URI is missing")?;
        let distribution = require(body.distribution, "the distribution URI is missing")?;
        let wizard_id = require(body.wizard_id, "the wizard ID is missing")?;
        let kind = match body.kind.as_deref() {
            Some("pipe") => TransformKind::Pipe,
            Some("graft") => TransformKind::Graft,
            _ => {
                return Err(ApiError::BadRequest(
                    "the transformation type (pipe, graft) is missing".to_string(),
                ));
            }
        };

        let staged =
            match transform_and_stage(&state, &token, &distribution, &transformation, kind).await? {
                Staged::Delivered(response) => return Ok(response),
                Staged::File(staged) => staged,
            };

        let client = state.pool.current();
        let save_url = format!(
            "{}/myassets/upwizards/save_transform/{}",
            state.config.upstream.asset_store_uri,
            urlencode(&wizard_id)
        );
        let access_token = token.access_token.clone();
        let extension = match kind {
            TransformKind::Pipe => "csv",
            TransformKind::Graft => "nt",
        };

        let sent = staged
            .consume(|len, stream| async move {
                let file_part =
                    Part::stream_with_length(reqwest::Body::wrap_stream(stream), len)
                        .file_name(format!("transformed.{extension}"));
                let form = Form::new()
                    .text("upwizard[type_of_transformed_file]", kind.to_string())
                    .part("upwizard[transformed_file]", file_part);
                client
                    .put(save_url)
                    .bearer_auth(access_token)
                    .multipart(form)
                    .send()
                    .await
            })
            .await?;

        match sent {
            Ok(response) => Ok(forward_upstream(response)),
            Err(err) => {
                state.pool.replace_on_fault();
                Err(ApiError::UpstreamUnavailable(format!(
                    "error while transmitting the transformed data back to the asset store: {err}"
                )))
            }
        }
    }
    .await;

    with_jar(jar, result)
}

fn require(field: Option<String>, message: &str) -> ApiResult<String> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(message.to_string())),
    }
}

/// Fetch the account API key and turn it into a Basic authorization header
/// for the queriable data store.
async fn fetch_store_authorization(state: &AppState, token: &StoredToken) -> ApiResult<String> {
    let url = format!("{}/api_keys/first", state.config.upstream.asset_store_uri);
    let response = state
        .pool
        .current()
        .get(url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|err| {
            state.pool.replace_on_fault();
            ApiError::UpstreamUnavailable(format!("unable to fetch the store API key: {err}"))
        })?;

    let status = response.status();
    let key = response.text().await.map_err(|err| {
        ApiError::UpstreamUnavailable(format!("unable to fetch the store API key: {err}"))
    })?;
    if !status.is_success() {
        return Err(ApiError::UpstreamUnavailable(format!(
            "API key endpoint returned {status}"
        )));
    }

    Ok(format!("Basic {}", BASE64.encode(key)))
}

/// Check the store answers a trivial count query before doing any real work.
async fn probe_store(state: &AppState, store_uri: &str, authorization: &str) -> ApiResult<()> {
    let response = state
        .pool
        .current()
        .get(store_uri)
        .query(&[("query", READINESS_QUERY)])
        .header(AUTHORIZATION, authorization)
        .header(ACCEPT, "application/sparql-results+json")
        .send()
        .await
        .map_err(|err| {
            state.pool.replace_on_fault();
            ApiError::SinkNotReady(err.to_string())
        })?;

    if !response.status().is_success() {
        return Err(ApiError::SinkNotReady(format!(
            "readiness probe returned {}",
            response.status()
        )));
    }
    Ok(())
}

enum Staged {
    /// The pipeline already produced a client-facing response (source
    /// pass-through).
    Delivered(Response),
    File(StagedFile),
}

/// Run the transformation and capture its result on disk.
async fn transform_and_stage(
    state: &AppState,
    token: &StoredToken,
    distribution: &str,
    transformation: &str,
    kind: TransformKind,
) -> ApiResult<Staged> {
    let code = pipeline::fetch_transformation_code(state, transformation, token).await?;
    let mut request = TransformRequest::new(code, kind);
    // Long evaluations are expected here, but the result must be complete
    // before the sink hop, so the uncached endpoint is used and the whole
    // stream is awaited on disk.
    request.use_cache = false;

    let source = pipeline::download_source(state, distribution, token).await?;
    match pipeline::execute(state, source, request).await? {
        TransformOutcome::SourcePassThrough(response) => {
            Ok(Staged::Delivered(forward_upstream(response)))
        }
        TransformOutcome::Rejected { output } => Err(ApiError::EngineRejected(output)),
        TransformOutcome::Success(success) => {
            let staged = state.staging.stage(success.response.bytes_stream()).await?;
            Ok(Staged::File(staged))
        }
    }
}
