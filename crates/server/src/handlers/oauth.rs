//! OAuth2 session endpoints.
//!
//! `/oauth/begin` starts the authorization flow, `/oauth/callback` finishes
//! it, `/oauth/status` lets the client proactively check its connection.

use crate::error::{ApiError, ErrorResponse};
use crate::session;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header::REFERER};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

/// GET /oauth/status
pub async fn oauth_status(jar: PrivateCookieJar) -> Json<serde_json::Value> {
    let session = session::load(&jar);
    Json(serde_json::json!({ "connected": session.token.is_some() }))
}

/// GET /oauth/begin
///
/// Unauthenticated sessions remember where the browser came from and are
/// sent to the authorization server; authenticated ones bounce straight
/// back.
pub async fn oauth_begin(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> Response {
    let mut session = session::load(&jar);
    let max_age = state.config.auth.session_duration();

    if session.token.is_none() {
        if let Some(referrer) = headers.get(REFERER).and_then(|v| v.to_str().ok()) {
            session.referrer = Some(referrer.to_string());
        }
        let jar = session::store(jar, &session, max_age);
        return (jar, Redirect::to(&state.lifecycle.authorization_url())).into_response();
    }

    let target = session.referrer.take().unwrap_or_else(|| "/".to_string());
    let jar = session::store(jar, &session, max_age);
    (jar, Redirect::to(&target)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// GET /oauth/callback
///
/// The authorization server redirects here with either a grant code or an
/// error. On success the token lands in the session and the browser returns
/// to the remembered page.
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let mut session = session::load(&jar);
    let max_age = state.config.auth.session_duration();

    // The user refused to grant access.
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "authorization was refused");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error,
                data: query.error_description.map(serde_json::Value::String),
            }),
        )
            .into_response();
    }

    let Some(code) = query.code else {
        return ApiError::BadRequest("the OAuth2 code parameter is missing".to_string())
            .into_response();
    };

    tracing::info!("checking and validating the token");

    match state.lifecycle.exchange_code(&code).await {
        Ok(token) => {
            session.token = Some(token);
            let target = session.referrer.take().unwrap_or_else(|| "/".to_string());
            let jar = session::store(jar, &session, max_age);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(err) => {
            // The half-exchanged token might be broken, better to drop it.
            session.token = None;
            let jar = session::store(jar, &session, max_age);
            (jar, ApiError::from(err)).into_response()
        }
    }
}
