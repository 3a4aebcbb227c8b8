//! Token lifecycle management and the session extractor.
//!
//! Every protected request runs through [`AuthSession`], which loads the
//! encrypted session cookie and asks the [`TokenLifecycle`] for a valid
//! bearer token, refreshing it when expired. Concurrent requests on the same
//! session share one refresh call through a short-lived in-flight map.

use crate::error::ApiError;
use crate::session;
use crate::state::AppState;
use crate::upstream::UpstreamPool;
use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use graftgate_core::{AppConfig, Session, StoredToken, TokenGrant};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

/// OAuth2 callback path, the one route that never requires a token.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Token lifecycle failure modes.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The session holds no token at all.
    #[error("not authenticated")]
    Required,
    /// The refresh was rejected by the authorization server (401/403).
    #[error("session expired")]
    Expired,
    /// The refresh failed for a non-auth reason (network, 5xx).
    #[error("token refresh failed: {0}")]
    Transient(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Required => ApiError::AuthRequired,
            AuthError::Expired => ApiError::AuthExpired,
            AuthError::Transient(msg) => ApiError::TransientAuth(msg),
        }
    }
}

/// Outcome of one refresh call, shared between concurrent waiters.
#[derive(Clone, Debug)]
enum RefreshOutcome {
    Refreshed(StoredToken),
    Denied,
    Failed(String),
}

/// Owns per-session token validity and refresh.
pub struct TokenLifecycle {
    config: Arc<AppConfig>,
    pool: UpstreamPool,
    /// In-flight refreshes keyed by session id. Entries live only for the
    /// duration of one refresh call.
    inflight: Mutex<HashMap<Uuid, Arc<OnceCell<RefreshOutcome>>>>,
}

impl TokenLifecycle {
    pub fn new(config: Arc<AppConfig>, pool: UpstreamPool) -> Self {
        Self {
            config,
            pool,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The authorization URL the browser is sent to when no valid token
    /// exists, built on the public address of the authorization server.
    pub fn authorization_url(&self) -> String {
        let auth = &self.config.auth;
        let redirect_uri = format!("{}{}", auth.public_callback_server, CALLBACK_PATH);
        format!(
            "{}/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}",
            auth.public_site(),
            urlencode(&auth.client_id),
            urlencode(&redirect_uri),
            urlencode(&auth.scope),
        )
    }

    /// Ensure the session holds a valid token, refreshing it if expired.
    ///
    /// Returns the token and whether it was replaced (in which case the
    /// session cookie must be rewritten). On any refresh failure the session
    /// token is cleared; only the reported error kind differs.
    pub async fn ensure_valid(
        &self,
        session: &mut Session,
    ) -> Result<(StoredToken, bool), AuthError> {
        let Some(token) = session.token.clone() else {
            return Err(AuthError::Required);
        };

        if !token.is_expired(OffsetDateTime::now_utc()) {
            return Ok((token, false));
        }

        tracing::info!(session_id = %session.session_id, "refreshing the session token");

        match self.refresh_shared(session.session_id, &token).await {
            RefreshOutcome::Refreshed(fresh) => {
                session.token = Some(fresh.clone());
                Ok((fresh, true))
            }
            RefreshOutcome::Denied => {
                session.token = None;
                Err(AuthError::Expired)
            }
            RefreshOutcome::Failed(msg) => {
                session.token = None;
                Err(AuthError::Transient(msg))
            }
        }
    }

    /// Exchange an authorization code for a token (callback leg).
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken, AuthError> {
        let auth = &self.config.auth;
        let redirect_uri = format!("{}{}", auth.public_callback_server, CALLBACK_PATH);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &redirect_uri),
            ("client_id", &auth.client_id),
            ("client_secret", &auth.client_secret),
        ];

        let response = self
            .pool
            .current()
            .post(format!("{}/oauth/token", auth.site))
            .form(&form)
            .send()
            .await
            .map_err(|err| {
                self.pool.replace_on_fault();
                AuthError::Transient(err.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Expired);
        }
        if !status.is_success() {
            return Err(AuthError::Transient(format!(
                "token endpoint returned {status}"
            )));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|err| AuthError::Transient(err.to_string()))?;
        grant
            .into_stored(None)
            .map_err(|err| AuthError::Transient(err.to_string()))
    }

    /// Single-flight refresh: the first request on a session performs the
    /// call, every concurrent request awaits the same outcome.
    async fn refresh_shared(&self, session_id: Uuid, token: &StoredToken) -> RefreshOutcome {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(session_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let outcome = cell
            .get_or_init(|| self.refresh(token.clone()))
            .await
            .clone();

        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(&session_id) {
            if Arc::ptr_eq(existing, &cell) {
                inflight.remove(&session_id);
            }
        }

        outcome
    }

    /// Perform exactly one refresh call against the authorization server.
    async fn refresh(&self, token: StoredToken) -> RefreshOutcome {
        let auth = &self.config.auth;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", &token.refresh_token),
            ("client_id", &auth.client_id),
            ("client_secret", &auth.client_secret),
        ];

        let response = match self
            .pool
            .current()
            .post(format!("{}/oauth/token", auth.site))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.pool.replace_on_fault();
                return RefreshOutcome::Failed(err.to_string());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return RefreshOutcome::Denied;
        }
        if !status.is_success() {
            return RefreshOutcome::Failed(format!("refresh endpoint returned {status}"));
        }

        let grant: TokenGrant = match response.json().await {
            Ok(grant) => grant,
            Err(err) => return RefreshOutcome::Failed(err.to_string()),
        };

        match grant.into_stored(Some(&token.refresh_token)) {
            Ok(fresh) => RefreshOutcome::Refreshed(fresh),
            Err(err) => RefreshOutcome::Failed(err.to_string()),
        }
    }
}

fn urlencode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Authenticated session extractor for protected handlers.
///
/// Carries the (possibly rewritten) cookie jar; handlers must include it in
/// their response so a refreshed or cleared token reaches the browser.
pub struct AuthSession {
    pub jar: PrivateCookieJar,
    pub session: Session,
    pub token: StoredToken,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        let jar = match PrivateCookieJar::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };

        let mut session = session::load(&jar);
        let max_age = state.config.auth.session_duration();

        match state.lifecycle.ensure_valid(&mut session).await {
            Ok((token, refreshed)) => {
                let jar = if refreshed {
                    session::store(jar, &session, max_age)
                } else {
                    jar
                };
                Ok(Self {
                    jar,
                    session,
                    token,
                })
            }
            Err(err) => {
                // The token is cleared either way; the 401 variants also point
                // the client at the authorization URL.
                let jar = session::store(jar, &session, max_age);
                let api: ApiError = err.into();
                let status = api.status_code();
                let mut body = api.body();
                if matches!(api, ApiError::AuthRequired | ApiError::AuthExpired) {
                    body.data = Some(serde_json::json!({
                        "authorization_url": state.lifecycle.authorization_url(),
                    }));
                }
                Err((status, jar, Json(body)).into_response())
            }
        }
    }
}
