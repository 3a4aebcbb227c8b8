//! Server test utilities.

use axum::body::Body;
use axum::http::Request;
use axum::http::header::SET_COOKIE;
use axum::response::Response;
use graftgate_core::{AppConfig, Session, StoredToken};
use graftgate_server::{AppState, create_router};
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;

/// A test server wrapper pointing every upstream at one mock server.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with its staging directory in a tempdir.
    pub async fn new(upstream_base: &str) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let config = AppConfig::for_testing(upstream_base, temp_dir.path().to_path_buf());
        let state = AppState::new(config)
            .await
            .expect("failed to build app state");
        let router = create_router(state.clone());
        Self {
            router,
            state,
            temp_dir,
        }
    }

    /// Encrypt a session cookie the way the server would, so tests can
    /// present pre-existing sessions.
    pub fn session_cookie(&self, token: Option<StoredToken>) -> String {
        let session = Session {
            token,
            ..Session::new()
        };
        let payload = serde_json::to_string(&session).unwrap();

        let key =
            cookie::Key::derive_from(self.state.config.auth.cookie_secret.as_bytes());
        let mut jar = cookie::CookieJar::new();
        jar.private_mut(&key)
            .add(cookie::Cookie::new("graftgate_session", payload));
        let encrypted = jar.get("graftgate_session").unwrap().value().to_string();
        format!("graftgate_session={encrypted}")
    }

    /// Run one request against a clone of the router.
    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Files currently sitting in the staging directory.
    pub fn staged_files(&self) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(self.temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// A token that is still valid.
#[allow(dead_code)]
pub fn valid_token() -> StoredToken {
    StoredToken {
        access_token: "valid-access".to_string(),
        refresh_token: "valid-refresh".to_string(),
        expires_in: 3600,
        created_at: OffsetDateTime::now_utc().unix_timestamp(),
    }
}

/// A token whose expiry has passed.
#[allow(dead_code)]
pub fn expired_token() -> StoredToken {
    StoredToken {
        access_token: "stale-access".to_string(),
        refresh_token: "stale-refresh".to_string(),
        expires_in: 3600,
        created_at: OffsetDateTime::now_utc().unix_timestamp() - 7200,
    }
}

/// Extract the session cookie pair from a Set-Cookie response header.
#[allow(dead_code)]
pub fn set_cookie_pair(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Collect a response body into bytes.
#[allow(dead_code)]
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Collect a response body into a JSON value.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}
