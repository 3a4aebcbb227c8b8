//! Application state shared across handlers.

use crate::auth::TokenLifecycle;
use crate::upstream::UpstreamPool;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use graftgate_core::AppConfig;
use graftgate_staging::StagingStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Upstream HTTP client pool.
    pub pool: UpstreamPool,
    /// Disk staging store for sink uploads.
    pub staging: StagingStore,
    /// Token lifecycle manager.
    pub lifecycle: Arc<TokenLifecycle>,
    /// Session cookie encryption key, derived from the configured secret.
    cookie_key: Key,
}

impl AppState {
    /// Create the application state, validating the cookie secret and
    /// preparing the staging directory.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.auth.cookie_secret.len() < 64 {
            anyhow::bail!("auth.cookie_secret must be at least 64 bytes");
        }
        let cookie_key = Key::derive_from(config.auth.cookie_secret.as_bytes());

        let pool = UpstreamPool::new(&config.upstream)?;
        let staging = StagingStore::new(&config.staging.dir, &config.staging.prefix).await?;

        let config = Arc::new(config);
        let lifecycle = Arc::new(TokenLifecycle::new(config.clone(), pool.clone()));

        Ok(Self {
            config,
            pool,
            staging,
            lifecycle,
            cookie_key,
        })
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
