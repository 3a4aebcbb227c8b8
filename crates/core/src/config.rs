//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8082").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable HTTP response compression.
    #[serde(default = "default_compression")]
    pub compression: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8082".to_string()
}

fn default_compression() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            compression: default_compression(),
        }
    }
}

/// OAuth2 and session cookie configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registered OAuth2 client ID.
    pub client_id: String,
    /// Registered OAuth2 client secret.
    pub client_secret: String,
    /// Authorization server base URL, as reachable from this gateway.
    pub site: String,
    /// Authorization server base URL as reachable from the browser.
    /// Falls back to `site` when the internal URL is publicly routable.
    #[serde(default)]
    pub public_site: Option<String>,
    /// Public base URL of this gateway, used to build the OAuth2 redirect URI.
    pub public_callback_server: String,
    /// OAuth2 access scope.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Secret used to derive the session cookie encryption key.
    /// Must be a large unguessable string (at least 64 bytes).
    pub cookie_secret: String,
    /// How long the client session stays valid, in seconds.
    #[serde(default = "default_session_duration_secs")]
    pub session_duration_secs: u64,
}

fn default_scope() -> String {
    "public".to_string()
}

fn default_session_duration_secs() -> u64 {
    2 * 60 * 60
}

impl AuthConfig {
    /// Authorization server base URL as seen by the browser.
    pub fn public_site(&self) -> &str {
        self.public_site.as_deref().unwrap_or(&self.site)
    }

    /// Session duration as a [`Duration`].
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }
}

/// Upstream collaborator endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Asset store base URL (distributions and transformation code).
    pub asset_store_uri: String,
    /// Transformation engine base URL.
    pub engine_uri: String,
    /// Cache-enabled transformation engine base URL.
    pub engine_cache_uri: String,
    /// Request connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle keepalive socket timeout in seconds.
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    /// Maximum idle keepalive sockets per host.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_pool_idle_timeout_secs() -> u64 {
    10
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

/// Disk staging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory holding staged result files.
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
    /// Staged file name prefix.
    #[serde(default = "default_staging_prefix")]
    pub prefix: String,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_staging_prefix() -> String {
    "graftgate-save".to_string()
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
            prefix: default_staging_prefix(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

impl AppConfig {
    /// Create a test configuration pointing every upstream at `base_url`.
    ///
    /// **For testing only.** The cookie secret is deterministic.
    pub fn for_testing(base_url: &str, staging_dir: PathBuf) -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                client_id: "test-client".to_string(),
                client_secret: "test-secret".to_string(),
                site: base_url.to_string(),
                public_site: None,
                public_callback_server: "http://localhost:8082".to_string(),
                scope: default_scope(),
                cookie_secret: "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
                    .to_string(),
                session_duration_secs: default_session_duration_secs(),
            },
            upstream: UpstreamConfig {
                asset_store_uri: base_url.to_string(),
                engine_uri: base_url.to_string(),
                engine_cache_uri: format!("{base_url}/cache"),
                connect_timeout_secs: default_connect_timeout_secs(),
                pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
                pool_max_idle_per_host: default_pool_max_idle_per_host(),
            },
            staging: StagingConfig {
                dir: staging_dir,
                prefix: default_staging_prefix(),
            },
        }
    }
}
