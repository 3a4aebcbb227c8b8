//! Shared upstream HTTP client pool.
//!
//! All upstream hops (asset store, transformation engine, sinks) go through
//! one keepalive connection pool. After a transport fault the handle is
//! discarded and replaced with a freshly built client; callers always fetch
//! the current handle instead of closing over a stale one.

use graftgate_core::config::UpstreamConfig;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Pooled upstream client with replace-on-fault.
#[derive(Clone)]
pub struct UpstreamPool {
    client: Arc<RwLock<reqwest::Client>>,
    config: Arc<UpstreamConfig>,
}

impl UpstreamPool {
    /// Build the pool from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config)?;
        Ok(Self {
            client: Arc::new(RwLock::new(client)),
            config: Arc::new(config.clone()),
        })
    }

    /// Fetch the current client handle.
    pub fn current(&self) -> reqwest::Client {
        // Lock poisoning only happens if a writer panicked; the client inside
        // is still usable.
        match self.client.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Discard the pooled connections after a transport fault.
    pub fn replace_on_fault(&self) {
        match build_client(&self.config) {
            Ok(fresh) => {
                let mut guard = match self.client.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = fresh;
                tracing::warn!("replaced upstream client pool after transport fault");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to rebuild upstream client, keeping current pool");
            }
        }
    }
}

fn build_client(config: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
}
