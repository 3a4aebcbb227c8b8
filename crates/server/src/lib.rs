//! HTTP gateway between the browser client and the data services.
//!
//! This crate provides:
//! - OAuth2 session handling with token refresh
//! - Streaming download of source distributions from the asset store
//! - Streaming evaluation through the transformation engine
//! - Disk staging and sink upload for stored results

pub mod auth;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod state;
pub mod upstream;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
