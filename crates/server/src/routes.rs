//! Route configuration.

use crate::auth::CALLBACK_PATH;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // OAuth2 session surface. The callback and status routes are the
        // only ones that never require a valid token.
        .route("/oauth/status", get(handlers::oauth_status))
        .route("/oauth/begin", get(handlers::oauth_begin))
        .route(CALLBACK_PATH, get(handlers::oauth_callback))
        // Previews
        .route("/preview_raw/{distribution}", get(handlers::preview_raw))
        .route(
            "/preview_original/{distribution}",
            get(handlers::preview_original),
        )
        .route("/preview/{distribution}", post(handlers::preview_with_code))
        // Stored transformation download
        .route(
            "/transform/{distribution}/{transformation}",
            get(handlers::transform_stored),
        )
        // Sinks
        .route("/fillRDFrepo", post(handlers::fill_rdf_repo))
        .route("/fillWizard", post(handlers::fill_wizard));

    // Most of the transmitted data compresses very well; the CPU cost is
    // accepted.
    let router = if state.config.server.compression {
        router.layer(CompressionLayer::new())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
