//! Web server module for receiving form webhooks.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use handlers::{
    receive_webhook, root, test_email, webhook_status, AppState, WebhookResponse,
    WebhookStatus, CHALLENGE_HEADER,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/webhook", post(receive_webhook).get(webhook_status))
        .route("/test-email", get(test_email))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
