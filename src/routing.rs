//! Application router configuration.

use axum::{Router, routing::get, routing::post};

use crate::{AppState, endpoints, webhook::post_webhook};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_index))
        .route(endpoints::WEBHOOK, post(post_webhook))
        .with_state(state)
}

/// The root path '/': a plain-text hello, useful as a liveness check.
async fn get_index() -> &'static str {
    "Hello World!"
}
