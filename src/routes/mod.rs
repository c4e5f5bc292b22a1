use axum::Router;

use crate::state::SharedState;

/// Music-account authorization callback.
pub mod auth;
/// Swagger UI and OpenAPI document.
pub mod docs;
/// Health check endpoint.
pub mod health;
/// Session commands and snapshots.
pub mod sessions;
/// Per-session announcement streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(sessions::router())
        .merge(auth::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
