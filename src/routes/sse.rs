use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::validation::validate_identifier,
    error::AppError,
    services::sse_service,
    state::{SharedState, game::SessionKey},
};

#[utoipa::path(
    get,
    path = "/sessions/{key}/events",
    tag = "sse",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses((status = 200, description = "Announcement stream of one session", content_type = "text/event-stream", body = String))
)]
/// Stream the announcements of one session to the chat bot.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    validate_identifier(&key)
        .map_err(|err| AppError::BadRequest(format!("invalid session key: {err}")))?;
    let key = SessionKey(key);

    let receiver = sse_service::subscribe(&state, &key);
    info!(session = %key, "New SSE connection");
    let greeting = sse_service::handshake(&key);
    Ok(sse_service::to_sse_stream(receiver, key, greeting))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{key}/events", get(session_stream))
}
