use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Whose Track Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::session_stream,
        crate::routes::sessions::start_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::play_recent,
        crate::routes::sessions::play_likes,
        crate::routes::sessions::guess,
        crate::routes::sessions::end_session,
        crate::routes::sessions::session_snapshot,
        crate::routes::auth::callback,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::auth::CallbackResponse,
            crate::dto::session::JoinRequest,
            crate::dto::session::GuessRequest,
            crate::dto::session::ActionResponse,
            crate::dto::session::JoinResponse,
            crate::dto::session::PlayResponse,
            crate::dto::session::GuessResponse,
            crate::dto::session::ScoreboardResponse,
            crate::dto::session::SessionSnapshot,
            crate::dto::sse::Handshake,
            crate::dto::sse::SessionStartedEvent,
            crate::dto::sse::PlayerJoinedEvent,
            crate::dto::sse::PlayerAuthorizedEvent,
            crate::dto::sse::PoolReadyEvent,
            crate::dto::sse::RoundStartedEvent,
            crate::dto::sse::RoundSettledEvent,
            crate::dto::sse::GameFinishedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "sessions", description = "Game commands scoped to a chat guild"),
        (name = "auth", description = "Music account linking"),
    )
)]
pub struct ApiDoc;
