/// Announcement sink and its SSE implementation.
pub mod announcer;
/// Music account linking and the authorization relay.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Session lifecycle commands.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Track pool assembly.
pub mod pool_builder;
/// Round timer and guess collection.
pub mod round_service;
/// Final ranking.
pub mod scoreboard;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
