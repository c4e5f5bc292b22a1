use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        session::{
            ActionResponse, GuessRequest, GuessResponse, JoinRequest, JoinResponse, PlayResponse,
            ScoreboardResponse, SessionSnapshot,
        },
        validation::validate_identifier,
    },
    error::AppError,
    services::game_service,
    state::{
        SharedState,
        game::{ParticipantId, PoolMode, SessionKey},
    },
};

/// Routes carrying the chat commands of one session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{key}", get(session_snapshot))
        .route("/sessions/{key}/start", post(start_session))
        .route("/sessions/{key}/join", post(join_session))
        .route("/sessions/{key}/play", post(play_recent))
        .route("/sessions/{key}/playlikes", post(play_likes))
        .route("/sessions/{key}/guess", post(guess))
        .route("/sessions/{key}/end", post(end_session))
}

fn session_key(raw: String) -> Result<SessionKey, AppError> {
    validate_identifier(&raw)
        .map_err(|err| AppError::BadRequest(format!("invalid session key: {err}")))?;
    Ok(SessionKey(raw))
}

/// Open a new game so players can join.
#[utoipa::path(
    post,
    path = "/sessions/{key}/start",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses(
        (status = 200, description = "Game started", body = ActionResponse),
        (status = 409, description = "A game is already in progress")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let key = session_key(key)?;
    Ok(Json(game_service::start_session(&state, &key).await?))
}

/// Join the game currently collecting players.
#[utoipa::path(
    post,
    path = "/sessions/{key}/join",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinResponse),
        (status = 409, description = "Not collecting players or already joined")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let key = session_key(key)?;
    payload.validate()?;
    let response =
        game_service::join_session(&state, &key, ParticipantId(payload.participant)).await?;
    Ok(Json(response))
}

/// Build a pool from recently played tracks and start the rounds.
#[utoipa::path(
    post,
    path = "/sessions/{key}/play",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses(
        (status = 200, description = "Pool built, rounds starting", body = PlayResponse),
        (status = 409, description = "No game or not enough players"),
        (status = 503, description = "Pool building timed out")
    )
)]
pub async fn play_recent(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<PlayResponse>, AppError> {
    let key = session_key(key)?;
    Ok(Json(
        game_service::play(&state, &key, PoolMode::Recent).await?,
    ))
}

/// Build a pool sampled from saved libraries and start the rounds.
#[utoipa::path(
    post,
    path = "/sessions/{key}/playlikes",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses(
        (status = 200, description = "Pool built, rounds starting", body = PlayResponse),
        (status = 409, description = "No game or not enough players"),
        (status = 503, description = "Pool building timed out")
    )
)]
pub async fn play_likes(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<PlayResponse>, AppError> {
    let key = session_key(key)?;
    Ok(Json(
        game_service::play(&state, &key, PoolMode::Library).await?,
    ))
}

/// Guess who owns the track of the open round.
#[utoipa::path(
    post,
    path = "/sessions/{key}/guess",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = GuessResponse),
        (status = 400, description = "Guesser or target is not playing"),
        (status = 409, description = "No open round or already guessed")
    )
)]
pub async fn guess(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<GuessResponse>, AppError> {
    let key = session_key(key)?;
    payload.validate()?;
    let GuessRequest { guesser, target } = payload;
    let response =
        game_service::guess(&state, &key, ParticipantId(guesser), ParticipantId(target)).await?;
    Ok(Json(response))
}

/// End the game early and return the final scoreboard.
#[utoipa::path(
    post,
    path = "/sessions/{key}/end",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses(
        (status = 200, description = "Final scoreboard", body = ScoreboardResponse),
        (status = 409, description = "No game in progress")
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    let key = session_key(key)?;
    Ok(Json(game_service::end_session(&state, &key).await?))
}

/// Current phase, players, open round and standings of a session.
#[utoipa::path(
    get,
    path = "/sessions/{key}",
    tag = "sessions",
    params(("key" = String, Path, description = "Session key (chat guild id)")),
    responses((status = 200, description = "Session snapshot", body = SessionSnapshot))
)]
pub async fn session_snapshot(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let key = session_key(key)?;
    Ok(Json(game_service::session_snapshot(&state, &key).await))
}
