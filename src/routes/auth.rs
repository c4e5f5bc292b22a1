use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::auth::{CallbackQuery, CallbackResponse},
    error::AppError,
    services::auth_service,
    state::SharedState,
};

/// Routes receiving the music service's consent redirects.
pub fn router() -> Router<SharedState> {
    Router::new().route("/callback", get(callback))
}

/// Complete account linking after the player granted access.
#[utoipa::path(
    get,
    path = "/callback",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Account linked", body = CallbackResponse),
        (status = 400, description = "Consent denied or code rejected"),
        (status = 503, description = "Music service unavailable or not configured")
    )
)]
pub async fn callback(
    State(state): State<SharedState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    Ok(Json(
        auth_service::complete_authorization(&state, query).await?,
    ))
}
