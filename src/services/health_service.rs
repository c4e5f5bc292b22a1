use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the number of known sessions.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let sessions = state.registry().len();

    if state.track_source().is_some() {
        HealthResponse::ok(sessions)
    } else {
        debug!("no music service configured (degraded mode)");
        HealthResponse::degraded(sessions)
    }
}
