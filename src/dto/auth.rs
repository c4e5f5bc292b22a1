use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query string the music service appends when redirecting back after consent.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code to exchange.
    pub code: Option<String>,
    /// Participant id passed through the consent flow.
    pub state: Option<String>,
    /// Error reported by the provider, e.g. `access_denied`.
    pub error: Option<String>,
}

/// Returned once a participant's account has been linked.
#[derive(Debug, Serialize, ToSchema)]
pub struct CallbackResponse {
    /// Linked participant.
    pub participant: String,
    /// Human-readable confirmation.
    pub message: String,
}
