use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::session::{ScoreboardResponse, TrackSnapshot},
    state::game::{ParticipantId, PoolMode, SessionKey},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialised payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Session the stream is bound to.
    pub session: SessionKey,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a new game opens for joining.
pub struct SessionStartedEvent {
    pub session: SessionKey,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player joins; carries the consent link the bot should deliver privately.
pub struct PlayerJoinedEvent {
    pub participant: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player linked their music account.
pub struct PlayerAuthorizedEvent {
    pub participant: ParticipantId,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once the pool of a `play`/`playlikes` command is built.
pub struct PoolReadyEvent {
    pub mode: PoolMode,
    pub tracks: usize,
    pub rounds: usize,
    pub contributors: Vec<ParticipantId>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a guessing window opens.
pub struct RoundStartedEvent {
    pub round: usize,
    pub rounds: usize,
    pub track: TrackSnapshot,
    pub window_secs: u64,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a guessing window closes and points are awarded.
pub struct RoundSettledEvent {
    pub round: usize,
    pub track: TrackSnapshot,
    pub owners: Vec<ParticipantId>,
    pub winners: Vec<ParticipantId>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast with the final ranking, right before the session resets.
pub struct GameFinishedEvent(pub ScoreboardResponse);
