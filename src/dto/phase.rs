use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{FinishReason, SessionPhase};

/// Publicly visible session phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionPhase {
    /// No game in this session.
    Idle,
    /// Players are joining.
    Collecting,
    /// A guessing window is open.
    RoundActive,
    /// Between two guessing windows.
    RoundSettling,
    /// Game over; the session is about to be reset.
    Finished,
}

impl From<SessionPhase> for VisibleSessionPhase {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Idle => VisibleSessionPhase::Idle,
            SessionPhase::Collecting => VisibleSessionPhase::Collecting,
            SessionPhase::RoundActive => VisibleSessionPhase::RoundActive,
            SessionPhase::RoundSettling => VisibleSessionPhase::RoundSettling,
            SessionPhase::Finished => VisibleSessionPhase::Finished,
        }
    }
}

/// How a game ended.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleFinishReason {
    /// The pool or the round cap ran out.
    Completed,
    /// A player ended the game.
    EndedEarly,
}

impl From<FinishReason> for VisibleFinishReason {
    fn from(value: FinishReason) -> Self {
        match value {
            FinishReason::Completed => VisibleFinishReason::Completed,
            FinishReason::EndedEarly => VisibleFinishReason::EndedEarly,
        }
    }
}
