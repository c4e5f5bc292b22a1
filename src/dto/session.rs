use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        phase::{VisibleFinishReason, VisibleSessionPhase},
        validation::validate_identifier,
    },
    services::scoreboard::{Scoreboard, Standing, Verdict},
    state::{
        game::{ParticipantId, PoolMode, Session, SessionKey, TrackEntry},
        state_machine::FinishReason,
    },
};

/// Payload identifying the player issuing `join`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Chat user id of the player.
    #[validate(custom(function = "validate_identifier"))]
    pub participant: String,
}

/// Payload of a `guess` command.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    /// Player placing the guess.
    #[validate(custom(function = "validate_identifier"))]
    pub guesser: String,
    /// Player believed to own the current track.
    #[validate(custom(function = "validate_identifier"))]
    pub target: String,
}

/// Generic acknowledgement returned by commands without a richer payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable confirmation.
    pub message: String,
}

impl ActionResponse {
    /// Wrap `message` into a response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a successful `join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Player that joined.
    pub participant: ParticipantId,
    /// Consent link to share with the player privately; absent when no music service is set up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    /// Whether the player already linked their account.
    pub authorized: bool,
}

/// Summary of the pool a `play`/`playlikes` command produced.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayResponse {
    /// Listening source sampled.
    pub mode: PoolMode,
    /// Distinct tracks in the pool.
    pub tracks: usize,
    /// Rounds that will be played (pool size bounded by the round cap).
    pub rounds: usize,
    /// Players whose listening contributed at least one track.
    pub contributors: Vec<ParticipantId>,
}

/// Acknowledgement of a recorded guess.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    /// Round the guess was recorded for.
    pub round: usize,
    /// Human-readable confirmation.
    pub message: String,
}

/// One line of a ranking.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StandingEntry {
    /// Ranked player.
    pub participant: ParticipantId,
    /// Accumulated points.
    pub points: u32,
    /// Competition rank (1, 1, 3 for a two-way tie at the top).
    pub rank: usize,
}

impl From<&Standing> for StandingEntry {
    fn from(value: &Standing) -> Self {
        Self {
            participant: value.participant.clone(),
            points: value.points,
            rank: value.rank,
        }
    }
}

/// Headline result of a finished game.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictDto {
    /// One player holds the top score alone.
    Winner {
        /// The winner.
        participant: ParticipantId,
        /// Their score.
        points: u32,
    },
    /// Several players share the top score.
    Tie {
        /// Tied players.
        participants: Vec<ParticipantId>,
        /// Shared score.
        points: u32,
    },
    /// Nobody joined.
    NoParticipants,
}

impl From<&Verdict> for VerdictDto {
    fn from(value: &Verdict) -> Self {
        match value {
            Verdict::Winner { participant, points } => VerdictDto::Winner {
                participant: participant.clone(),
                points: *points,
            },
            Verdict::Tie {
                participants,
                points,
            } => VerdictDto::Tie {
                participants: participants.clone(),
                points: *points,
            },
            Verdict::NoParticipants => VerdictDto::NoParticipants,
        }
    }
}

/// Final ranking returned by `end` and broadcast when a game finishes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreboardResponse {
    /// How the game ended.
    pub reason: VisibleFinishReason,
    /// Every player, best first.
    pub standings: Vec<StandingEntry>,
    /// Winner or tie.
    pub verdict: VerdictDto,
    /// Chat-ready summary.
    pub headline: String,
}

impl ScoreboardResponse {
    /// Project a computed scoreboard for clients.
    pub fn new(reason: FinishReason, scoreboard: &Scoreboard) -> Self {
        let prefix = match reason {
            FinishReason::Completed => "Game over!",
            FinishReason::EndedEarly => "Game ended early.",
        };
        Self {
            reason: reason.into(),
            standings: scoreboard.standings.iter().map(Into::into).collect(),
            verdict: (&scoreboard.verdict).into(),
            headline: format!("{prefix} {}", scoreboard.headline()),
        }
    }
}

/// Public view of a pool entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackSnapshot {
    /// Provider identifier.
    pub id: String,
    /// Track title.
    pub name: String,
    /// Artist credit.
    pub artist: String,
    /// Cover art URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
}

impl From<&TrackEntry> for TrackSnapshot {
    fn from(value: &TrackEntry) -> Self {
        Self {
            id: value.track_id.clone(),
            name: value.display_name.clone(),
            artist: value.attribution.clone(),
            artwork_url: value.artwork_ref.clone(),
        }
    }
}

/// Round currently accepting guesses.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundSnapshot {
    /// 1-based round number.
    pub number: usize,
    /// Track being guessed; owners stay hidden until the round settles.
    pub track: TrackSnapshot,
    /// Guesses recorded so far.
    pub guesses: usize,
}

/// Read-only projection of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSnapshot {
    /// Session key.
    pub key: SessionKey,
    /// Lifecycle phase.
    pub phase: VisibleSessionPhase,
    /// Phase a command in progress is moving to (e.g. while the pool is being built).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<VisibleSessionPhase>,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Players in join order.
    pub participants: Vec<ParticipantId>,
    /// Listening source of the current pool.
    pub mode: PoolMode,
    /// Tracks in the current pool.
    pub pool_size: usize,
    /// Rounds already settled from this pool.
    pub rounds_played: usize,
    /// Open round, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundSnapshot>,
    /// Current standings.
    pub standings: Vec<StandingEntry>,
    /// RFC 3339 creation time of this session instance.
    pub created_at: String,
}

impl SessionSnapshot {
    /// Project `session`, ranking its players with `scoreboard`.
    pub fn new(session: &Session, scoreboard: &Scoreboard) -> Self {
        let machine = session.machine.snapshot();
        Self {
            key: session.key.clone(),
            phase: machine.phase.into(),
            pending: machine.pending.map(Into::into),
            version: machine.version,
            participants: session.participants.iter().cloned().collect(),
            mode: session.mode,
            pool_size: session.pool.len(),
            rounds_played: session.cursor,
            round: session.open_round.as_ref().map(|round| RoundSnapshot {
                number: round.number,
                track: (&round.track).into(),
                guesses: session.current_guesses.len(),
            }),
            standings: scoreboard.standings.iter().map(Into::into).collect(),
            created_at: format_system_time(session.created_at),
        }
    }
}
