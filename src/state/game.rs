use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    time::SystemTime,
};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::state_machine::SessionStateMachine;

/// Opaque identifier of the isolation scope a session lives in (a chat guild).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SessionKey(pub String);

/// Stable external identifier of a player (a chat user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Listening source a pool is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// Most recently played tracks.
    #[default]
    Recent,
    /// Random sample of the saved library.
    Library,
}

/// Track returned by the music service for one participant, before pooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTrack {
    /// Provider identifier; empty when the provider had none (e.g. local files).
    pub id: String,
    /// Track title.
    pub name: String,
    /// Primary artist.
    pub artist: String,
    /// Cover art URL, if any.
    pub artwork_url: Option<String>,
}

/// Guessable track of a pool with the participants whose history produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    /// Provider identifier, unique within a pool.
    pub track_id: String,
    /// Track title.
    pub display_name: String,
    /// Artist credit.
    pub attribution: String,
    /// Cover art URL, if any.
    pub artwork_ref: Option<String>,
    /// Participants owning this track.
    pub owners: BTreeSet<ParticipantId>,
}

impl TrackEntry {
    /// Build a pool entry owned by a single participant.
    pub fn from_candidate(candidate: CandidateTrack, owner: ParticipantId) -> Self {
        Self {
            track_id: candidate.id,
            display_name: candidate.name,
            attribution: candidate.artist,
            artwork_ref: candidate.artwork_url,
            owners: BTreeSet::from([owner]),
        }
    }

    /// Whether `participant` contributed this track.
    pub fn is_owned_by(&self, participant: &ParticipantId) -> bool {
        self.owners.contains(participant)
    }
}

/// Guessing window currently open for a pool entry.
#[derive(Debug, Clone)]
pub struct OpenRound {
    /// 1-based round number.
    pub number: usize,
    /// Entry being guessed.
    pub track: TrackEntry,
}

/// Full state of one game, scoped to a single session key.
///
/// A session is never recycled: when a game ends the registry installs a brand new value, so
/// tasks still holding the old one only ever see a finished game.
#[derive(Debug)]
pub struct Session {
    /// Isolation scope of this session.
    pub key: SessionKey,
    /// Lifecycle state machine.
    pub machine: SessionStateMachine,
    /// Joined players, in join order.
    pub participants: IndexSet<ParticipantId>,
    /// Guessable tracks, fixed once built.
    pub pool: Vec<TrackEntry>,
    /// Index of the next pool entry to play.
    pub cursor: usize,
    /// Source the pool was sampled from.
    pub mode: PoolMode,
    /// Guesses of the open round (guesser -> guessed owner).
    pub current_guesses: HashMap<ParticipantId, ParticipantId>,
    /// Accumulated points.
    pub scores: HashMap<ParticipantId, u32>,
    /// Window accepting guesses, if any.
    pub open_round: Option<OpenRound>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl Session {
    /// Fresh idle session for `key`.
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            machine: SessionStateMachine::new(),
            participants: IndexSet::new(),
            pool: Vec::new(),
            cursor: 0,
            mode: PoolMode::default(),
            current_guesses: HashMap::new(),
            scores: HashMap::new(),
            open_round: None,
            created_at: SystemTime::now(),
        }
    }

    /// Whether `participant` joined this session.
    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    /// Points of `participant`, zero when they never scored.
    pub fn score_of(&self, participant: &ParticipantId) -> u32 {
        self.scores.get(participant).copied().unwrap_or(0)
    }

    /// Install a freshly built pool and rewind to its first entry.
    pub fn load_pool(&mut self, pool: Vec<TrackEntry>, mode: PoolMode) {
        self.pool = pool;
        self.mode = mode;
        self.cursor = 0;
        self.current_guesses.clear();
        self.open_round = None;
    }
}
