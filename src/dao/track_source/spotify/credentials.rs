use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::state::game::ParticipantId;

/// Refresh tokens slightly before Spotify expires them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Access credential obtained for one participant.
#[derive(Debug, Clone)]
pub struct SpotifyToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Instant,
}

impl SpotifyToken {
    /// Build a token expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        }
    }

    /// Whether the token must be refreshed before use.
    pub fn is_expiring(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

/// In-memory credential store keyed by participant; lost on restart.
#[derive(Debug, Default)]
pub struct CredentialStore {
    tokens: DashMap<ParticipantId, SpotifyToken>,
}

impl CredentialStore {
    pub fn get(&self, participant: &ParticipantId) -> Option<SpotifyToken> {
        self.tokens.get(participant).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, participant: ParticipantId, token: SpotifyToken) {
        self.tokens.insert(participant, token);
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.tokens.contains_key(participant)
    }

    pub fn remove(&self, participant: &ParticipantId) {
        self.tokens.remove(participant);
    }
}
