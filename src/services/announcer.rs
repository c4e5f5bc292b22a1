//! Announcement sink: the engine reports game progress here and never waits on delivery.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    dto::{
        session::{ScoreboardResponse, TrackSnapshot},
        sse::{
            GameFinishedEvent, PlayerAuthorizedEvent, PlayerJoinedEvent, PoolReadyEvent,
            RoundSettledEvent, RoundStartedEvent, ServerEvent, SessionStartedEvent,
        },
    },
    services::scoreboard::Scoreboard,
    state::{
        SharedState,
        game::{ParticipantId, PoolMode, SessionKey, TrackEntry},
        sse::SessionHubs,
        state_machine::FinishReason,
    },
};

/// Longest a sink may take to accept one announcement. Announcements are delivered under the
/// session's transition gate, so this also bounds how long a slow sink delays commands.
pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_SESSION_STARTED: &str = "session.started";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_PLAYER_AUTHORIZED: &str = "player.authorized";
const EVENT_POOL_READY: &str = "pool.ready";
const EVENT_ROUND_STARTED: &str = "round.started";
const EVENT_ROUND_SETTLED: &str = "round.settled";
const EVENT_GAME_FINISHED: &str = "game.finished";

/// Something worth telling the players of a session.
#[derive(Debug, Clone)]
pub enum Announcement {
    /// A game opened for joining.
    SessionStarted,
    /// A player joined.
    PlayerJoined {
        /// Player who joined.
        participant: ParticipantId,
        /// Consent link, when the player still has to link an account.
        authorize_url: Option<String>,
    },
    /// A player linked their music account.
    PlayerAuthorized {
        /// Player who linked an account.
        participant: ParticipantId,
    },
    /// A pool was built.
    PoolReady {
        /// Listening data the pool was built from.
        mode: PoolMode,
        /// Distinct tracks in the pool.
        tracks: usize,
        /// Rounds that will be played.
        rounds: usize,
        /// Players whose tracks made it into the pool.
        contributors: Vec<ParticipantId>,
    },
    /// A guessing window opened.
    RoundStarted {
        /// 1-based round number.
        round: usize,
        /// Total rounds of this pool.
        rounds: usize,
        /// Track being played.
        track: TrackEntry,
        /// How long guesses are accepted.
        window: Duration,
    },
    /// A guessing window closed and was scored.
    RoundSettled {
        /// 1-based round number.
        round: usize,
        /// Track that was played.
        track: TrackEntry,
        /// Players who scored.
        winners: Vec<ParticipantId>,
    },
    /// The game is over.
    GameFinished {
        /// Why the game ended.
        reason: FinishReason,
        /// Final standings.
        scoreboard: Scoreboard,
    },
}

impl Announcement {
    /// Name of the SSE event carrying this announcement.
    pub fn event_name(&self) -> &'static str {
        match self {
            Announcement::SessionStarted => EVENT_SESSION_STARTED,
            Announcement::PlayerJoined { .. } => EVENT_PLAYER_JOINED,
            Announcement::PlayerAuthorized { .. } => EVENT_PLAYER_AUTHORIZED,
            Announcement::PoolReady { .. } => EVENT_POOL_READY,
            Announcement::RoundStarted { .. } => EVENT_ROUND_STARTED,
            Announcement::RoundSettled { .. } => EVENT_ROUND_SETTLED,
            Announcement::GameFinished { .. } => EVENT_GAME_FINISHED,
        }
    }
}

/// Errors raised while delivering an announcement.
#[derive(Debug, Error)]
pub enum AnnounceError {
    /// The payload could not be encoded.
    #[error("failed to serialize {event} payload")]
    Serialize {
        /// Event name.
        event: &'static str,
        /// Encoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Nobody is subscribed to the session stream.
    #[error("no listener attached to session {session}")]
    NoListeners {
        /// Session without listeners.
        session: SessionKey,
    },
}

/// Message sink of the engine.
pub trait Announcer: Send + Sync {
    /// Deliver `announcement` to the players of `key`.
    fn announce(
        &self,
        key: &SessionKey,
        announcement: Announcement,
    ) -> BoxFuture<'static, Result<(), AnnounceError>>;
}

/// Announcer publishing onto the per-session SSE streams.
pub struct SseAnnouncer {
    hubs: Arc<SessionHubs>,
}

impl SseAnnouncer {
    /// Publish onto `hubs`.
    pub fn new(hubs: Arc<SessionHubs>) -> Self {
        Self { hubs }
    }
}

impl Announcer for SseAnnouncer {
    fn announce(
        &self,
        key: &SessionKey,
        announcement: Announcement,
    ) -> BoxFuture<'static, Result<(), AnnounceError>> {
        let result = to_server_event(key, &announcement).and_then(|event| {
            match self.hubs.broadcast(key, event) {
                0 => Err(AnnounceError::NoListeners {
                    session: key.clone(),
                }),
                _ => Ok(()),
            }
        });
        Box::pin(async move { result })
    }
}

/// Deliver `announcement`, logging failures instead of surfacing them.
pub async fn announce(state: &SharedState, key: &SessionKey, announcement: Announcement) {
    let event = announcement.event_name();
    let delivery = state.announcer().announce(key, announcement);
    match timeout(DELIVERY_TIMEOUT, delivery).await {
        Ok(Ok(())) => debug!(session = %key, event, "announcement delivered"),
        Ok(Err(AnnounceError::NoListeners { .. })) => {
            debug!(session = %key, event, "no listener for announcement")
        }
        Ok(Err(err)) => {
            warn!(session = %key, event, error = %err, "failed to deliver announcement")
        }
        Err(_) => warn!(session = %key, event, "announcement delivery timed out"),
    }
}

/// Render `announcement` as the SSE event clients receive.
pub fn to_server_event(
    key: &SessionKey,
    announcement: &Announcement,
) -> Result<ServerEvent, AnnounceError> {
    let event = announcement.event_name();
    match announcement {
        Announcement::SessionStarted => encode(
            event,
            &SessionStartedEvent {
                session: key.clone(),
                message: "A new game started! Join to play.".into(),
            },
        ),
        Announcement::PlayerJoined {
            participant,
            authorize_url,
        } => encode(
            event,
            &PlayerJoinedEvent {
                participant: participant.clone(),
                authorize_url: authorize_url.clone(),
                message: format!("{participant} joined the game."),
            },
        ),
        Announcement::PlayerAuthorized { participant } => encode(
            event,
            &PlayerAuthorizedEvent {
                participant: participant.clone(),
                message: format!("{participant} linked their music account and is ready."),
            },
        ),
        Announcement::PoolReady {
            mode,
            tracks,
            rounds,
            contributors,
        } => {
            let message = if *tracks == 0 {
                "No tracks found. Make sure players linked their music accounts.".to_string()
            } else {
                format!(
                    "Loaded {tracks} tracks from {} players. {rounds} rounds coming up!",
                    contributors.len()
                )
            };
            encode(
                event,
                &PoolReadyEvent {
                    mode: *mode,
                    tracks: *tracks,
                    rounds: *rounds,
                    contributors: contributors.clone(),
                    message,
                },
            )
        }
        Announcement::RoundStarted {
            round,
            rounds,
            track,
            window,
        } => encode(
            event,
            &RoundStartedEvent {
                round: *round,
                rounds: *rounds,
                track: track.into(),
                window_secs: window.as_secs(),
                message: format!(
                    "Round {round}/{rounds}: who listened to {} by {}? You have {} seconds.",
                    track.display_name,
                    track.attribution,
                    window.as_secs()
                ),
            },
        ),
        Announcement::RoundSettled {
            round,
            track,
            winners,
        } => {
            let owners: Vec<ParticipantId> = track.owners.iter().cloned().collect();
            let belonged = format!("{} belonged to {}.", track.display_name, join_ids(&owners));
            let message = if winners.is_empty() {
                format!("No one guessed correctly! {belonged}")
            } else {
                format!("Correct: {}! {belonged}", join_ids(winners))
            };
            encode(
                event,
                &RoundSettledEvent {
                    round: *round,
                    track: TrackSnapshot::from(track),
                    owners,
                    winners: winners.clone(),
                    message,
                },
            )
        }
        Announcement::GameFinished { reason, scoreboard } => encode(
            event,
            &GameFinishedEvent(ScoreboardResponse::new(*reason, scoreboard)),
        ),
    }
}

fn encode(event: &'static str, payload: &impl Serialize) -> Result<ServerEvent, AnnounceError> {
    ServerEvent::json(Some(event.to_string()), payload)
        .map_err(|source| AnnounceError::Serialize { event, source })
}

fn join_ids(ids: &[ParticipantId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn track(owners: &[&str]) -> TrackEntry {
        TrackEntry {
            track_id: "t1".into(),
            display_name: "Song".into(),
            attribution: "Band".into(),
            artwork_ref: None,
            owners: owners.iter().map(|o| ParticipantId::from(*o)).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn missed_round_names_the_owners() {
        let event = to_server_event(
            &SessionKey::from("guild"),
            &Announcement::RoundSettled {
                round: 1,
                track: track(&["U1", "U2"]),
                winners: Vec::new(),
            },
        )
        .unwrap();

        assert_eq!(event.event.as_deref(), Some("round.settled"));
        let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(payload["owners"], serde_json::json!(["U1", "U2"]));
        assert_eq!(
            payload["message"],
            "No one guessed correctly! Song belonged to U1, U2."
        );
    }

    #[test]
    fn round_start_hides_the_owners() {
        let event = to_server_event(
            &SessionKey::from("guild"),
            &Announcement::RoundStarted {
                round: 2,
                rounds: 5,
                track: track(&["U1"]),
                window: Duration::from_secs(10),
            },
        )
        .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert!(payload.get("owners").is_none());
        assert_eq!(payload["track"]["name"], "Song");
        assert_eq!(payload["window_secs"], 10);
    }

    #[tokio::test]
    async fn sse_announcer_reports_missing_listeners() {
        let hubs = Arc::new(SessionHubs::new(4));
        let announcer = SseAnnouncer::new(hubs.clone());
        let key = SessionKey::from("guild");

        let err = announcer
            .announce(&key, Announcement::SessionStarted)
            .await
            .unwrap_err();
        assert!(matches!(err, AnnounceError::NoListeners { .. }));

        let mut receiver = hubs.subscribe(&key);
        announcer
            .announce(&key, Announcement::SessionStarted)
            .await
            .unwrap();
        assert_eq!(
            receiver.recv().await.unwrap().event.as_deref(),
            Some("session.started")
        );
    }
}
