//! In-memory collaborators for engine tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{
    config::AppConfig,
    dao::{
        source::{SourceError, SourceResult},
        track_source::TrackSource,
    },
    services::{
        announcer::{AnnounceError, Announcement, Announcer},
        auth_service::AuthorizationNotice,
    },
    state::{
        AppState, SharedState,
        game::{CandidateTrack, ParticipantId, PoolMode, SessionKey},
        sse::SessionHubs,
    },
};

/// Candidate with the given id and placeholder metadata.
pub fn candidate(id: &str) -> CandidateTrack {
    CandidateTrack {
        id: id.to_string(),
        name: format!("Track {id}"),
        artist: "Artist".to_string(),
        artwork_url: None,
    }
}

/// Track source serving canned tracks per participant.
#[derive(Clone, Default)]
pub struct StaticTrackSource {
    tracks: HashMap<ParticipantId, Vec<CandidateTrack>>,
    failing: HashSet<ParticipantId>,
    linked: Arc<Mutex<HashSet<ParticipantId>>>,
    delay: Option<Duration>,
}

impl StaticTrackSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `participant` and serve `ids` as their tracks, in order.
    pub fn with_tracks(mut self, participant: &str, ids: &[&str]) -> Self {
        let participant = ParticipantId::from(participant);
        self.link(&participant);
        self.tracks
            .insert(participant, ids.iter().map(|id| candidate(id)).collect());
        self
    }

    /// Link `participant` but fail every fetch.
    pub fn with_failure(mut self, participant: &str) -> Self {
        let participant = ParticipantId::from(participant);
        self.link(&participant);
        self.failing.insert(participant);
        self
    }

    /// Delay every fetch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn link(&self, participant: &ParticipantId) {
        self.linked.lock().unwrap().insert(participant.clone());
    }
}

impl TrackSource for StaticTrackSource {
    fn authorize_url(&self, participant: &ParticipantId) -> Option<String> {
        Some(format!("https://music.test/authorize?state={participant}"))
    }

    fn is_authorized(&self, participant: &ParticipantId) -> BoxFuture<'static, bool> {
        let linked = self.linked.lock().unwrap().contains(participant);
        Box::pin(async move { linked })
    }

    fn complete_authorization(
        &self,
        participant: &ParticipantId,
        code: String,
    ) -> BoxFuture<'static, SourceResult<()>> {
        let source = self.clone();
        let participant = participant.clone();
        Box::pin(async move {
            if code == "rejected" {
                return Err(SourceError::AuthorizationRejected("invalid code".into()));
            }
            source.link(&participant);
            Ok(())
        })
    }

    fn fetch_tracks(
        &self,
        participant: &ParticipantId,
        _mode: PoolMode,
        limit: usize,
    ) -> BoxFuture<'static, SourceResult<Vec<CandidateTrack>>> {
        let failing = self.failing.contains(participant);
        let tracks = self.tracks.get(participant).cloned().unwrap_or_default();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if failing {
                return Err(SourceError::unavailable(
                    "stubbed outage".into(),
                    std::io::Error::other("connection reset"),
                ));
            }
            Ok(tracks.into_iter().take(limit).collect())
        })
    }
}

/// Announcer remembering everything it was asked to deliver.
#[derive(Default)]
pub struct RecordingAnnouncer {
    delivered: Mutex<Vec<(SessionKey, Announcement)>>,
    failing: bool,
    stalling: bool,
}

impl RecordingAnnouncer {
    /// Announcer recording every announcement and then reporting a delivery failure.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Announcer recording every announcement and then never completing the delivery.
    pub fn stalling() -> Self {
        Self {
            stalling: true,
            ..Self::default()
        }
    }

    /// Announcements delivered to `key`, oldest first.
    pub fn for_session(&self, key: &SessionKey) -> Vec<Announcement> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(session, _)| session == key)
            .map(|(_, announcement)| announcement.clone())
            .collect()
    }

    /// Event names delivered to `key`, oldest first.
    pub fn event_names(&self, key: &SessionKey) -> Vec<&'static str> {
        self.for_session(key)
            .iter()
            .map(Announcement::event_name)
            .collect()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(
        &self,
        key: &SessionKey,
        announcement: Announcement,
    ) -> BoxFuture<'static, Result<(), AnnounceError>> {
        self.delivered
            .lock()
            .unwrap()
            .push((key.clone(), announcement));
        if self.stalling {
            return Box::pin(futures::future::pending());
        }
        let result = if self.failing {
            Err(AnnounceError::NoListeners {
                session: key.clone(),
            })
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Shared state wired to `source` and a recording announcer.
pub fn test_state(
    config: AppConfig,
    source: Option<StaticTrackSource>,
    announcer: Arc<RecordingAnnouncer>,
) -> (SharedState, mpsc::UnboundedReceiver<AuthorizationNotice>) {
    let hubs = Arc::new(SessionHubs::new(config.sse_capacity));
    let source = source.map(|source| Arc::new(source) as Arc<dyn TrackSource>);
    AppState::with_announcer(config, source, hubs, announcer)
}
