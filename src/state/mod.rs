/// Session data model.
pub mod game;
/// Keyed registry of independent sessions.
pub mod registry;
/// Session instance with its locks and round handle.
pub mod session;
/// Broadcast hubs feeding the SSE streams.
pub mod sse;
/// Session lifecycle state machine.
pub mod state_machine;
/// Planned transitions followed by an announcement.
pub mod transitions;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::track_source::TrackSource,
    services::{
        announcer::{Announcer, SseAnnouncer},
        auth_service::AuthorizationNotice,
    },
    state::{game::ParticipantId, registry::SessionRegistry, sse::SessionHubs},
};

pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Cheaply clonable handle on [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state: the session registry plus the collaborators the engine talks to.
pub struct AppState {
    config: AppConfig,
    registry: SessionRegistry,
    hubs: Arc<SessionHubs>,
    announcer: Arc<dyn Announcer>,
    track_source: Option<Arc<dyn TrackSource>>,
    authorizations: mpsc::UnboundedSender<AuthorizationNotice>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Announcements go to the per-session SSE streams. The returned receiver feeds the
    /// authorization relay.
    pub fn new(
        config: AppConfig,
        track_source: Option<Arc<dyn TrackSource>>,
    ) -> (SharedState, mpsc::UnboundedReceiver<AuthorizationNotice>) {
        let hubs = Arc::new(SessionHubs::new(config.sse_capacity));
        let announcer = Arc::new(SseAnnouncer::new(hubs.clone()));
        Self::with_announcer(config, track_source, hubs, announcer)
    }

    /// Same as [`AppState::new`] with a caller-provided announcement sink.
    pub fn with_announcer(
        config: AppConfig,
        track_source: Option<Arc<dyn TrackSource>>,
        hubs: Arc<SessionHubs>,
        announcer: Arc<dyn Announcer>,
    ) -> (SharedState, mpsc::UnboundedReceiver<AuthorizationNotice>) {
        let (authorizations, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            hubs,
            announcer,
            track_source,
            authorizations,
        });
        (state, receiver)
    }

    /// Game tunables.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sessions keyed by guild.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Per-session SSE streams.
    pub fn hubs(&self) -> &SessionHubs {
        &self.hubs
    }

    /// Sink receiving every announcement.
    pub fn announcer(&self) -> &dyn Announcer {
        self.announcer.as_ref()
    }

    /// Music service, if one is configured.
    pub fn track_source(&self) -> Option<Arc<dyn TrackSource>> {
        self.track_source.clone()
    }

    /// Hand a freshly linked participant over to the authorization relay.
    pub fn notify_authorized(&self, participant: ParticipantId) {
        if self
            .authorizations
            .send(AuthorizationNotice {
                participant: participant.clone(),
            })
            .is_err()
        {
            warn!(participant = %participant, "authorization relay is not running");
        }
    }
}
