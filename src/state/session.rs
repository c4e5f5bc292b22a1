use std::{
    future::Future,
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        game::{Session, SessionKey},
        state_machine::{Plan, SessionEvent, SessionPhase},
    },
};

/// Ownership token of the round-loop task currently driving a session.
#[derive(Debug, Clone)]
pub struct RoundHandle {
    /// Identifier distinguishing successive loops of the same session.
    pub id: Uuid,
    /// Token observed by the loop at every check point.
    pub token: CancellationToken,
}

impl RoundHandle {
    /// Create a handle for a loop that has not been spawned yet.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }
}

impl Default for RoundHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One session instance together with the locks guarding it.
///
/// The registry hands out `Arc<SessionSlot>`; a reset installs a new slot rather than mutating
/// this one, so a task holding a stale slot can only ever observe a finished game.
pub struct SessionSlot {
    key: SessionKey,
    session: RwLock<Session>,
    transition_gate: Arc<Mutex<()>>,
    // Never held across an await point.
    round: StdMutex<Option<RoundHandle>>,
}

impl SessionSlot {
    /// Fresh idle slot for `key`.
    pub fn new(key: SessionKey) -> Arc<Self> {
        Arc::new(Self {
            session: RwLock::new(Session::new(key.clone())),
            key,
            transition_gate: Arc::new(Mutex::new(())),
            round: StdMutex::new(None),
        })
    }

    /// Key this slot is registered under.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.session.read().await.machine.phase()
    }

    /// Run `f` against a shared view of the session.
    pub async fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guard = self.session.read().await;
        f(&guard)
    }

    /// Run `f` against an exclusive view of the session.
    pub async fn write<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.session.write().await;
        f(&mut guard)
    }

    /// Serialize phase transitions of this session; hold the guard for the whole command.
    pub async fn lock_transitions(&self) -> OwnedMutexGuard<()> {
        self.transition_gate.clone().lock_owned().await
    }

    /// Install `handle` as the live round loop, cancelling whichever loop was live before.
    pub fn install_round(&self, handle: RoundHandle) {
        let previous = self.lock_round().replace(handle);
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Cancel the live round loop, if any. Returns whether a loop was cancelled.
    ///
    /// Safe to call repeatedly and on slots that never ran a round.
    pub fn cancel_round(&self) -> bool {
        match self.lock_round().take() {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget the handle `id` once its loop exits, leaving newer handles untouched.
    pub fn release_round(&self, id: Uuid) {
        let mut guard = self.lock_round();
        if guard.as_ref().is_some_and(|handle| handle.id == id) {
            guard.take();
        }
    }

    /// Identifier of the live round loop, if any.
    pub fn live_round(&self) -> Option<Uuid> {
        self.lock_round().as_ref().map(|handle| handle.id)
    }

    fn lock_round(&self) -> std::sync::MutexGuard<'_, Option<RoundHandle>> {
        // A poisoned lock only means a panic elsewhere; the handle itself stays consistent.
        self.round
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Plan `event`, run `work`, then apply the plan, or abort it when `work` fails or exceeds
    /// `limit`. The caller must hold the transition gate.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SessionEvent,
        limit: Option<Duration>,
        work: F,
    ) -> Result<(T, SessionPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Plan {
            id: plan_id,
            pending_since,
            ..
        } = self.session.write().await.machine.plan(event)?;

        let work_future = work();
        let outcome = if let Some(limit) = limit {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    self.abort_transition(event, plan_id, pending_since, "timeout")
                        .await;
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.session.write().await.machine.apply(plan_id)?;
                Ok((value, next))
            }
            Err(err) => {
                self.abort_transition(event, plan_id, pending_since, "work error")
                    .await;
                Err(err)
            }
        }
    }

    async fn abort_transition(
        &self,
        event: SessionEvent,
        plan_id: Uuid,
        pending_since: Instant,
        cause: &'static str,
    ) {
        let pending_ms = pending_since.elapsed().as_millis();
        match self.session.write().await.machine.abort(plan_id) {
            Ok(()) => debug!(
                session = %self.key,
                event = ?event,
                plan_id = %plan_id,
                cause,
                pending_ms,
                "transition aborted"
            ),
            Err(abort_err) => warn!(
                session = %self.key,
                event = ?event,
                plan_id = %plan_id,
                cause,
                pending_ms,
                error = ?abort_err,
                "failed to abort transition"
            ),
        }
    }
}
