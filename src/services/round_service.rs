//! Round timer and guess collector: drives one guessing window at a time.

use std::{collections::hash_map::Entry, sync::Arc};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{
        announcer::{Announcement, announce},
        game_service,
    },
    state::{
        SharedState,
        game::{OpenRound, ParticipantId, Session, TrackEntry},
        session::{RoundHandle, SessionSlot},
        state_machine::{FinishReason, SessionEvent, SessionPhase},
    },
};

/// How a call to [`run_round`] ended.
#[derive(Debug)]
pub enum RoundOutcome {
    /// The pool or the round cap ran out; no window was opened.
    Exhausted,
    /// The loop was cancelled; nothing was scored or announced for the in-flight track.
    Cancelled,
    /// The window closed and points were awarded.
    Settled(SettledRound),
}

/// Result of a scored round.
#[derive(Debug, Clone)]
pub struct SettledRound {
    /// 1-based round number.
    pub round: usize,
    /// Track that was guessed.
    pub track: TrackEntry,
    /// Players who named an owner other than themselves.
    pub winners: Vec<ParticipantId>,
}

enum Opening {
    Opened { round: usize, track: TrackEntry },
    Exhausted,
    Cancelled,
}

/// Number of rounds a pool of `pool_len` entries yields under `round_cap`.
pub fn rounds_for(pool_len: usize, round_cap: usize) -> usize {
    pool_len.min(round_cap)
}

/// Record `guesser`'s single guess for the open round, returning the round number.
pub fn record_guess(
    session: &mut Session,
    guesser: ParticipantId,
    target: ParticipantId,
) -> Result<usize, ServiceError> {
    let round = match (&session.open_round, session.machine.phase()) {
        (Some(open), SessionPhase::RoundActive) => open.number,
        _ => {
            return Err(ServiceError::InvalidState(
                "no round is accepting guesses right now".into(),
            ));
        }
    };

    if !session.has_participant(&guesser) {
        return Err(ServiceError::InvalidInput(format!(
            "{guesser} has not joined this game"
        )));
    }
    if !session.has_participant(&target) {
        return Err(ServiceError::InvalidInput(format!("{target} is not playing")));
    }

    match session.current_guesses.entry(guesser) {
        Entry::Occupied(entry) => Err(ServiceError::InvalidState(format!(
            "{} already guessed this round",
            entry.key()
        ))),
        Entry::Vacant(entry) => {
            entry.insert(target);
            Ok(round)
        }
    }
}

/// Guessers whose guess names an owner of `track`, self-guesses excluded, in join order.
fn winners_of(session: &Session, track: &TrackEntry) -> Vec<ParticipantId> {
    session
        .participants
        .iter()
        .filter(|guesser| {
            session
                .current_guesses
                .get(*guesser)
                .is_some_and(|target| target != *guesser && track.is_owned_by(target))
        })
        .cloned()
        .collect()
}

fn open_next(session: &mut Session, token: &CancellationToken, round_cap: usize) -> Opening {
    if token.is_cancelled() {
        return Opening::Cancelled;
    }
    if session.cursor >= rounds_for(session.pool.len(), round_cap) {
        return Opening::Exhausted;
    }

    match session.machine.phase() {
        SessionPhase::RoundActive if session.open_round.is_none() => {}
        SessionPhase::RoundSettling => {
            if let Err(err) = session.machine.fire(SessionEvent::OpenWindow) {
                warn!(session = %session.key, error = %err, "cannot open guessing window");
                return Opening::Cancelled;
            }
        }
        phase => {
            debug!(session = %session.key, ?phase, "session left the round loop");
            return Opening::Cancelled;
        }
    }

    let track = session.pool[session.cursor].clone();
    let round = session.cursor + 1;
    session.current_guesses.clear();
    session.open_round = Some(OpenRound {
        number: round,
        track: track.clone(),
    });
    Opening::Opened { round, track }
}

fn settle(session: &mut Session, token: &CancellationToken) -> Option<SettledRound> {
    if token.is_cancelled() {
        return None;
    }
    if session.machine.phase() != SessionPhase::RoundActive {
        return None;
    }
    session.open_round.as_ref()?;

    if let Err(err) = session.machine.fire(SessionEvent::CloseWindow) {
        warn!(session = %session.key, error = %err, "cannot close guessing window");
        return None;
    }
    let open = session.open_round.take()?;

    let winners = winners_of(session, &open.track);
    for winner in &winners {
        *session.scores.entry(winner.clone()).or_insert(0) += 1;
    }
    session.cursor += 1;

    Some(SettledRound {
        round: open.number,
        track: open.track,
        winners,
    })
}

/// Play the next pool entry: announce it, wait out the guessing window, then score it.
///
/// The window wait is the only suspension point that does not hold the transition gate, and
/// it ends early when `token` is cancelled.
pub async fn run_round(
    state: &SharedState,
    slot: &SessionSlot,
    token: &CancellationToken,
) -> RoundOutcome {
    let config = state.config();

    // Both announcements go out under the gate so `end` and `play` never publish ahead of them.
    {
        let _gate = slot.lock_transitions().await;
        let (opening, rounds) = slot
            .write(|session| {
                let rounds = rounds_for(session.pool.len(), config.round_cap);
                (open_next(session, token, config.round_cap), rounds)
            })
            .await;

        match opening {
            Opening::Exhausted => return RoundOutcome::Exhausted,
            Opening::Cancelled => return RoundOutcome::Cancelled,
            Opening::Opened { round, track } => {
                info!(session = %slot.key(), round, track = %track.track_id, "round started");
                announce(
                    state,
                    slot.key(),
                    Announcement::RoundStarted {
                        round,
                        rounds,
                        track,
                        window: config.guess_window,
                    },
                )
                .await;
            }
        }
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => return RoundOutcome::Cancelled,
        _ = sleep(config.guess_window) => {}
    }

    let _gate = slot.lock_transitions().await;
    let Some(settled) = slot.write(|session| settle(session, token)).await else {
        return RoundOutcome::Cancelled;
    };

    announce(
        state,
        slot.key(),
        Announcement::RoundSettled {
            round: settled.round,
            track: settled.track.clone(),
            winners: settled.winners.clone(),
        },
    )
    .await;

    RoundOutcome::Settled(settled)
}

/// Spawn a round loop for `slot`, cancelling whichever loop it replaces.
pub fn spawn_round_loop(state: &SharedState, slot: &Arc<SessionSlot>) -> Uuid {
    let handle = RoundHandle::new();
    let id = handle.id;
    slot.install_round(handle.clone());
    tokio::spawn(run_round_loop(state.clone(), slot.clone(), handle));
    id
}

async fn run_round_loop(state: SharedState, slot: Arc<SessionSlot>, handle: RoundHandle) {
    let RoundHandle { id, token } = handle;
    debug!(session = %slot.key(), round_loop = %id, "round loop started");

    loop {
        match run_round(&state, &slot, &token).await {
            RoundOutcome::Settled(settled) => {
                debug!(
                    session = %slot.key(),
                    round = settled.round,
                    winners = settled.winners.len(),
                    "round settled"
                );
            }
            RoundOutcome::Cancelled => {
                debug!(session = %slot.key(), round_loop = %id, "round loop cancelled");
                break;
            }
            RoundOutcome::Exhausted => {
                let _gate = slot.lock_transitions().await;
                if token.is_cancelled() {
                    break;
                }
                if let Err(err) =
                    game_service::finish_session(&state, &slot, FinishReason::Completed).await
                {
                    warn!(session = %slot.key(), error = %err, "failed to finish exhausted game");
                }
                break;
            }
        }
    }

    slot.release_round(id);
}
