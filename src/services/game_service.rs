use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use crate::{
    dto::session::{
        ActionResponse, GuessResponse, JoinResponse, PlayResponse, ScoreboardResponse,
        SessionSnapshot,
    },
    error::ServiceError,
    services::{
        announcer::{Announcement, announce},
        pool_builder::{BuiltPool, build_pool},
        round_service::{record_guess, rounds_for, spawn_round_loop},
        scoreboard::{self, Scoreboard},
    },
    state::{
        SharedState,
        game::{ParticipantId, PoolMode, Session, SessionKey},
        session::SessionSlot,
        state_machine::{FinishReason, SessionEvent, SessionPhase},
        transitions::run_transition_with_announcement,
    },
};

/// Open a new game for `key` so players can join.
pub async fn start_session(
    state: &SharedState,
    key: &SessionKey,
) -> Result<ActionResponse, ServiceError> {
    let (slot, _gate) = lock_current(state, key).await;
    if slot.phase().await != SessionPhase::Idle {
        return Err(ServiceError::InvalidState(
            "a game is already in progress".into(),
        ));
    }

    run_transition_with_announcement(
        state,
        &slot,
        SessionEvent::Start,
        |_| Announcement::SessionStarted,
        || async { Ok(()) },
    )
    .await?;

    info!(session = %key, "game started");
    Ok(ActionResponse::new("Game started! Players can now join."))
}

/// Add `participant` to the game collecting players under `key`.
pub async fn join_session(
    state: &SharedState,
    key: &SessionKey,
    participant: ParticipantId,
) -> Result<JoinResponse, ServiceError> {
    let (slot, _gate) = lock_current(state, key).await;
    slot.write(|session| match session.machine.phase() {
        SessionPhase::Collecting => {
            if session.participants.insert(participant.clone()) {
                Ok(())
            } else {
                Err(ServiceError::InvalidState(format!(
                    "{participant} already joined this game"
                )))
            }
        }
        SessionPhase::Idle | SessionPhase::Finished => Err(ServiceError::InvalidState(
            "no game is accepting players; start one first".into(),
        )),
        SessionPhase::RoundActive | SessionPhase::RoundSettling => Err(
            ServiceError::InvalidState("the game already started".into()),
        ),
    })
    .await?;

    let (authorize_url, authorized) = match state.track_source() {
        Some(source) => (
            source.authorize_url(&participant),
            source.is_authorized(&participant).await,
        ),
        None => (None, false),
    };

    info!(session = %key, participant = %participant, authorized, "participant joined");
    announce(
        state,
        key,
        Announcement::PlayerJoined {
            participant: participant.clone(),
            authorize_url: authorize_url.clone(),
        },
    )
    .await;

    Ok(JoinResponse {
        participant,
        authorize_url,
        authorized,
    })
}

/// Build a pool from every participant's listening and (re)start the round loop.
///
/// Issued during a round, the in-flight round is cancelled before the new pool replaces the
/// old one.
pub async fn play(
    state: &SharedState,
    key: &SessionKey,
    mode: PoolMode,
) -> Result<PlayResponse, ServiceError> {
    let config = state.config();
    let (slot, _gate) = lock_current(state, key).await;

    let (participants, previous) = slot
        .read(|session| {
            let phase = session.machine.phase();
            if !matches!(
                phase,
                SessionPhase::Collecting | SessionPhase::RoundActive | SessionPhase::RoundSettling
            ) {
                return Err(ServiceError::InvalidState(
                    "no game in progress; start one first".into(),
                ));
            }
            if session.participants.len() < config.min_participants {
                return Err(ServiceError::InvalidState(format!(
                    "at least {} players must join before playing",
                    config.min_participants
                )));
            }
            Ok((session.participants.iter().cloned().collect::<Vec<_>>(), phase))
        })
        .await?;

    if slot.cancel_round() {
        info!(session = %key, "cancelled in-flight round for a new pool");
    }
    slot.write(|session| {
        session.open_round = None;
        session.current_guesses.clear();
    })
    .await;

    let source = state.track_source();
    let limit = config.tracks_per_participant;
    let result = run_transition_with_announcement(
        state,
        &slot,
        SessionEvent::Play,
        |pool: &BuiltPool| Announcement::PoolReady {
            mode,
            tracks: pool.entries.len(),
            rounds: rounds_for(pool.entries.len(), config.round_cap),
            contributors: pool.contributors.clone(),
        },
        || async move { Ok(build_pool(&participants, source, mode, limit).await) },
    )
    .await;

    let pool = match result {
        Ok(pool) => pool,
        Err(err) => {
            if previous.is_in_round() {
                warn!(session = %key, error = %err, "new pool failed; resuming the previous one");
                spawn_round_loop(state, &slot);
            }
            return Err(err);
        }
    };

    let response = PlayResponse {
        mode,
        tracks: pool.entries.len(),
        rounds: rounds_for(pool.entries.len(), config.round_cap),
        contributors: pool.contributors,
    };
    slot.write(|session| session.load_pool(pool.entries, mode))
        .await;
    spawn_round_loop(state, &slot);

    info!(
        session = %key,
        ?mode,
        tracks = response.tracks,
        contributors = response.contributors.len(),
        "pool ready"
    );
    Ok(response)
}

/// Record `guesser`'s guess that `target` owns the current track.
pub async fn guess(
    state: &SharedState,
    key: &SessionKey,
    guesser: ParticipantId,
    target: ParticipantId,
) -> Result<GuessResponse, ServiceError> {
    let slot = state.registry().get(key).ok_or_else(no_game)?;
    let round = slot
        .write(|session| record_guess(session, guesser.clone(), target))
        .await?;

    info!(session = %key, participant = %guesser, round, "guess recorded");
    Ok(GuessResponse {
        round,
        message: format!("Guess recorded for round {round}."),
    })
}

/// Stop the game under `key` early and return its final scoreboard.
pub async fn end_session(
    state: &SharedState,
    key: &SessionKey,
) -> Result<ScoreboardResponse, ServiceError> {
    let (slot, _gate) = lock_current(state, key).await;
    if !matches!(
        slot.phase().await,
        SessionPhase::Collecting | SessionPhase::RoundActive | SessionPhase::RoundSettling
    ) {
        return Err(no_game());
    }

    slot.cancel_round();
    let scoreboard = finish_session(state, &slot, FinishReason::EndedEarly).await?;
    Ok(ScoreboardResponse::new(FinishReason::EndedEarly, &scoreboard))
}

/// Read-only view of the session under `key`; unknown keys look idle.
pub async fn session_snapshot(state: &SharedState, key: &SessionKey) -> SessionSnapshot {
    match state.registry().get(key) {
        Some(slot) => {
            slot.read(|session| SessionSnapshot::new(session, &scoreboard::finalize(session)))
                .await
        }
        None => {
            let session = Session::new(key.clone());
            SessionSnapshot::new(&session, &scoreboard::finalize(&session))
        }
    }
}

/// Move `slot` to `Finished`, announce the scoreboard and replace the session with a fresh one.
///
/// The caller must hold the slot's transition gate.
pub(crate) async fn finish_session(
    state: &SharedState,
    slot: &Arc<SessionSlot>,
    reason: FinishReason,
) -> Result<Scoreboard, ServiceError> {
    let scoreboard = slot
        .write(|session| -> Result<Scoreboard, ServiceError> {
            session.machine.fire(SessionEvent::Finish(reason))?;
            session.open_round = None;
            Ok(scoreboard::finalize(session))
        })
        .await?;

    info!(session = %slot.key(), ?reason, headline = %scoreboard.headline(), "game finished");
    announce(
        state,
        slot.key(),
        Announcement::GameFinished {
            reason,
            scoreboard: scoreboard.clone(),
        },
    )
    .await;
    state.registry().reset(slot);

    Ok(scoreboard)
}

/// Current session of `key` with its transition gate held.
///
/// A session replaced while we waited on its gate is skipped in favour of its successor.
async fn lock_current(
    state: &SharedState,
    key: &SessionKey,
) -> (Arc<SessionSlot>, OwnedMutexGuard<()>) {
    loop {
        let slot = state.registry().get_or_create(key);
        let gate = slot.lock_transitions().await;
        if state.registry().is_current(&slot) {
            return (slot, gate);
        }
    }
}

fn no_game() -> ServiceError {
    ServiceError::InvalidState("no game in progress".into())
}
