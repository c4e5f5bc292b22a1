use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No game is running for this key.
    Idle,
    /// A game was started and players can join.
    Collecting,
    /// A round is in progress and its guessing window is open.
    RoundActive,
    /// The guessing window closed and the outcome is being computed.
    RoundSettling,
    /// The game is over; the session is about to be replaced by a fresh one.
    Finished,
}

impl SessionPhase {
    /// Whether the round loop owns this phase.
    pub fn is_in_round(self) -> bool {
        matches!(self, SessionPhase::RoundActive | SessionPhase::RoundSettling)
    }
}

/// Indicates why a game transitioned to its final scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The pool ran out or the round cap was reached.
    Completed,
    /// A player ended the game early.
    EndedEarly,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Open a new game so players can join.
    Start,
    /// Build a pool and (re)start the round loop.
    Play,
    /// The guessing window of the current round closed.
    CloseWindow,
    /// The next round opened its guessing window.
    OpenWindow,
    /// Show the final scoreboard.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    #[error("another transition is already pending")]
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// Lifecycle of a single session.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            version: 0,
            pending: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether a planned transition is waiting to be applied or aborted.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and immediately apply a transition that needs no side work.
    pub fn fire(&mut self, event: SessionEvent) -> Result<SessionPhase, PlanError> {
        let plan = self.plan(event)?;
        // The plan was created just above with no intervening mutation.
        self.apply(plan.id).map_err(|_| PlanError::AlreadyPending)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        use SessionPhase::*;

        let next = match (self.phase, event) {
            (Idle, SessionEvent::Start) => Collecting,
            (Collecting | RoundActive | RoundSettling, SessionEvent::Play) => RoundActive,
            (RoundActive, SessionEvent::CloseWindow) => RoundSettling,
            (RoundSettling, SessionEvent::OpenWindow) => RoundActive,
            (Collecting | RoundActive | RoundSettling, SessionEvent::Finish(..)) => Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn plan_records_when_it_became_pending() {
        let before = Instant::now();
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::Start).unwrap();

        assert!(plan.pending_since >= before);
        assert!(plan.pending_since <= Instant::now());
        assert_eq!(sm.snapshot().pending, Some(SessionPhase::Collecting));
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Idle);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(apply(&mut sm, SessionEvent::Start), SessionPhase::Collecting);
        assert_eq!(apply(&mut sm, SessionEvent::Play), SessionPhase::RoundActive);
        assert_eq!(
            apply(&mut sm, SessionEvent::CloseWindow),
            SessionPhase::RoundSettling
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::OpenWindow),
            SessionPhase::RoundActive
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::CloseWindow),
            SessionPhase::RoundSettling
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Finish(FinishReason::Completed)),
            SessionPhase::Finished
        );
        assert_eq!(sm.snapshot().version, 6);
    }

    #[test]
    fn play_can_reroll_from_any_round_phase() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Play);
        assert_eq!(apply(&mut sm, SessionEvent::Play), SessionPhase::RoundActive);
        apply(&mut sm, SessionEvent::CloseWindow);
        assert_eq!(apply(&mut sm, SessionEvent::Play), SessionPhase::RoundActive);
    }

    #[test]
    fn start_is_rejected_once_a_game_exists() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);

        let err = sm.plan(SessionEvent::Start).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidTransition(InvalidTransition {
                from: SessionPhase::Collecting,
                event: SessionEvent::Start,
            })
        );
    }

    #[test]
    fn finished_session_accepts_nothing() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Finish(FinishReason::EndedEarly));

        for event in [
            SessionEvent::Start,
            SessionEvent::Play,
            SessionEvent::OpenWindow,
            SessionEvent::Finish(FinishReason::EndedEarly),
        ] {
            assert!(matches!(
                sm.plan(event),
                Err(PlanError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionStateMachine::new();
        let err = sm.plan(SessionEvent::CloseWindow).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SessionPhase::Idle);
                assert_eq!(invalid.event, SessionEvent::CloseWindow);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pending_plan_blocks_other_transitions() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        let plan = sm.plan(SessionEvent::Play).unwrap();

        assert_eq!(
            sm.plan(SessionEvent::Finish(FinishReason::EndedEarly))
                .unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(
            sm.fire(SessionEvent::Finish(FinishReason::EndedEarly)),
            Err(PlanError::AlreadyPending)
        );

        sm.abort(plan.id).unwrap();
        assert_eq!(sm.phase(), SessionPhase::Collecting);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::Start).unwrap();

        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert!(sm.has_pending());
        assert_eq!(sm.apply(plan.id).unwrap(), SessionPhase::Collecting);
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.abort(plan.id), Err(AbortError::NoPending));
    }
}
