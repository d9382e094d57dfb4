use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Why a session ended. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The host left the listening context.
    HostLeft,
    /// No entries left to play.
    PlaylistExhausted,
    /// Someone reached the point goal.
    GoalMet,
    /// The track-count limit was reached.
    LimitReached,
    /// The room's text surface was deleted; nothing can be announced any more.
    ContextDestroyed,
    /// The whole hosting context became unreachable; nothing is persisted.
    ContextInaccessible,
    /// Manual stop or any other reason.
    Other,
}

impl EndReason {
    /// Whether summaries can still be delivered to the room.
    pub fn announces(self) -> bool {
        !matches!(self, EndReason::ContextDestroyed | EndReason::ContextInaccessible)
    }

    /// Whether final awards are written to the member store.
    pub fn persists(self) -> bool {
        self != EndReason::ContextInaccessible
    }
}

/// Where a running session currently is inside its round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Competitive opt-in period before the first track.
    Joining,
    /// The next track is being resolved and started.
    Loading,
    /// A round is open and accepts guesses.
    Open,
}

/// Lifecycle of a session: `Created -> Active -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Built but not started yet.
    Created,
    /// Started; rounds are being played.
    Active(RoundPhase),
    /// Terminal.
    Ended(EndReason),
}

/// Events that can be applied to the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Competitive sessions wait for participants first.
    OpenJoinWindow,
    /// Request the next track.
    LoadTrack,
    /// A track started playing and its round is open.
    RoundOpened,
    /// Terminate the session.
    Finish(EndReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the lifecycle was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    #[error("a transition is already pending")]
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Errors that can occur when applying or aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No transition is currently pending.
    #[error("no transition pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("plan {got} does not match pending plan {expected}")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the lifecycle is currently in.
    pub from: SessionPhase,
    /// Phase the lifecycle will move to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
}

/// Session lifecycle with two-step (plan, then apply or abort) transitions.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    phase: SessionPhase,
    pending: Option<Plan>,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Created,
            pending: None,
        }
    }
}

impl SessionLifecycle {
    /// New lifecycle in [`SessionPhase::Created`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the terminal phase was reached.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, SessionPhase::Ended(_))
    }

    /// Validate an event and remember it as pending.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self.compute_transition(event)?;
        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
        };
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        self.phase = plan.to;
        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), ApplyError> {
        let plan = self.pending.as_ref().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            return Err(ApplyError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and immediately apply an event.
    pub fn transition(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        // No plan can be pending here: every caller holds the session gate.
        let next = self.compute_transition(event)?;
        self.pending = None;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Created, SessionEvent::OpenJoinWindow) => {
                SessionPhase::Active(RoundPhase::Joining)
            }
            (SessionPhase::Created, SessionEvent::LoadTrack) => {
                SessionPhase::Active(RoundPhase::Loading)
            }
            (SessionPhase::Active(RoundPhase::Joining | RoundPhase::Open), SessionEvent::LoadTrack) => {
                SessionPhase::Active(RoundPhase::Loading)
            }
            (SessionPhase::Active(RoundPhase::Loading), SessionEvent::RoundOpened) => {
                SessionPhase::Active(RoundPhase::Open)
            }
            (SessionPhase::Created | SessionPhase::Active(_), SessionEvent::Finish(reason)) => {
                SessionPhase::Ended(reason)
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
