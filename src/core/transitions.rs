use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::models::{Decision, Match, MatchStatus, ResponseState, Side};

/// Events that move a match through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Make the match visible to the counterpart
    Activate,
    /// One side answers a pending match
    Respond { side: Side, decision: Decision },
    /// One side ends an accepted match
    BreakUp,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Activate => "activate",
            LifecycleEvent::Respond { decision: Decision::Accepted, .. } => "respond(accept)",
            LifecycleEvent::Respond { decision: Decision::Rejected, .. } => "respond(reject)",
            LifecycleEvent::BreakUp => "break_up",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event arrived while the match was in a status that does not admit it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} a match in status {from}")]
pub struct InvalidTransition {
    pub from: MatchStatus,
    pub event: LifecycleEvent,
}

/// The part of a match the state machine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: MatchStatus,
    pub initiator_response: ResponseState,
    pub counterpart_response: ResponseState,
}

impl LifecycleState {
    pub fn of(m: &Match) -> Self {
        Self {
            status: m.status,
            initiator_response: m.initiator_response,
            counterpart_response: m.counterpart_response,
        }
    }

    fn with_response(mut self, side: Side, response: ResponseState) -> Self {
        match side {
            Side::Initiator => self.initiator_response = response,
            Side::Counterpart => self.counterpart_response = response,
        }
        self
    }

    fn both_accepted(&self) -> bool {
        self.initiator_response == ResponseState::Accepted
            && self.counterpart_response == ResponseState::Accepted
    }
}

/// Apply `event` to `state`.
///
/// | event           | from               | to                                  |
/// |-----------------|--------------------|-------------------------------------|
/// | activate        | BACKLOG, PREPARING | PENDING                             |
/// | respond(accept) | PENDING            | PENDING, or ACCEPTED once both did  |
/// | respond(reject) | PENDING            | REJECTED                            |
/// | break_up        | ACCEPTED           | BROKEN_UP                           |
///
/// Anything else is an [`InvalidTransition`]. A single rejection is final;
/// acceptance needs both sides.
pub fn transition(
    state: LifecycleState,
    event: LifecycleEvent,
) -> Result<LifecycleState, InvalidTransition> {
    let invalid = InvalidTransition {
        from: state.status,
        event,
    };

    match (state.status, event) {
        (MatchStatus::Backlog | MatchStatus::Preparing, LifecycleEvent::Activate) => {
            Ok(LifecycleState {
                status: MatchStatus::Pending,
                ..state
            })
        }
        (MatchStatus::Pending, LifecycleEvent::Respond { side, decision }) => {
            let mut next = state.with_response(side, decision.into());
            next.status = match decision {
                Decision::Rejected => MatchStatus::Rejected,
                Decision::Accepted if next.both_accepted() => MatchStatus::Accepted,
                Decision::Accepted => MatchStatus::Pending,
            };
            Ok(next)
        }
        (MatchStatus::Accepted, LifecycleEvent::BreakUp) => Ok(LifecycleState {
            status: MatchStatus::BrokenUp,
            ..state
        }),
        _ => Err(invalid),
    }
}

/// Produce the next row for `current` after `event`, stamped at `now`.
///
/// The returned match carries a bumped version; `current` is untouched.
pub fn advance(
    current: &Match,
    event: LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<Match, InvalidTransition> {
    let next = transition(LifecycleState::of(current), event)?;

    let mut updated = current.clone();
    updated.initiator_response = next.initiator_response;
    updated.counterpart_response = next.counterpart_response;
    if next.status != current.status {
        updated.status = next.status;
        updated.status_changed_at = now;
    }
    updated.version = current.version + 1;

    Ok(updated)
}
