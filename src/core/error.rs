use thiserror::Error;
use uuid::Uuid;

use crate::core::transitions::InvalidTransition;
use crate::models::MatchStatus;
use crate::services::StoreError;

/// Errors returned by lifecycle operations. All of them are per-call
/// outcomes; none leaves partial state behind.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Matches must start in BACKLOG or PREPARING, not {0}")]
    InvalidInitialStatus(MatchStatus),

    #[error("Member {member_id} is not a participant of match {match_id}")]
    NotParticipant { match_id: Uuid, member_id: Uuid },

    #[error("Member {member_id} is ineligible: {reason}")]
    IneligibleMember { member_id: Uuid, reason: &'static str },

    #[error("Member {member_id} has {hearts_left} hearts left, {required} required")]
    InsufficientCredit {
        member_id: Uuid,
        hearts_left: i32,
        required: i32,
    },

    #[error("Concurrent modification, retry the operation: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => LifecycleError::NotFound(what),
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::InsufficientCredit {
                member_id,
                hearts_left,
                requested,
            } => LifecycleError::InsufficientCredit {
                member_id,
                hearts_left,
                required: requested,
            },
            other => LifecycleError::Store(other),
        }
    }
}

impl LifecycleError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInitialStatus(_) => 400,
            Self::InsufficientCredit { .. } => 402,
            Self::NotParticipant { .. } => 403,
            Self::NotFound(_) => 404,
            Self::InvalidTransition(_) | Self::Conflict(_) => 409,
            Self::IneligibleMember { .. } => 422,
            Self::Store(_) => 500,
        }
    }

    /// Machine-readable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidInitialStatus(_) => "invalid_initial_status",
            Self::NotParticipant { .. } => "not_participant",
            Self::IneligibleMember { .. } => "ineligible_member",
            Self::InsufficientCredit { .. } => "insufficient_credit",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store_error",
        }
    }

    /// Whether retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_lifecycle_kinds() {
        let err: LifecycleError = StoreError::Conflict("stale".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 409);

        let err: LifecycleError = StoreError::InsufficientCredit {
            member_id: Uuid::nil(),
            hearts_left: 0,
            requested: 1,
        }
        .into();
        assert_eq!(err.error_code(), "insufficient_credit");
        assert_eq!(err.status_code(), 402);

        let err: LifecycleError = StoreError::NotFound("match x".into()).into();
        assert_eq!(err.status_code(), 404);

        let err: LifecycleError = StoreError::InvalidInput("bad".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retryable());
    }
}
