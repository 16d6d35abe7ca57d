//! matchd - Match lifecycle service for the matchmaking platform
//!
//! Owns the state machine a match between two members moves through
//! (backlog, pending, accepted, ...), charges hearts atomically with match
//! creation, and notifies counterparts of new pending matches.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{LifecycleError, LifecycleEvent, LifecycleSettings, MatchLifecycleManager};
pub use models::{BulkNotifyReport, Decision, Match, MatchStatus, Member, MemberStatus, NewMatch, ResponseState};
pub use services::{MatchStore, MemoryStore, Notifier, PgMatchStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let next = crate::core::transition(
            crate::core::LifecycleState {
                status: MatchStatus::Backlog,
                initiator_response: ResponseState::Pending,
                counterpart_response: ResponseState::Pending,
            },
            LifecycleEvent::Activate,
        )
        .unwrap();
        assert_eq!(next.status, MatchStatus::Pending);
    }
}
