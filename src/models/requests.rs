use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::domain::{Decision, MatchStatus};

/// Request to create a match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMatchRequest {
    #[serde(alias = "initiator_id", rename = "initiatorId")]
    pub initiator_id: Uuid,
    #[serde(alias = "counterpart_id", rename = "counterpartId")]
    pub counterpart_id: Uuid,
    #[validate(custom(function = "validate_initial_status"))]
    #[serde(alias = "initial_status", rename = "initialStatus", default = "default_initial_status")]
    pub initial_status: MatchStatus,
    #[serde(alias = "spend_heart", rename = "spendHeart", default)]
    pub spend_heart: bool,
}

fn default_initial_status() -> MatchStatus {
    MatchStatus::Preparing
}

fn validate_initial_status(status: &MatchStatus) -> Result<(), ValidationError> {
    if status.is_initial() {
        Ok(())
    } else {
        Err(ValidationError::new("initial_status_must_be_backlog_or_preparing"))
    }
}

/// Request to answer a pending match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    #[serde(alias = "member_id", rename = "memberId")]
    pub member_id: Uuid,
    pub decision: Decision,
}

/// Request to end an accepted match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakUpRequest {
    #[serde(alias = "member_id", rename = "memberId")]
    pub member_id: Uuid,
}

/// Query for a member's matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberMatchesQuery {
    #[serde(default)]
    pub status: Option<MatchStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let json = serde_json::json!({
            "initiatorId": Uuid::new_v4(),
            "counterpartId": Uuid::new_v4(),
        });
        let req: CreateMatchRequest = serde_json::from_value(json).unwrap();

        assert_eq!(req.initial_status, MatchStatus::Preparing);
        assert!(!req.spend_heart);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_non_initial_status() {
        let req = CreateMatchRequest {
            initiator_id: Uuid::new_v4(),
            counterpart_id: Uuid::new_v4(),
            initial_status: MatchStatus::Accepted,
            spend_heart: false,
        };

        assert!(req.validate().is_err());
    }

    #[test]
    fn test_respond_request_rejects_pending_decision() {
        let json = serde_json::json!({
            "memberId": Uuid::new_v4(),
            "decision": "PENDING",
        });

        assert!(serde_json::from_value::<RespondRequest>(json).is_err());
    }
}
