use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Backlog,
    Preparing,
    Pending,
    Accepted,
    Rejected,
    BrokenUp,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 6] = [
        MatchStatus::Backlog,
        MatchStatus::Preparing,
        MatchStatus::Pending,
        MatchStatus::Accepted,
        MatchStatus::Rejected,
        MatchStatus::BrokenUp,
    ];

    /// Terminal statuses end the response flow. `Accepted` still admits a break-up.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchStatus::Accepted | MatchStatus::Rejected | MatchStatus::BrokenUp
        )
    }

    /// Statuses a match may be created in
    pub fn is_initial(self) -> bool {
        matches!(self, MatchStatus::Backlog | MatchStatus::Preparing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Backlog => "BACKLOG",
            MatchStatus::Preparing => "PREPARING",
            MatchStatus::Pending => "PENDING",
            MatchStatus::Accepted => "ACCEPTED",
            MatchStatus::Rejected => "REJECTED",
            MatchStatus::BrokenUp => "BROKEN_UP",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown match status: {}", s))
    }
}

/// One side's answer to a pending match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseState {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// A final answer a member can give; there is no way to answer "pending"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for ResponseState {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Accepted => ResponseState::Accepted,
            Decision::Rejected => ResponseState::Rejected,
        }
    }
}

/// Which participant of a match an actor is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Counterpart,
}

/// A proposed or active pairing between two members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub status: MatchStatus,
    #[serde(rename = "initiatorId")]
    pub initiator_id: Uuid,
    #[serde(rename = "counterpartId")]
    pub counterpart_id: Uuid,
    #[serde(rename = "initiatorResponse")]
    pub initiator_response: ResponseState,
    #[serde(rename = "counterpartResponse")]
    pub counterpart_response: ResponseState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "statusChangedAt")]
    pub status_changed_at: DateTime<Utc>,
    #[serde(rename = "notifiedAt")]
    pub notified_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Match {
    /// Build a fresh match row. Does not validate the initial status.
    pub fn new(initiator_id: Uuid, counterpart_id: Uuid, status: MatchStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status,
            initiator_id,
            counterpart_id,
            initiator_response: ResponseState::Pending,
            counterpart_response: ResponseState::Pending,
            created_at: now,
            status_changed_at: now,
            notified_at: None,
            version: 1,
        }
    }

    /// Resolve which side `member_id` is on, if any
    pub fn side_of(&self, member_id: Uuid) -> Option<Side> {
        if member_id == self.initiator_id {
            Some(Side::Initiator)
        } else if member_id == self.counterpart_id {
            Some(Side::Counterpart)
        } else {
            None
        }
    }
}

/// Eligibility status of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// The slice of a member record the lifecycle reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    #[serde(rename = "heartsLeft")]
    pub hearts_left: i32,
    #[serde(rename = "memberStatus")]
    pub status: MemberStatus,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Parameters for creating a match
#[derive(Debug, Clone, Copy)]
pub struct NewMatch {
    pub initiator_id: Uuid,
    pub counterpart_id: Uuid,
    pub initial_status: MatchStatus,
    /// Whether the initiator pays hearts for this match
    pub spend_heart: bool,
}

/// Outbound message handed to a notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    pub kind: NotificationKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewPendingMatch,
}

impl Notification {
    pub fn pending_match(m: &Match) -> Self {
        Self {
            match_id: m.id,
            kind: NotificationKind::NewPendingMatch,
            text: format!("You have a new match waiting for your answer ({})", m.id),
        }
    }
}

/// Outcome of a bulk notification sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkNotifyReport {
    pub scanned: usize,
    pub notified: usize,
    pub failed: usize,
}
