use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Match, MatchStatus, Member};

/// Errors that can occur when reading or writing matches
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient credit: member {member_id} has {hearts_left} hearts, {requested} requested")]
    InsufficientCredit {
        member_id: Uuid,
        hearts_left: i32,
        requested: i32,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyset position for paging through unnotified pending matches
pub type PendingCursor = (DateTime<Utc>, Uuid);

/// Durable storage for matches and the member fields the lifecycle touches.
///
/// Every mutation of a match or a member's hearts goes through a
/// [`StoreTransaction`]; the methods here are reads plus the notification
/// bookkeeping, which is not part of the lifecycle state.
#[async_trait]
pub trait MatchStore: Send + Sync {
    type Tx: StoreTransaction;

    /// Open a transaction. Dropping it without `commit` discards its writes.
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Whether the member exists and may take part in new matches
    async fn is_active(&self, member_id: Uuid) -> StoreResult<bool>;

    async fn find_match(&self, match_id: Uuid) -> StoreResult<Option<Match>>;

    /// Matches the member is on either side of, newest first
    async fn matches_for_member(
        &self,
        member_id: Uuid,
        status: Option<MatchStatus>,
    ) -> StoreResult<Vec<Match>>;

    /// Pending matches whose counterpart was never notified, oldest first,
    /// strictly after `after`
    async fn pending_unnotified(
        &self,
        after: Option<PendingCursor>,
        limit: usize,
    ) -> StoreResult<Vec<Match>>;

    /// Stamp `notified_at` on a match that is still pending.
    ///
    /// Returns `false` when the match has moved on or does not exist.
    async fn mark_notified(&self, match_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<bool>;
}

/// A unit of work against the store. Reads lock the rows they return until
/// the transaction ends.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_match(&mut self, match_id: Uuid) -> StoreResult<Match>;

    async fn get_member(&mut self, member_id: Uuid) -> StoreResult<Member>;

    async fn create_match(&mut self, m: &Match) -> StoreResult<()>;

    /// Write `updated` over the stored row.
    ///
    /// Fails with [`StoreError::Conflict`] unless the stored row still has
    /// `expected` status and the version just before `updated.version`.
    async fn update_match(&mut self, updated: &Match, expected: MatchStatus) -> StoreResult<()>;

    /// Take `amount` hearts from the member, returning what is left
    async fn decrement_hearts(&mut self, member_id: Uuid, amount: i32) -> StoreResult<i32>;

    async fn commit(self) -> StoreResult<()>;
}
