use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{Match, MatchStatus, Member, MemberStatus};
use crate::services::store::{MatchStore, PendingCursor, StoreError, StoreResult, StoreTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    matches: HashMap<Uuid, Match>,
    members: HashMap<Uuid, Member>,
}

/// In-process store for tests and local development.
///
/// A transaction holds the single state lock for its whole lifetime, so
/// transactions are fully serialized. Writes are staged and only applied on
/// commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member record
    pub async fn upsert_member(&self, member: Member) {
        self.state.lock().await.members.insert(member.id, member);
    }

    /// Convenience for seeding an active member with `hearts` hearts
    pub async fn add_member(&self, hearts: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.upsert_member(Member {
            id,
            hearts_left: hearts,
            status: MemberStatus::Active,
        })
        .await;
        id
    }

    pub async fn member(&self, member_id: Uuid) -> Option<Member> {
        self.state.lock().await.members.get(&member_id).cloned()
    }

    pub async fn match_count(&self) -> usize {
        self.state.lock().await.matches.len()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(MemoryTransaction {
            guard,
            staged_matches: HashMap::new(),
            staged_members: HashMap::new(),
        })
    }

    async fn is_active(&self, member_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .members
            .get(&member_id)
            .map(Member::is_active)
            .unwrap_or(false))
    }

    async fn find_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        Ok(self.state.lock().await.matches.get(&match_id).cloned())
    }

    async fn matches_for_member(
        &self,
        member_id: Uuid,
        status: Option<MatchStatus>,
    ) -> StoreResult<Vec<Match>> {
        let state = self.state.lock().await;
        let mut found: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.initiator_id == member_id || m.counterpart_id == member_id)
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn pending_unnotified(
        &self,
        after: Option<PendingCursor>,
        limit: usize,
    ) -> StoreResult<Vec<Match>> {
        let state = self.state.lock().await;
        let mut found: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Pending && m.notified_at.is_none())
            .filter(|m| after.map_or(true, |cursor| (m.created_at, m.id) > cursor))
            .cloned()
            .collect();

        found.sort_by_key(|m| (m.created_at, m.id));
        found.truncate(limit);
        Ok(found)
    }

    async fn mark_notified(&self, match_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.matches.get_mut(&match_id) {
            Some(m) if m.status == MatchStatus::Pending => {
                m.notified_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged_matches: HashMap<Uuid, Match>,
    staged_members: HashMap<Uuid, Member>,
}

impl MemoryTransaction {
    fn current_match(&self, match_id: Uuid) -> Option<&Match> {
        self.staged_matches
            .get(&match_id)
            .or_else(|| self.guard.matches.get(&match_id))
    }

    fn current_member(&self, member_id: Uuid) -> Option<&Member> {
        self.staged_members
            .get(&member_id)
            .or_else(|| self.guard.members.get(&member_id))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get_match(&mut self, match_id: Uuid) -> StoreResult<Match> {
        self.current_match(match_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))
    }

    async fn get_member(&mut self, member_id: Uuid) -> StoreResult<Member> {
        self.current_member(member_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("member {}", member_id)))
    }

    async fn create_match(&mut self, m: &Match) -> StoreResult<()> {
        if self.current_match(m.id).is_some() {
            return Err(StoreError::Conflict(format!("match {} already exists", m.id)));
        }
        self.staged_matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn update_match(&mut self, updated: &Match, expected: MatchStatus) -> StoreResult<()> {
        let stored = self
            .current_match(updated.id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", updated.id)))?;

        if stored.status != expected || stored.version != updated.version - 1 {
            return Err(StoreError::Conflict(format!(
                "match {} is {} at version {}",
                updated.id, stored.status, stored.version
            )));
        }

        self.staged_matches.insert(updated.id, updated.clone());
        Ok(())
    }

    async fn decrement_hearts(&mut self, member_id: Uuid, amount: i32) -> StoreResult<i32> {
        if amount < 0 {
            return Err(StoreError::InvalidInput(format!("negative heart amount {}", amount)));
        }

        let mut member = self.get_member(member_id).await?;
        if member.hearts_left < amount {
            return Err(StoreError::InsufficientCredit {
                member_id,
                hearts_left: member.hearts_left,
                requested: amount,
            });
        }

        member.hearts_left -= amount;
        let remaining = member.hearts_left;
        self.staged_members.insert(member_id, member);
        Ok(remaining)
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard,
            staged_matches,
            staged_members,
        } = self;

        guard.matches.extend(staged_matches);
        guard.members.extend(staged_members);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let a = store.add_member(3).await;
        let b = store.add_member(0).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrement_hearts(a, 1).await.unwrap();
            tx.create_match(&Match::new(a, b, MatchStatus::Backlog))
                .await
                .unwrap();
        }

        assert_eq!(store.match_count().await, 0);
        assert_eq!(store.member(a).await.unwrap().hearts_left, 3);
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let store = MemoryStore::new();
        let a = store.add_member(3).await;
        let b = store.add_member(0).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.decrement_hearts(a, 2).await.unwrap(), 1);
        tx.create_match(&Match::new(a, b, MatchStatus::Backlog))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.match_count().await, 1);
        assert_eq!(store.member(a).await.unwrap().hearts_left, 1);
    }

    #[tokio::test]
    async fn test_decrement_below_zero_is_insufficient_credit() {
        let store = MemoryStore::new();
        let a = store.add_member(0).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.decrement_hearts(a, 1).await.unwrap_err();

        assert!(matches!(err, StoreError::InsufficientCredit { hearts_left: 0, .. }));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let m = Match::new(Uuid::new_v4(), Uuid::new_v4(), MatchStatus::Preparing);

        let mut tx = store.begin().await.unwrap();
        tx.create_match(&m).await.unwrap();

        let mut stale = m.clone();
        stale.status = MatchStatus::Pending;
        stale.version = m.version + 5;

        let err = tx.update_match(&stale, MatchStatus::Preparing).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mark_notified_ignores_non_pending() {
        let store = MemoryStore::new();
        let m = Match::new(Uuid::new_v4(), Uuid::new_v4(), MatchStatus::Backlog);

        let mut tx = store.begin().await.unwrap();
        tx.create_match(&m).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!store.mark_notified(m.id, Utc::now()).await.unwrap());
        assert!(!store.mark_notified(Uuid::new_v4(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_member_is_not_active() {
        let store = MemoryStore::new();
        assert!(!store.is_active(Uuid::new_v4()).await.unwrap());
    }
}
