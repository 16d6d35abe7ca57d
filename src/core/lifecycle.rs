use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::error::LifecycleError;
use crate::core::transitions::{advance, LifecycleEvent};
use crate::models::{BulkNotifyReport, Decision, Match, MatchStatus, NewMatch, Notification};
use crate::services::{MatchStore, Notifier, NotifierError, StoreError, StoreTransaction};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Tunables for the lifecycle manager
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    /// Hearts taken from the initiator when a match is paid for
    pub heart_cost: i32,
    /// Upper bound on a single notifier call
    pub notify_timeout: Duration,
    /// Notifier calls in flight during a bulk sweep
    pub bulk_concurrency: usize,
    /// Rows fetched per page during a bulk sweep
    pub bulk_batch_size: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            heart_cost: 1,
            notify_timeout: Duration::from_millis(3000),
            bulk_concurrency: 8,
            bulk_batch_size: 500,
        }
    }
}

/// Single entry point for every match status change.
///
/// Each mutating operation is one store transaction: load and lock the row,
/// run the transition table, write the new row (and any heart decrement),
/// commit. Notifications are sent only after commit and never undo a
/// transition.
pub struct MatchLifecycleManager<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    settings: LifecycleSettings,
}

impl<S> Clone for MatchLifecycleManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            settings: self.settings,
        }
    }
}

impl<S: MatchStore> MatchLifecycleManager<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, settings: LifecycleSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Create a match in BACKLOG or PREPARING, charging the initiator's
    /// hearts when `spend_heart` is set
    #[instrument(skip(self), fields(initiator = %new.initiator_id, counterpart = %new.counterpart_id))]
    pub async fn create_match(&self, new: NewMatch) -> LifecycleResult<Match> {
        if !new.initial_status.is_initial() {
            return Err(LifecycleError::InvalidInitialStatus(new.initial_status));
        }

        if new.initiator_id == new.counterpart_id {
            return Err(LifecycleError::IneligibleMember {
                member_id: new.counterpart_id,
                reason: "a member cannot be matched with themselves",
            });
        }

        let mut tx = self.store.begin().await?;

        // Lock both member rows in id order so concurrent creates cannot deadlock
        let mut members = [new.initiator_id, new.counterpart_id];
        members.sort();
        for member_id in members {
            let active = match tx.get_member(member_id).await {
                Ok(member) => member.is_active(),
                Err(StoreError::NotFound(_)) => false,
                Err(e) => return Err(e.into()),
            };
            if !active {
                return Err(LifecycleError::IneligibleMember {
                    member_id,
                    reason: "member is not active",
                });
            }
        }

        let created = Match::new(new.initiator_id, new.counterpart_id, new.initial_status);

        if new.spend_heart {
            let remaining = tx
                .decrement_hearts(new.initiator_id, self.settings.heart_cost)
                .await?;
            debug!(hearts_left = remaining, "Charged initiator for match");
        }
        tx.create_match(&created).await?;
        tx.commit().await?;

        info!(match_id = %created.id, status = %created.status, "Match created");

        Ok(created)
    }

    /// Move a BACKLOG or PREPARING match to PENDING and tell the counterpart
    #[instrument(skip(self))]
    pub async fn activate(&self, match_id: Uuid) -> LifecycleResult<Match> {
        let mut activated = self
            .apply(match_id, |_| Ok(LifecycleEvent::Activate))
            .await?;

        match self.notify_counterpart(&activated).await {
            Ok(Some(at)) => activated.notified_at = Some(at),
            Ok(None) => {}
            Err(e) => {
                warn!(match_id = %match_id, error = %e, "Counterpart notification failed, left for the sweep");
            }
        }

        Ok(activated)
    }

    /// Record one side's answer to a pending match
    #[instrument(skip(self))]
    pub async fn respond(
        &self,
        match_id: Uuid,
        member_id: Uuid,
        decision: Decision,
    ) -> LifecycleResult<Match> {
        self.apply(match_id, |current| {
            let side = current
                .side_of(member_id)
                .ok_or(LifecycleError::NotParticipant { match_id, member_id })?;
            Ok(LifecycleEvent::Respond { side, decision })
        })
        .await
    }

    /// End an accepted match at either side's request
    #[instrument(skip(self))]
    pub async fn break_up(&self, match_id: Uuid, requested_by: Uuid) -> LifecycleResult<Match> {
        self.apply(match_id, |current| {
            current
                .side_of(requested_by)
                .ok_or(LifecycleError::NotParticipant {
                    match_id,
                    member_id: requested_by,
                })?;
            Ok(LifecycleEvent::BreakUp)
        })
        .await
    }

    /// Notify the counterpart of every pending match that has not been
    /// notified yet. Failures are counted and skipped.
    #[instrument(skip(self))]
    pub async fn bulk_notify_pending(&self) -> LifecycleResult<BulkNotifyReport> {
        let mut report = BulkNotifyReport::default();
        let mut cursor = None;
        let batch_size = self.settings.bulk_batch_size.max(1);
        let concurrency = self.settings.bulk_concurrency.max(1);

        loop {
            let batch = self.store.pending_unnotified(cursor, batch_size).await?;
            let fetched = batch.len();
            if let Some(last) = batch.last() {
                cursor = Some((last.created_at, last.id));
            }
            report.scanned += fetched;

            let outcomes: Vec<bool> = stream::iter(batch)
                .map(|m| async move {
                    match self.notify_counterpart(&m).await {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(match_id = %m.id, member_id = %m.counterpart_id, error = %e, "Skipping failed notification");
                            false
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            let delivered = outcomes.iter().filter(|ok| **ok).count();
            report.notified += delivered;
            report.failed += outcomes.len() - delivered;

            if fetched < batch_size {
                break;
            }
        }

        info!(
            scanned = report.scanned,
            notified = report.notified,
            failed = report.failed,
            "Bulk notification sweep finished"
        );

        Ok(report)
    }

    pub async fn get_match(&self, match_id: Uuid) -> LifecycleResult<Match> {
        self.store
            .find_match(match_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("match {}", match_id)))
    }

    pub async fn list_matches_for_member(
        &self,
        member_id: Uuid,
        status: Option<MatchStatus>,
    ) -> LifecycleResult<Vec<Match>> {
        Ok(self.store.matches_for_member(member_id, status).await?)
    }

    /// Run one transition inside a transaction. `event_for` sees the locked
    /// row and picks the event, or rejects the caller.
    async fn apply<F>(&self, match_id: Uuid, event_for: F) -> LifecycleResult<Match>
    where
        F: FnOnce(&Match) -> LifecycleResult<LifecycleEvent> + Send,
    {
        let mut tx = self.store.begin().await?;
        let current = tx.get_match(match_id).await?;
        let event = event_for(&current)?;
        let next = advance(&current, event, Utc::now())?;

        tx.update_match(&next, current.status).await?;
        tx.commit().await?;

        info!(
            match_id = %match_id,
            event = %event,
            from = %current.status,
            to = %next.status,
            "Match transitioned"
        );

        Ok(next)
    }

    /// Send the pending-match notification with a timeout, then stamp the
    /// row. `Ok(None)` means delivery worked but the stamp did not stick.
    async fn notify_counterpart(&self, m: &Match) -> Result<Option<DateTime<Utc>>, NotifierError> {
        let message = Notification::pending_match(m);
        let timeout = self.settings.notify_timeout;

        tokio::time::timeout(timeout, self.notifier.notify(m.counterpart_id, &message))
            .await
            .unwrap_or(Err(NotifierError::Timeout(timeout)))?;

        let now = Utc::now();
        match self.store.mark_notified(m.id, now).await {
            Ok(true) => Ok(Some(now)),
            Ok(false) => {
                debug!(match_id = %m.id, "Match left PENDING before it could be stamped");
                Ok(None)
            }
            Err(e) => {
                warn!(match_id = %m.id, error = %e, "Notification sent but not recorded");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{LogNotifier, MemoryStore};

    fn manager(store: &MemoryStore) -> MatchLifecycleManager<MemoryStore> {
        MatchLifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(LogNotifier),
            LifecycleSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_non_initial_status() {
        let store = MemoryStore::new();
        let a = store.add_member(1).await;
        let b = store.add_member(1).await;

        let err = manager(&store)
            .create_match(NewMatch {
                initiator_id: a,
                counterpart_id: b,
                initial_status: MatchStatus::Pending,
                spend_heart: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidInitialStatus(MatchStatus::Pending)));
        assert_eq!(store.match_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_self_match() {
        let store = MemoryStore::new();
        let a = store.add_member(1).await;

        let err = manager(&store)
            .create_match(NewMatch {
                initiator_id: a,
                counterpart_id: a,
                initial_status: MatchStatus::Backlog,
                spend_heart: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::IneligibleMember { .. }));
        assert_eq!(store.member(a).await.unwrap().hearts_left, 1);
    }

    #[tokio::test]
    async fn test_get_missing_match_is_not_found() {
        let store = MemoryStore::new();
        let err = manager(&store).get_match(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_activate_stamps_notified_at() {
        let store = MemoryStore::new();
        let a = store.add_member(0).await;
        let b = store.add_member(0).await;
        let manager = manager(&store);

        let created = manager
            .create_match(NewMatch {
                initiator_id: a,
                counterpart_id: b,
                initial_status: MatchStatus::Backlog,
                spend_heart: false,
            })
            .await
            .unwrap();

        let activated = manager.activate(created.id).await.unwrap();
        assert_eq!(activated.status, MatchStatus::Pending);
        assert!(activated.notified_at.is_some());

        let stored = manager.get_match(created.id).await.unwrap();
        assert_eq!(stored.notified_at, activated.notified_at);
    }
}
