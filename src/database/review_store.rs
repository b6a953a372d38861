//! # Review Store
//!
//! Review-domain persistence: the append-only review history and the
//! pending-review projection built from review-request events.

use super::errors::StoreResult;
use super::outbox::{InMemoryOutbox, NewOutboxMessage, OutboxEntry, OutboxSource};
use crate::models::{PendingReview, ReviewRecord, WorkItemId};
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait ReviewStore: OutboxSource {
    /// Append a decision, clear the post's pending entry and enqueue the
    /// outbox message, atomically
    async fn append(
        &self,
        record: ReviewRecord,
        outbox: Option<NewOutboxMessage>,
    ) -> StoreResult<ReviewRecord>;

    /// Full history for a post, newest first
    async fn reviews_for_post(&self, post_id: WorkItemId) -> StoreResult<Vec<ReviewRecord>>;

    /// Insert or refresh a pending review; true when newly inserted.
    ///
    /// A refresh takes the incoming snapshot and review cycle but keeps the
    /// original `requested_at`.
    async fn upsert_pending(&self, pending: PendingReview) -> StoreResult<bool>;

    async fn pending_review(&self, post_id: WorkItemId) -> StoreResult<Option<PendingReview>>;

    /// Pending reviews, oldest request first
    async fn pending_reviews(&self) -> StoreResult<Vec<PendingReview>>;
}

#[derive(Debug, Default)]
pub struct InMemoryReviewStore {
    records: DashMap<WorkItemId, Vec<ReviewRecord>>,
    pending: DashMap<WorkItemId, PendingReview>,
    outbox: InMemoryOutbox,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> &InMemoryOutbox {
        &self.outbox
    }

    pub fn record_count(&self) -> usize {
        self.records.iter().map(|history| history.len()).sum()
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn append(
        &self,
        record: ReviewRecord,
        outbox: Option<NewOutboxMessage>,
    ) -> StoreResult<ReviewRecord> {
        let mut history = self.records.entry(record.post_id).or_default();
        history.push(record.clone());
        if let Some(message) = outbox {
            self.outbox.append(message);
        }
        self.pending.remove(&record.post_id);
        Ok(record)
    }

    async fn reviews_for_post(&self, post_id: WorkItemId) -> StoreResult<Vec<ReviewRecord>> {
        let mut history: Vec<ReviewRecord> = self
            .records
            .get(&post_id)
            .map(|history| history.iter().rev().cloned().collect())
            .unwrap_or_default();
        // Stable sort keeps later appends first among equal timestamps
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn upsert_pending(&self, pending: PendingReview) -> StoreResult<bool> {
        let mut inserted = false;
        self.pending
            .entry(pending.post_id)
            .and_modify(|existing| {
                existing.review_cycle = pending.review_cycle;
                existing.title.clone_from(&pending.title);
                existing.content.clone_from(&pending.content);
                existing.author.clone_from(&pending.author);
            })
            .or_insert_with(|| {
                inserted = true;
                pending.clone()
            });
        Ok(inserted)
    }

    async fn pending_review(&self, post_id: WorkItemId) -> StoreResult<Option<PendingReview>> {
        Ok(self.pending.get(&post_id).map(|entry| entry.clone()))
    }

    async fn pending_reviews(&self) -> StoreResult<Vec<PendingReview>> {
        let mut pending: Vec<PendingReview> =
            self.pending.iter().map(|entry| entry.clone()).collect();
        pending.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then(a.post_id.cmp(&b.post_id))
        });
        Ok(pending)
    }
}

#[async_trait]
impl OutboxSource for InMemoryReviewStore {
    async fn pending_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>> {
        Ok(self.outbox.pending(limit))
    }

    async fn mark_dispatched(&self, id: i64) -> StoreResult<()> {
        self.outbox.mark_dispatched(id)
    }

    async fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()> {
        self.outbox.record_attempt(id, error)
    }
}
