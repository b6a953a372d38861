//! # PostgreSQL Stores
//!
//! Durable implementations of [`WorkItemStore`] and [`ReviewStore`].
//! Conditional transitions lock the row with `SELECT ... FOR UPDATE` and
//! write the item and its outbox entry in one transaction. Each domain
//! reads back only the outbox rows tagged with its own domain name.
//! Timestamps are truncated to microseconds before they are written so
//! that returned values equal what a later read yields.

use super::errors::{StoreError, StoreResult};
use super::outbox::{NewOutboxMessage, OutboxEntry, OutboxSource};
use super::review_store::ReviewStore;
use super::work_item_store::{Transition, WorkItemStore};
use crate::constants::domains;
use crate::models::{NewWorkItem, PendingReview, ReviewRecord, WorkItem, WorkItemId};
use crate::state_machine::{ReviewDecision, WorkItemStatus};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

const WORK_ITEM_COLUMNS: &str = "id, title, content, author, status, created_at, updated_at, \
     review_cycle, last_review_decision, last_review_comment, last_review_reviewer, last_reviewed_at";

#[derive(Debug, FromRow)]
struct WorkItemRow {
    id: Uuid,
    title: String,
    content: String,
    author: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    review_cycle: Option<Uuid>,
    last_review_decision: Option<String>,
    last_review_comment: Option<String>,
    last_review_reviewer: Option<String>,
    last_reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkItemRow> for WorkItem {
    type Error = StoreError;

    fn try_from(row: WorkItemRow) -> Result<Self, Self::Error> {
        let status: WorkItemStatus = row
            .status
            .parse()
            .map_err(|e: String| StoreError::corrupt(row.id, e))?;
        let last_review_decision = row
            .last_review_decision
            .as_deref()
            .map(|decision| decision.parse::<ReviewDecision>())
            .transpose()
            .map_err(|e: String| StoreError::corrupt(row.id, e))?;

        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            author: row.author,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            review_cycle: row.review_cycle,
            last_review_decision,
            last_review_comment: row.last_review_comment,
            last_review_reviewer: row.last_review_reviewer,
            last_reviewed_at: row.last_reviewed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReviewRecordRow {
    id: Uuid,
    post_id: Uuid,
    review_cycle: Uuid,
    reviewer: String,
    decision: String,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRecordRow> for ReviewRecord {
    type Error = StoreError;

    fn try_from(row: ReviewRecordRow) -> Result<Self, Self::Error> {
        let decision: ReviewDecision = row
            .decision
            .parse()
            .map_err(|e: String| StoreError::corrupt(row.id, e))?;
        Ok(Self {
            id: row.id,
            post_id: row.post_id,
            review_cycle: row.review_cycle,
            reviewer: row.reviewer,
            decision,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PendingReviewRow {
    post_id: Uuid,
    review_cycle: Uuid,
    title: String,
    content: String,
    author: String,
    requested_at: DateTime<Utc>,
}

impl From<PendingReviewRow> for PendingReview {
    fn from(row: PendingReviewRow) -> Self {
        Self {
            post_id: row.post_id,
            review_cycle: row.review_cycle,
            title: row.title,
            content: row.content,
            author: row.author,
            requested_at: row.requested_at,
        }
    }
}

fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Outbox rows of one domain in `editorial_outbox`
#[derive(Debug, Clone)]
struct PgOutbox {
    pool: PgPool,
    domain: &'static str,
}

impl PgOutbox {
    async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message: &NewOutboxMessage,
    ) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO editorial_outbox (domain, exchange, routing_key, payload) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(self.domain)
        .bind(&message.exchange)
        .bind(&message.routing_key)
        .bind(&message.payload)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn pending(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            "SELECT id, exchange, routing_key, payload, created_at, dispatched_at, attempts, last_error \
             FROM editorial_outbox \
             WHERE domain = $1 AND dispatched_at IS NULL \
             ORDER BY id \
             LIMIT $2",
        )
        .bind(self.domain)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn mark_dispatched(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE editorial_outbox SET dispatched_at = now() WHERE id = $1 AND domain = $2")
            .bind(id)
            .bind(self.domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE editorial_outbox SET attempts = attempts + 1, last_error = $3 \
             WHERE id = $1 AND domain = $2",
        )
        .bind(id)
        .bind(self.domain)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgWorkItemStore {
    pool: PgPool,
    outbox: PgOutbox,
}

impl PgWorkItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            outbox: PgOutbox {
                pool: pool.clone(),
                domain: domains::AUTHORING,
            },
            pool,
        }
    }

    async fn fetch_all(&self, status: Option<WorkItemStatus>) -> StoreResult<Vec<WorkItem>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, WorkItemRow>(&format!(
                    "SELECT {WORK_ITEM_COLUMNS} FROM editorial_work_items \
                     WHERE status = $1 ORDER BY created_at, id"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WorkItemRow>(&format!(
                    "SELECT {WORK_ITEM_COLUMNS} FROM editorial_work_items ORDER BY created_at, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(WorkItem::try_from).collect()
    }
}

#[async_trait]
impl WorkItemStore for PgWorkItemStore {
    async fn create(&self, new: NewWorkItem) -> StoreResult<WorkItem> {
        let item = WorkItem::from_new(Uuid::new_v4(), new, db_now());
        sqlx::query(
            "INSERT INTO editorial_work_items (id, title, content, author, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.author)
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get(&self, id: WorkItemId) -> StoreResult<WorkItem> {
        let row = sqlx::query_as::<_, WorkItemRow>(&format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM editorial_work_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { id })?;
        WorkItem::try_from(row)
    }

    async fn conditional_transition(
        &self,
        id: WorkItemId,
        transition: Transition<'_>,
    ) -> StoreResult<WorkItem> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WorkItemRow>(&format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM editorial_work_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound { id })?;

        let mut item = WorkItem::try_from(row)?;
        // Dropping `tx` on a failed guard rolls back and releases the lock
        let message = transition.apply(&mut item, db_now())?;

        sqlx::query(
            "UPDATE editorial_work_items SET title = $2, content = $3, author = $4, status = $5, \
             updated_at = $6, review_cycle = $7, last_review_decision = $8, \
             last_review_comment = $9, last_review_reviewer = $10, last_reviewed_at = $11 \
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.author)
        .bind(item.status.as_str())
        .bind(item.updated_at)
        .bind(item.review_cycle)
        .bind(item.last_review_decision.map(|d| d.as_str()))
        .bind(&item.last_review_comment)
        .bind(&item.last_review_reviewer)
        .bind(item.last_reviewed_at)
        .execute(&mut *tx)
        .await?;

        if let Some(message) = &message {
            let outbox_id = self.outbox.append(&mut tx, message).await?;
            debug!(work_item_id = %id, outbox_id, "Outbox entry appended");
        }

        tx.commit().await?;
        Ok(item)
    }

    async fn list(&self) -> StoreResult<Vec<WorkItem>> {
        self.fetch_all(None).await
    }

    async fn list_by_status(&self, status: WorkItemStatus) -> StoreResult<Vec<WorkItem>> {
        self.fetch_all(Some(status)).await
    }

    async fn delete(&self, id: WorkItemId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM editorial_work_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OutboxSource for PgWorkItemStore {
    async fn pending_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>> {
        self.outbox.pending(limit).await
    }

    async fn mark_dispatched(&self, id: i64) -> StoreResult<()> {
        self.outbox.mark_dispatched(id).await
    }

    async fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()> {
        self.outbox.record_attempt(id, error).await
    }
}

#[derive(Debug, Clone)]
pub struct PgReviewStore {
    pool: PgPool,
    outbox: PgOutbox,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            outbox: PgOutbox {
                pool: pool.clone(),
                domain: domains::REVIEW,
            },
            pool,
        }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn append(
        &self,
        record: ReviewRecord,
        outbox: Option<NewOutboxMessage>,
    ) -> StoreResult<ReviewRecord> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO editorial_review_records \
             (id, post_id, review_cycle, reviewer, decision, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.post_id)
        .bind(record.review_cycle)
        .bind(&record.reviewer)
        .bind(record.decision.as_str())
        .bind(&record.comment)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM editorial_pending_reviews WHERE post_id = $1")
            .bind(record.post_id)
            .execute(&mut *tx)
            .await?;

        if let Some(message) = &outbox {
            self.outbox.append(&mut tx, message).await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn reviews_for_post(&self, post_id: WorkItemId) -> StoreResult<Vec<ReviewRecord>> {
        let rows = sqlx::query_as::<_, ReviewRecordRow>(
            "SELECT id, post_id, review_cycle, reviewer, decision, comment, created_at \
             FROM editorial_review_records WHERE post_id = $1 \
             ORDER BY created_at DESC, id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ReviewRecord::try_from).collect()
    }

    async fn upsert_pending(&self, pending: PendingReview) -> StoreResult<bool> {
        // xmax = 0 only for freshly inserted rows
        let inserted: bool = sqlx::query_scalar(
            "INSERT INTO editorial_pending_reviews \
             (post_id, review_cycle, title, content, author, requested_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (post_id) DO UPDATE \
             SET review_cycle = EXCLUDED.review_cycle, title = EXCLUDED.title, \
                 content = EXCLUDED.content, author = EXCLUDED.author \
             RETURNING (xmax = 0)",
        )
        .bind(pending.post_id)
        .bind(pending.review_cycle)
        .bind(&pending.title)
        .bind(&pending.content)
        .bind(&pending.author)
        .bind(pending.requested_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn pending_review(&self, post_id: WorkItemId) -> StoreResult<Option<PendingReview>> {
        let row = sqlx::query_as::<_, PendingReviewRow>(
            "SELECT post_id, review_cycle, title, content, author, requested_at \
             FROM editorial_pending_reviews WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PendingReview::from))
    }

    async fn pending_reviews(&self) -> StoreResult<Vec<PendingReview>> {
        let rows = sqlx::query_as::<_, PendingReviewRow>(
            "SELECT post_id, review_cycle, title, content, author, requested_at \
             FROM editorial_pending_reviews ORDER BY requested_at, post_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PendingReview::from).collect())
    }
}

#[async_trait]
impl OutboxSource for PgReviewStore {
    async fn pending_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>> {
        self.outbox.pending(limit).await
    }

    async fn mark_dispatched(&self, id: i64) -> StoreResult<()> {
        self.outbox.mark_dispatched(id).await
    }

    async fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()> {
        self.outbox.record_attempt(id, error).await
    }
}
