//! # PostgreSQL Message Bus
//!
//! Durable queues stored in PostgreSQL. Messages survive restarts, reads
//! take a visibility timeout with `FOR UPDATE SKIP LOCKED` so concurrent
//! consumers never share a delivery, and `read_ct` tracks redelivery.
//!
//! Tables are created by the crate migrations (`editorial_queues`,
//! `editorial_queue_bindings`, `editorial_queue_messages`).

use super::bus::MessageBus;
use super::errors::{MessagingError, MessagingResult};
use super::message::Delivery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct QueueMessageRow {
    msg_id: i64,
    queue_name: String,
    payload: serde_json::Value,
    read_ct: i32,
    enqueued_at: DateTime<Utc>,
}

impl From<QueueMessageRow> for Delivery {
    fn from(row: QueueMessageRow) -> Self {
        Self {
            delivery_id: row.msg_id,
            queue: row.queue_name,
            payload: row.payload,
            delivery_count: u32::try_from(row.read_ct).unwrap_or(0),
            enqueued_at: row.enqueued_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgMessageBus {
    pool: PgPool,
}

impl PgMessageBus {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn queue_exists(&self, queue: &str) -> MessagingResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM editorial_queues WHERE queue_name = $1)",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Messages in the queue, visible or in flight
    pub async fn queue_depth(&self, queue: &str) -> MessagingResult<i64> {
        let depth: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM editorial_queue_messages WHERE queue_name = $1",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;
        Ok(depth)
    }
}

#[async_trait]
impl MessageBus for PgMessageBus {
    async fn declare_queue(&self, queue: &str) -> MessagingResult<()> {
        sqlx::query("INSERT INTO editorial_queues (queue_name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(queue)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bind(&self, exchange: &str, routing_key: &str, queue: &str) -> MessagingResult<()> {
        if !self.queue_exists(queue).await? {
            return Err(MessagingError::queue_not_found(queue));
        }

        sqlx::query(
            "INSERT INTO editorial_queue_bindings (exchange, routing_key, queue_name) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(exchange)
        .bind(routing_key)
        .bind(queue)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> MessagingResult<usize> {
        let result = sqlx::query(
            "INSERT INTO editorial_queue_messages (queue_name, payload) \
             SELECT queue_name, $3 FROM editorial_queue_bindings \
             WHERE exchange = $1 AND routing_key = $2",
        )
        .bind(exchange)
        .bind(routing_key)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        match result.rows_affected() {
            0 => Err(MessagingError::unroutable(exchange, routing_key)),
            n => {
                debug!(copies = n, "Message published");
                Ok(n as usize)
            }
        }
    }

    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
        limit: usize,
    ) -> MessagingResult<Vec<Delivery>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = sqlx::query_as::<_, QueueMessageRow>(
            "WITH next AS ( \
                 SELECT msg_id FROM editorial_queue_messages \
                 WHERE queue_name = $1 AND vt <= now() \
                 ORDER BY msg_id \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE editorial_queue_messages m \
             SET vt = now() + make_interval(secs => $3), read_ct = m.read_ct + 1 \
             FROM next WHERE m.msg_id = next.msg_id \
             RETURNING m.msg_id, m.queue_name, m.payload, m.read_ct, m.enqueued_at",
        )
        .bind(queue)
        .bind(limit)
        .bind(visibility_timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() && !self.queue_exists(queue).await? {
            return Err(MessagingError::queue_not_found(queue));
        }

        // RETURNING does not preserve the CTE ordering
        rows.sort_by_key(|row| row.msg_id);
        Ok(rows.into_iter().map(Delivery::from).collect())
    }

    async fn ack(&self, queue: &str, delivery_id: i64) -> MessagingResult<()> {
        let result =
            sqlx::query("DELETE FROM editorial_queue_messages WHERE queue_name = $1 AND msg_id = $2")
                .bind(queue)
                .bind(delivery_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MessagingError::delivery_not_found(queue, delivery_id));
        }
        Ok(())
    }

    async fn release(&self, queue: &str, delivery_id: i64) -> MessagingResult<()> {
        let result = sqlx::query(
            "UPDATE editorial_queue_messages SET vt = now() WHERE queue_name = $1 AND msg_id = $2",
        )
        .bind(queue)
        .bind(delivery_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MessagingError::delivery_not_found(queue, delivery_id));
        }
        Ok(())
    }
}
