//! Process-local [`MessageBus`] used by tests and single-process deployments.
//!
//! Each queue is an ordered map from delivery id to message with a
//! visibility deadline, the same model the PostgreSQL queue uses.

use super::bus::MessageBus;
use super::errors::{MessagingError, MessagingResult};
use super::message::Delivery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct StoredMessage {
    payload: serde_json::Value,
    enqueued_at: DateTime<Utc>,
    visible_at: Instant,
    delivery_count: u32,
}

#[derive(Debug)]
pub struct InMemoryMessageBus {
    bindings: RwLock<HashMap<(String, String), Vec<String>>>,
    queues: DashMap<String, BTreeMap<i64, StoredMessage>>,
    next_id: AtomicI64,
    available: AtomicBool,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            queues: DashMap::new(),
            next_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a broker outage; every operation fails until [`Self::reconnect`]
    pub fn disconnect(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.available.store(true, Ordering::SeqCst);
    }

    /// Messages in the queue, visible or in flight
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.len())
    }

    /// Payloads in enqueue order without affecting visibility
    pub fn peek(&self, queue: &str) -> Vec<serde_json::Value> {
        self.queues
            .get(queue)
            .map(|q| q.values().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> MessagingResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MessagingError::unavailable("in-memory bus disconnected"))
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn declare_queue(&self, queue: &str) -> MessagingResult<()> {
        self.ensure_available()?;
        self.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn bind(&self, exchange: &str, routing_key: &str, queue: &str) -> MessagingResult<()> {
        self.ensure_available()?;
        if !self.queues.contains_key(queue) {
            return Err(MessagingError::queue_not_found(queue));
        }

        let mut bindings = self.bindings.write();
        let queues = bindings
            .entry((exchange.to_string(), routing_key.to_string()))
            .or_default();
        if !queues.iter().any(|q| q == queue) {
            queues.push(queue.to_string());
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> MessagingResult<usize> {
        self.ensure_available()?;

        let targets = self
            .bindings
            .read()
            .get(&(exchange.to_string(), routing_key.to_string()))
            .cloned()
            .unwrap_or_default();
        if targets.is_empty() {
            return Err(MessagingError::unroutable(exchange, routing_key));
        }

        let now = Instant::now();
        for queue_name in &targets {
            let mut queue = self
                .queues
                .get_mut(queue_name)
                .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            queue.insert(
                id,
                StoredMessage {
                    payload: payload.clone(),
                    enqueued_at: Utc::now(),
                    visible_at: now,
                    delivery_count: 0,
                },
            );
            debug!(queue = %queue_name, delivery_id = id, "Message enqueued");
        }

        Ok(targets.len())
    }

    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
        limit: usize,
    ) -> MessagingResult<Vec<Delivery>> {
        self.ensure_available()?;

        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::queue_not_found(queue))?;

        let now = Instant::now();
        let deliveries = messages
            .iter_mut()
            .filter(|(_, message)| message.visible_at <= now)
            .take(limit)
            .map(|(id, message)| {
                message.visible_at = now + visibility_timeout;
                message.delivery_count += 1;
                Delivery {
                    delivery_id: *id,
                    queue: queue.to_string(),
                    payload: message.payload.clone(),
                    delivery_count: message.delivery_count,
                    enqueued_at: message.enqueued_at,
                }
            })
            .collect();

        Ok(deliveries)
    }

    async fn ack(&self, queue: &str, delivery_id: i64) -> MessagingResult<()> {
        self.ensure_available()?;
        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::queue_not_found(queue))?;
        messages
            .remove(&delivery_id)
            .map(|_| ())
            .ok_or_else(|| MessagingError::delivery_not_found(queue, delivery_id))
    }

    async fn release(&self, queue: &str, delivery_id: i64) -> MessagingResult<()> {
        self.ensure_available()?;
        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::queue_not_found(queue))?;
        let message = messages
            .get_mut(&delivery_id)
            .ok_or_else(|| MessagingError::delivery_not_found(queue, delivery_id))?;
        message.visible_at = Instant::now();
        Ok(())
    }
}
