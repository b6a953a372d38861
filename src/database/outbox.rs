//! # Transactional Outbox
//!
//! Events are appended to the producing domain's store in the same atomic
//! operation as the mutation that caused them, then drained to the bus by
//! the outbox dispatcher. An entry stays pending until a publish succeeds.

use super::errors::{StoreError, StoreResult};
use crate::messaging::Route;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Event to append to an outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutboxMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

impl NewOutboxMessage {
    pub fn json<T: Serialize>(route: &Route, message: &T) -> serde_json::Result<Self> {
        Ok(Self {
            exchange: route.exchange.clone(),
            routing_key: route.routing_key.clone(),
            payload: serde_json::to_value(message)?,
        })
    }
}

/// Persisted outbox row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn is_pending(&self) -> bool {
        self.dispatched_at.is_none()
    }
}

/// A store that owns outbox entries
#[async_trait]
pub trait OutboxSource: Send + Sync {
    /// Undispatched entries, oldest first
    async fn pending_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>>;

    async fn mark_dispatched(&self, id: i64) -> StoreResult<()>;

    /// Count a failed publish and remember why
    async fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()>;
}

/// Outbox table for the in-memory stores.
///
/// Appends happen while the caller holds its own record lock, so an entry
/// becomes visible together with the mutation that produced it. Only
/// pending entries are retained; a dispatched entry is dropped and counted.
#[derive(Debug)]
pub struct InMemoryOutbox {
    state: Mutex<OutboxState>,
}

#[derive(Debug)]
struct OutboxState {
    pending: VecDeque<OutboxEntry>,
    next_id: i64,
    dispatched: u64,
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self {
            state: Mutex::new(OutboxState {
                pending: VecDeque::new(),
                next_id: 1,
                dispatched: 0,
            }),
        }
    }
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: NewOutboxMessage) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.pending.push_back(OutboxEntry {
            id,
            exchange: message.exchange,
            routing_key: message.routing_key,
            payload: message.payload,
            created_at: Utc::now(),
            dispatched_at: None,
            attempts: 0,
            last_error: None,
        });
        id
    }

    /// Oldest pending entries first
    pub fn pending(&self, limit: usize) -> Vec<OutboxEntry> {
        self.state
            .lock()
            .pending
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Entries published and dropped since creation
    pub fn dispatched_count(&self) -> u64 {
        self.state.lock().dispatched
    }

    /// Drop a published entry; unknown ids were already dispatched
    pub fn mark_dispatched(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(position) = state.pending.iter().position(|entry| entry.id == id) {
            state.pending.remove(position);
            state.dispatched += 1;
        }
        Ok(())
    }

    pub fn record_attempt(&self, id: i64, error: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .pending
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| StoreError::corrupt(id, "outbox entry is not pending"))?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }
}
