//! # Workflow State Store
//!
//! Authoring-domain persistence for [`WorkItem`]s. The only atomic
//! primitive is [`WorkItemStore::conditional_transition`]: read the item,
//! verify its status is one of the expected set, apply a mutation, write it
//! back and optionally append an outbox entry, all as one unit. A failed
//! precondition reports the actual status and leaves no side effects.

use super::errors::{StoreError, StoreResult};
use super::outbox::{InMemoryOutbox, NewOutboxMessage, OutboxEntry, OutboxSource};
use crate::models::{NewWorkItem, WorkItem, WorkItemId};
use crate::state_machine::{source_states, target_state, WorkItemEvent, WorkItemStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use uuid::Uuid;

pub type Mutator<'a> = Box<dyn Fn(&mut WorkItem) + Send + Sync + 'a>;
pub type Guard<'a> = Box<dyn Fn(&WorkItem) -> bool + Send + Sync + 'a>;
pub type OutboxEmitter<'a> =
    Box<dyn Fn(&WorkItem) -> serde_json::Result<NewOutboxMessage> + Send + Sync + 'a>;

/// A guarded status change with its side effects
pub struct Transition<'a> {
    pub expected: &'a [WorkItemStatus],
    pub new_status: WorkItemStatus,
    guard: Option<Guard<'a>>,
    mutate: Option<Mutator<'a>>,
    emit: Option<OutboxEmitter<'a>>,
}

impl fmt::Debug for Transition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("expected", &self.expected)
            .field("new_status", &self.new_status)
            .field("guarded", &self.guard.is_some())
            .field("mutates", &self.mutate.is_some())
            .field("emits", &self.emit.is_some())
            .finish()
    }
}

impl<'a> Transition<'a> {
    pub fn new(expected: &'a [WorkItemStatus], new_status: WorkItemStatus) -> Self {
        Self {
            expected,
            new_status,
            guard: None,
            mutate: None,
            emit: None,
        }
    }

    /// Guard and target taken from the lifecycle state machine
    pub fn for_event(event: &WorkItemEvent) -> Self {
        Self::new(source_states(event), target_state(event))
    }

    /// Unconditional status overwrite
    pub fn overwrite(new_status: WorkItemStatus) -> Self {
        Self::new(&WorkItemStatus::ALL, new_status)
    }

    /// Extra precondition on the stored item, checked alongside the status
    pub fn with_guard(mut self, guard: impl Fn(&WorkItem) -> bool + Send + Sync + 'a) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn with_mutator(mut self, mutate: impl Fn(&mut WorkItem) + Send + Sync + 'a) -> Self {
        self.mutate = Some(Box::new(mutate));
        self
    }

    /// Build an outbox entry from the updated item
    pub fn with_outbox(
        mut self,
        emit: impl Fn(&WorkItem) -> serde_json::Result<NewOutboxMessage> + Send + Sync + 'a,
    ) -> Self {
        self.emit = Some(Box::new(emit));
        self
    }

    pub fn permits(&self, status: WorkItemStatus) -> bool {
        self.expected.contains(&status)
    }

    fn admits(&self, item: &WorkItem) -> bool {
        self.permits(item.status) && self.guard.as_ref().map_or(true, |guard| guard(item))
    }

    /// Apply to a working copy of the item.
    ///
    /// Returns the outbox entry to persist alongside it. The copy is left
    /// untouched when the guard fails.
    pub fn apply(
        &self,
        item: &mut WorkItem,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<NewOutboxMessage>> {
        if !self.admits(item) {
            return Err(StoreError::Conflict {
                id: item.id,
                actual: item.status,
            });
        }

        if let Some(mutate) = &self.mutate {
            mutate(item);
        }
        item.status = self.new_status;
        item.updated_at = now;

        match &self.emit {
            Some(emit) => Ok(Some(emit(item)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait WorkItemStore: OutboxSource {
    /// Persist a new DRAFT item
    async fn create(&self, new: NewWorkItem) -> StoreResult<WorkItem>;

    async fn get(&self, id: WorkItemId) -> StoreResult<WorkItem>;

    async fn conditional_transition(
        &self,
        id: WorkItemId,
        transition: Transition<'_>,
    ) -> StoreResult<WorkItem>;

    /// Every item, oldest first
    async fn list(&self) -> StoreResult<Vec<WorkItem>>;

    /// Items in `status`, oldest first
    async fn list_by_status(&self, status: WorkItemStatus) -> StoreResult<Vec<WorkItem>>;

    async fn delete(&self, id: WorkItemId) -> StoreResult<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryWorkItemStore {
    items: DashMap<WorkItemId, WorkItem>,
    outbox: InMemoryOutbox,
}

impl InMemoryWorkItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> &InMemoryOutbox {
        &self.outbox
    }

    fn sorted(mut items: Vec<WorkItem>) -> Vec<WorkItem> {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }
}

#[async_trait]
impl WorkItemStore for InMemoryWorkItemStore {
    async fn create(&self, new: NewWorkItem) -> StoreResult<WorkItem> {
        let item = WorkItem::from_new(Uuid::new_v4(), new, Utc::now());
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: WorkItemId) -> StoreResult<WorkItem> {
        self.items
            .get(&id)
            .map(|item| item.clone())
            .ok_or(StoreError::NotFound { id })
    }

    async fn conditional_transition(
        &self,
        id: WorkItemId,
        transition: Transition<'_>,
    ) -> StoreResult<WorkItem> {
        // The entry guard serializes every transition on this item
        let mut entry = self.items.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        let mut updated = entry.clone();
        let message = transition.apply(&mut updated, Utc::now())?;
        if let Some(message) = message {
            self.outbox.append(message);
        }
        *entry = updated.clone();

        Ok(updated)
    }

    async fn list(&self) -> StoreResult<Vec<WorkItem>> {
        Ok(Self::sorted(
            self.items.iter().map(|item| item.clone()).collect(),
        ))
    }

    async fn list_by_status(&self, status: WorkItemStatus) -> StoreResult<Vec<WorkItem>> {
        Ok(Self::sorted(
            self.items
                .iter()
                .filter(|item| item.status == status)
                .map(|item| item.clone())
                .collect(),
        ))
    }

    async fn delete(&self, id: WorkItemId) -> StoreResult<bool> {
        Ok(self.items.remove(&id).is_some())
    }
}

#[async_trait]
impl OutboxSource for InMemoryWorkItemStore {
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
