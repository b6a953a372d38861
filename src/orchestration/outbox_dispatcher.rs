//! # Outbox Dispatcher
//!
//! Drains a store's transactional outbox to the message bus. Entries are
//! published in creation order and a drain stops at the first failure, so
//! events for one post never overtake each other. Failed entries stay
//! pending with an attempt count and are retried by the next drain.

use crate::constants::operations;
use crate::database::OutboxSource;
use crate::error::WorkflowResult;
use crate::logging::log_workflow_operation;
use crate::messaging::MessageBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub published: usize,
    /// Entries whose publish failed in this drain (0 or 1)
    pub failed: usize,
}

impl DispatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

pub struct OutboxDispatcher<S: OutboxSource + ?Sized> {
    domain: &'static str,
    source: Arc<S>,
    bus: Arc<dyn MessageBus>,
    batch_size: usize,
    interval: Duration,
    drain_lock: Mutex<()>,
}

impl<S: OutboxSource + ?Sized> std::fmt::Debug for OutboxDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxDispatcher")
            .field("domain", &self.domain)
            .field("batch_size", &self.batch_size)
            .field("interval", &self.interval)
            .finish()
    }
}

impl<S: OutboxSource + ?Sized> OutboxDispatcher<S> {
    pub fn new(
        domain: &'static str,
        source: Arc<S>,
        bus: Arc<dyn MessageBus>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            domain,
            source,
            bus,
            batch_size: batch_size.max(1),
            interval,
            drain_lock: Mutex::new(()),
        }
    }

    /// Publish pending entries until the outbox is empty or a publish fails
    pub async fn drain(&self) -> WorkflowResult<DispatchSummary> {
        // One drain at a time per process so no entry is published twice
        let _guard = self.drain_lock.lock().await;
        let mut summary = DispatchSummary::default();

        loop {
            let batch = self.source.pending_outbox(self.batch_size).await?;
            let batch_len = batch.len();

            for entry in batch {
                match self
                    .bus
                    .publish(&entry.exchange, &entry.routing_key, &entry.payload)
                    .await
                {
                    Ok(copies) => {
                        self.source.mark_dispatched(entry.id).await?;
                        summary.published += 1;
                        debug!(
                            domain = self.domain,
                            outbox_id = entry.id,
                            routing_key = %entry.routing_key,
                            copies,
                            "Outbox entry published"
                        );
                    }
                    Err(e) => {
                        self.source.record_attempt(entry.id, &e.to_string()).await?;
                        summary.failed += 1;
                        warn!(
                            domain = self.domain,
                            outbox_id = entry.id,
                            routing_key = %entry.routing_key,
                            attempts = entry.attempts + 1,
                            error = %e,
                            "Outbox publish failed - entry retained for retry"
                        );
                        return Ok(summary);
                    }
                }
            }

            if batch_len < self.batch_size {
                break;
            }
        }

        if summary.published > 0 {
            log_workflow_operation(
                operations::DISPATCH_OUTBOX,
                None,
                "published",
                Some(&format!("domain={} count={}", self.domain, summary.published)),
            );
        }
        Ok(summary)
    }

    /// Drain right after a commit; failures are left to the background loop
    pub async fn drain_after_commit(&self) {
        match self.drain().await {
            Ok(summary) if summary.is_clean() => {}
            Ok(_) => {
                warn!(domain = self.domain, "Event publish deferred to background dispatcher");
            }
            Err(e) => {
                warn!(
                    domain = self.domain,
                    error = %e,
                    "Outbox drain failed - deferred to background dispatcher"
                );
            }
        }
    }

    /// Drain on an interval until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(domain = self.domain, interval_ms = self.interval.as_millis() as u64, "Starting outbox dispatcher");

        while !*shutdown.borrow() {
            if let Err(e) = self.drain().await {
                warn!(domain = self.domain, error = %e, "Background outbox drain failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // Final drain so events committed just before shutdown are not held back
        if let Err(e) = self.drain().await {
            warn!(domain = self.domain, error = %e, "Final outbox drain failed");
        }
        info!(domain = self.domain, "Outbox dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemoryWorkItemStore, NewOutboxMessage};
    use crate::messaging::{InMemoryMessageBus, Route};
    use serde_json::json;

    fn dispatcher(
        store: Arc<InMemoryWorkItemStore>,
        bus: Arc<InMemoryMessageBus>,
        batch_size: usize,
    ) -> OutboxDispatcher<InMemoryWorkItemStore> {
        OutboxDispatcher::new(
            "authoring",
            store,
            bus as Arc<dyn MessageBus>,
            batch_size,
            Duration::from_millis(10),
        )
    }

    fn append(store: &InMemoryWorkItemStore, n: i32) {
        store
            .outbox()
            .append(NewOutboxMessage::json(&Route::new("x", "k"), &json!({ "n": n })).unwrap());
    }

    #[tokio::test]
    async fn test_drain_publishes_in_order_across_batches() {
        let store = Arc::new(InMemoryWorkItemStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        bus.declare_queue("q").await.unwrap();
        bus.bind("x", "k", "q").await.unwrap();
        for n in 0..5 {
            append(&store, n);
        }

        let summary = dispatcher(store.clone(), bus.clone(), 2).drain().await.unwrap();
        assert_eq!(summary, DispatchSummary { published: 5, failed: 0 });
        assert_eq!(store.outbox().pending_count(), 0);
        let ns: Vec<_> = bus.peek("q").iter().map(|p| p["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unroutable_entries_stay_pending() {
        let store = Arc::new(InMemoryWorkItemStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        append(&store, 1);
        append(&store, 2);

        let dispatcher = dispatcher(store.clone(), bus.clone(), 10);
        let summary = dispatcher.drain().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 0);
        assert_eq!(store.outbox().pending_count(), 2);
        assert_eq!(store.outbox().pending(1)[0].attempts, 1);

        bus.declare_queue("q").await.unwrap();
        bus.bind("x", "k", "q").await.unwrap();
        let summary = dispatcher.drain().await.unwrap();
        assert_eq!(summary.published, 2);
        assert_eq!(bus.queue_depth("q"), 2);
    }
}
