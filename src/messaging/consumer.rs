//! # Queue Consumer
//!
//! Polling loop that pulls deliveries from one queue, hands each to a
//! [`MessageHandler`] and settles it:
//!
//! - handler success: ack
//! - permanent failure (malformed payload, dangling reference, ...): log and ack
//! - transient failure: release for redelivery, until `max_deliveries`
//!   is reached, then log as dead-lettered and ack
//!
//! A handler error never stops the loop.

use super::bus::MessageBus;
use super::message::Delivery;
use crate::config::ConsumerConfig;
use crate::error::WorkflowResult;
use crate::logging::log_error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Component name used in logs
    fn name(&self) -> &'static str;

    async fn handle(&self, delivery: &Delivery) -> WorkflowResult<()>;
}

/// Per-batch settlement counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub acked: usize,
    pub discarded: usize,
    pub released: usize,
    pub dead_lettered: usize,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }
}

#[derive(Clone, Copy)]
enum Settlement {
    Ack,
    Discard,
    Release,
    DeadLetter,
}

pub struct QueueConsumer<H: MessageHandler> {
    bus: Arc<dyn MessageBus>,
    handler: Arc<H>,
    queue: String,
    config: ConsumerConfig,
}

impl<H: MessageHandler> std::fmt::Debug for QueueConsumer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("handler", &self.handler.name())
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish()
    }
}

impl<H: MessageHandler> QueueConsumer<H> {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        handler: Arc<H>,
        queue: impl Into<String>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            bus,
            handler,
            queue: queue.into(),
            config,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Receive one batch and settle every delivery in it
    pub async fn process_batch(&self) -> WorkflowResult<BatchSummary> {
        let deliveries = self
            .bus
            .receive(
                &self.queue,
                self.config.visibility_timeout(),
                self.config.batch_size,
            )
            .await?;

        let mut summary = BatchSummary {
            received: deliveries.len(),
            ..BatchSummary::default()
        };

        for delivery in &deliveries {
            let settlement = self.settlement_for(delivery).await;
            let outcome = match settlement {
                Settlement::Release => self.bus.release(&self.queue, delivery.delivery_id).await,
                _ => self.bus.ack(&self.queue, delivery.delivery_id).await,
            };

            if let Err(e) = outcome {
                // Unsettled deliveries reappear once their visibility timeout lapses
                warn!(
                    queue = %self.queue,
                    delivery_id = delivery.delivery_id,
                    error = %e,
                    "Failed to settle delivery"
                );
                continue;
            }

            match settlement {
                Settlement::Ack => summary.acked += 1,
                Settlement::Discard => summary.discarded += 1,
                Settlement::Release => summary.released += 1,
                Settlement::DeadLetter => summary.dead_lettered += 1,
            }
        }

        Ok(summary)
    }

    async fn settlement_for(&self, delivery: &Delivery) -> Settlement {
        match self.handler.handle(delivery).await {
            Ok(()) => Settlement::Ack,
            Err(e) if e.is_permanent() => {
                log_error(
                    self.handler.name(),
                    "consume",
                    &e.to_string(),
                    Some(&format!(
                        "queue={} delivery_id={} payload={}",
                        self.queue, delivery.delivery_id, delivery.payload
                    )),
                );
                Settlement::Discard
            }
            Err(e) if delivery.delivery_count >= self.config.max_deliveries => {
                error!(
                    handler = self.handler.name(),
                    queue = %self.queue,
                    delivery_id = delivery.delivery_id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    payload = %delivery.payload,
                    "Delivery exceeded max deliveries - dead-lettering"
                );
                Settlement::DeadLetter
            }
            Err(e) => {
                warn!(
                    handler = self.handler.name(),
                    queue = %self.queue,
                    delivery_id = delivery.delivery_id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "Transient handler failure - releasing for redelivery"
                );
                Settlement::Release
            }
        }
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            handler = self.handler.name(),
            queue = %self.queue,
            "Starting queue consumer"
        );

        while !*shutdown.borrow() {
            let idle = match self.process_batch().await {
                Ok(summary) => {
                    if !summary.is_empty() {
                        debug!(queue = %self.queue, ?summary, "Processed batch");
                    }
                    summary.is_empty()
                }
                Err(e) => {
                    warn!(queue = %self.queue, error = %e, "Failed to receive batch");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.polling_interval()) => {},
                    changed = shutdown.changed() => {
                        debug!(queue = %self.queue, "Shutdown signal received");
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(handler = self.handler.name(), queue = %self.queue, "Queue consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::messaging::{InMemoryMessageBus, MessagingError};
    use serde_json::json;
    use uuid::Uuid;

    struct ScriptedHandler;

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn handle(&self, delivery: &Delivery) -> WorkflowResult<()> {
            match delivery.payload["outcome"].as_str() {
                Some("ok") => Ok(()),
                Some("permanent") => Err(WorkflowError::DanglingReference { id: Uuid::nil() }),
                _ => Err(WorkflowError::TransientDeliveryFailure(
                    MessagingError::unavailable("downstream"),
                )),
            }
        }
    }

    fn config(max_deliveries: u32) -> ConsumerConfig {
        ConsumerConfig {
            batch_size: 10,
            polling_interval_ms: 10,
            visibility_timeout_seconds: 30,
            max_deliveries,
        }
    }

    async fn consumer(max_deliveries: u32) -> (Arc<InMemoryMessageBus>, QueueConsumer<ScriptedHandler>) {
        let bus = Arc::new(InMemoryMessageBus::new());
        bus.declare_queue("q").await.unwrap();
        bus.bind("x", "k", "q").await.unwrap();
        let consumer = QueueConsumer::new(
            bus.clone() as Arc<dyn MessageBus>,
            Arc::new(ScriptedHandler),
            "q",
            config(max_deliveries),
        );
        (bus, consumer)
    }

    #[tokio::test]
    async fn test_success_and_permanent_failures_are_acked() {
        let (bus, consumer) = consumer(5).await;
        bus.publish("x", "k", &json!({"outcome": "ok"})).await.unwrap();
        bus.publish("x", "k", &json!({"outcome": "permanent"})).await.unwrap();

        let summary = consumer.process_batch().await.unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.acked, 1);
        assert_eq!(summary.discarded, 1);
        assert_eq!(bus.queue_depth("q"), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_released_then_dead_lettered() {
        let (bus, consumer) = consumer(2).await;
        bus.publish("x", "k", &json!({"outcome": "transient"})).await.unwrap();

        let first = consumer.process_batch().await.unwrap();
        assert_eq!(first.released, 1);
        assert_eq!(bus.queue_depth("q"), 1);

        let second = consumer.process_batch().await.unwrap();
        assert_eq!(second.dead_lettered, 1);
        assert_eq!(bus.queue_depth("q"), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (bus, consumer) = consumer(5).await;
        bus.publish("x", "k", &json!({"outcome": "ok"})).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let consumer = Arc::new(consumer);
        let task = tokio::spawn({
            let consumer = consumer.clone();
            async move { consumer.run(rx).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bus.queue_depth("q"), 0);
    }
}
