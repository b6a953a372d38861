//! # Message Bus
//!
//! Topic/queue routed, at-least-once bus. Publishers address an exchange
//! and routing key; every queue bound to that pair receives a copy.
//! Consumers pull deliveries, which stay invisible for a visibility
//! timeout and are redelivered unless acknowledged.

use super::errors::MessagingResult;
use super::message::{Delivery, Route};
use crate::config::MessagingConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Create the queue if it does not exist
    async fn declare_queue(&self, queue: &str) -> MessagingResult<()>;

    /// Route messages published to `exchange`/`routing_key` into `queue`
    async fn bind(&self, exchange: &str, routing_key: &str, queue: &str) -> MessagingResult<()>;

    /// Publish to every bound queue and return how many received it.
    ///
    /// Fails with `Unroutable` when no queue is bound.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> MessagingResult<usize>;

    /// Pull up to `limit` visible deliveries in enqueue order
    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
        limit: usize,
    ) -> MessagingResult<Vec<Delivery>>;

    /// Remove a delivery permanently
    async fn ack(&self, queue: &str, delivery_id: i64) -> MessagingResult<()>;

    /// Make a delivery visible again immediately
    async fn release(&self, queue: &str, delivery_id: i64) -> MessagingResult<()>;
}

/// Serialize and publish a typed message
pub async fn publish_json<B, T>(bus: &B, route: &Route, message: &T) -> MessagingResult<usize>
where
    B: MessageBus + ?Sized,
    T: Serialize + Sync,
{
    let payload = serde_json::to_value(message)?;
    bus.publish(&route.exchange, &route.routing_key, &payload)
        .await
}

/// Declare both durable queues and bind them to the configured routing keys
pub async fn declare_review_topology<B>(bus: &B, config: &MessagingConfig) -> MessagingResult<()>
where
    B: MessageBus + ?Sized,
{
    bus.declare_queue(&config.review_request_queue).await?;
    bus.declare_queue(&config.review_result_queue).await?;
    bus.bind(
        &config.exchange,
        &config.review_request_routing_key,
        &config.review_request_queue,
    )
    .await?;
    bus.bind(
        &config.exchange,
        &config.review_result_routing_key,
        &config.review_result_queue,
    )
    .await?;

    info!(
        exchange = %config.exchange,
        request_queue = %config.review_request_queue,
        result_queue = %config.review_result_queue,
        "Review topology declared"
    );
    Ok(())
}
