//! # Messaging Module
//!
//! Queue-based messaging between the authoring and review domains.
//! [`MessageBus`] abstracts an at-least-once topic/queue broker with an
//! in-process implementation and a PostgreSQL-backed one; [`QueueConsumer`]
//! drives a [`MessageHandler`] from a queue.

pub mod bus;
pub mod consumer;
pub mod errors;
pub mod in_memory;
pub mod message;
pub mod pg_queue;

pub use bus::{declare_review_topology, publish_json, MessageBus};
pub use consumer::{BatchSummary, MessageHandler, QueueConsumer};
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::InMemoryMessageBus;
pub use message::{Delivery, ReviewRequestEvent, ReviewResultEvent, Route};
pub use pg_queue::PgMessageBus;
