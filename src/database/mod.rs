//! # Database Operations
//!
//! Persistence for both domains, each behind its own trait so the two
//! stores stay physically separate:
//!
//! - [`WorkItemStore`]: authoring-domain work items and the conditional
//!   transition primitive
//! - [`ReviewStore`]: review-domain history and pending reviews
//! - [`OutboxSource`]: the transactional outbox each store owns
//!
//! Every trait has an in-memory implementation and a PostgreSQL one
//! backed by the schema in `migrations/`.

pub mod connection;
pub mod errors;
pub mod migrator;
pub mod outbox;
pub mod postgres;
pub mod review_store;
pub mod work_item_store;

pub use connection::DatabaseConnection;
pub use errors::{StoreError, StoreResult};
pub use outbox::{InMemoryOutbox, NewOutboxMessage, OutboxEntry, OutboxSource};
pub use postgres::{PgReviewStore, PgWorkItemStore};
pub use review_store::{InMemoryReviewStore, ReviewStore};
pub use work_item_store::{InMemoryWorkItemStore, Transition, WorkItemStore};
