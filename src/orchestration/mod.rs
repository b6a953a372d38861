//! # Orchestration
//!
//! The editorial workflow services and their wiring.
//!
//! ```text
//! SubmissionCoordinator --request--> ReviewDecisionHandler --result--> ResultConsumer
//!     (authoring)            bus           (review)             bus      (authoring)
//! ```
//!
//! No operation spans both domains: each service commits to its own store
//! and hands events to its outbox, and the [`OutboxDispatcher`] publishes
//! them.

pub mod authoring_service;
pub mod bootstrap;
pub mod outbox_dispatcher;
pub mod result_consumer;
pub mod review_decision_handler;
pub mod submission_coordinator;
pub mod work_item_client;

pub use authoring_service::AuthoringService;
pub use bootstrap::{
    AuthoringDomain, EditorialSystem, EditorialSystemHandle, ReviewDomain, SystemStatus,
};
pub use outbox_dispatcher::{DispatchSummary, OutboxDispatcher};
pub use result_consumer::{ApplyOutcome, ResultConsumer};
pub use review_decision_handler::ReviewDecisionHandler;
pub use submission_coordinator::SubmissionCoordinator;
pub use work_item_client::{LocalWorkItemClient, WorkItemClient};
