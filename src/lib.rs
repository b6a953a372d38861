#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Editorial Workflow
//!
//! Cross-domain editorial review workflow: the lifecycle of a post
//! (DRAFT → REQUESTED → PUBLISHED / REJECTED) and the event choreography
//! that keeps the authoring and review domains consistent despite message
//! delay, redelivery and concurrent actors.
//!
//! ## Architecture
//!
//! The two domains own separate stores and talk only through a durable,
//! at-least-once message bus and a synchronous [`WorkItemClient`]:
//!
//! 1. [`SubmissionCoordinator`] moves a draft to REQUESTED and writes a
//!    review-request event to the authoring outbox in the same atomic step.
//! 2. [`ReviewDecisionHandler`] turns requests into pending reviews, records
//!    reviewer decisions and emits review-result events.
//! 3. [`ResultConsumer`] applies results with a conditional transition, so
//!    redelivered or stale results are harmless no-ops.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Statuses, events and the transition table
//! - [`models`] - Work items, review records, pending reviews
//! - [`database`] - Stores, transactional outbox, PostgreSQL schema
//! - [`messaging`] - Message bus, wire events, queue consumer
//! - [`orchestration`] - Workflow services and system bootstrap
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use editorial_workflow::config::EditorialConfig;
//! use editorial_workflow::models::NewWorkItem;
//! use editorial_workflow::orchestration::EditorialSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = EditorialSystem::in_memory(EditorialConfig::default());
//! system.declare_topology().await?;
//! let handle = system.start();
//!
//! let post = system
//!     .authoring()
//!     .service
//!     .create_post(NewWorkItem {
//!         title: "Hello".to_string(),
//!         content: "First post".to_string(),
//!         author: "gabriel".to_string(),
//!     })
//!     .await?;
//! system.authoring().submissions.submit_for_review(post.id, "gabriel").await?;
//!
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`WorkItemClient`]: orchestration::WorkItemClient
//! [`SubmissionCoordinator`]: orchestration::SubmissionCoordinator
//! [`ReviewDecisionHandler`]: orchestration::ReviewDecisionHandler
//! [`ResultConsumer`]: orchestration::ResultConsumer

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use config::{ConfigManager, EditorialConfig, ResultApplyPolicy};
pub use error::{WorkflowError, WorkflowResult};
pub use models::{ContentEdit, NewWorkItem, ReviewRecord, SearchCriteria, WorkItem, WorkItemId};
pub use orchestration::{ApplyOutcome, EditorialSystem, EditorialSystemHandle};
pub use state_machine::{ReviewDecision, WorkItemStatus};
