//! # Editorial System Bootstrap
//!
//! Wires both domains from an [`EditorialConfig`]:
//!
//! - **Memory backend**: in-process stores and bus, for tests and demos
//! - **Postgres backend**: durable stores, outboxes and queues sharing one pool
//!
//! [`EditorialSystem::start`] spawns the background loops for the
//! configured service role (queue consumers and outbox dispatchers) and
//! returns an [`EditorialSystemHandle`] for graceful shutdown.

use super::authoring_service::AuthoringService;
use super::outbox_dispatcher::OutboxDispatcher;
use super::result_consumer::ResultConsumer;
use super::review_decision_handler::ReviewDecisionHandler;
use super::submission_coordinator::SubmissionCoordinator;
use super::work_item_client::LocalWorkItemClient;
use crate::config::{Backend, ConfigManager, EditorialConfig, ServiceRole};
use crate::constants::domains;
use crate::database::{
    DatabaseConnection, InMemoryReviewStore, InMemoryWorkItemStore, PgReviewStore,
    PgWorkItemStore, ReviewStore, WorkItemStore,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::messaging::{
    declare_review_topology, InMemoryMessageBus, MessageBus, PgMessageBus, QueueConsumer,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Authoring-domain components
pub struct AuthoringDomain {
    pub service: AuthoringService,
    pub submissions: Arc<SubmissionCoordinator>,
    pub results: Arc<ResultConsumer>,
    pub dispatcher: Arc<OutboxDispatcher<dyn WorkItemStore>>,
}

/// Review-domain components
pub struct ReviewDomain {
    pub decisions: Arc<ReviewDecisionHandler>,
    pub dispatcher: Arc<OutboxDispatcher<dyn ReviewStore>>,
}

pub struct EditorialSystem {
    config: EditorialConfig,
    bus: Arc<dyn MessageBus>,
    authoring: AuthoringDomain,
    review: ReviewDomain,
    database: Option<DatabaseConnection>,
}

impl std::fmt::Debug for EditorialSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorialSystem")
            .field("environment", &self.config.environment)
            .field("backend", &self.config.backend)
            .field("role", &self.config.service.role)
            .finish_non_exhaustive()
    }
}

impl EditorialSystem {
    /// Wire both domains over the given stores and bus
    pub fn assemble(
        config: EditorialConfig,
        work_items: Arc<dyn WorkItemStore>,
        reviews: Arc<dyn ReviewStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        let authoring_dispatcher = Arc::new(OutboxDispatcher::new(
            domains::AUTHORING,
            work_items.clone(),
            bus.clone(),
            config.outbox.batch_size,
            config.outbox.dispatch_interval(),
        ));
        let review_dispatcher = Arc::new(OutboxDispatcher::new(
            domains::REVIEW,
            reviews.clone(),
            bus.clone(),
            config.outbox.batch_size,
            config.outbox.dispatch_interval(),
        ));

        let service = AuthoringService::new(work_items.clone());
        let authoring = AuthoringDomain {
            submissions: Arc::new(SubmissionCoordinator::new(
                work_items.clone(),
                authoring_dispatcher.clone(),
                config.messaging.review_request_route(),
            )),
            results: Arc::new(ResultConsumer::new(
                work_items,
                config.review.result_policy,
            )),
            dispatcher: authoring_dispatcher,
            service: service.clone(),
        };

        let review = ReviewDomain {
            decisions: Arc::new(ReviewDecisionHandler::new(
                reviews,
                review_dispatcher.clone(),
                Arc::new(LocalWorkItemClient::new(service)),
                config.messaging.review_result_route(),
            )),
            dispatcher: review_dispatcher,
        };

        Self {
            config,
            bus,
            authoring,
            review,
            database: None,
        }
    }

    pub fn in_memory(config: EditorialConfig) -> Self {
        Self::assemble(
            config,
            Arc::new(InMemoryWorkItemStore::new()),
            Arc::new(InMemoryReviewStore::new()),
            Arc::new(InMemoryMessageBus::new()),
        )
    }

    /// PostgreSQL stores and queue on one pool
    pub async fn connect(config: EditorialConfig) -> WorkflowResult<Self> {
        let database = DatabaseConnection::connect(&config.database).await?;
        let pool = database.pool().clone();

        let mut system = Self::assemble(
            config,
            Arc::new(PgWorkItemStore::new(pool.clone())),
            Arc::new(PgReviewStore::new(pool.clone())),
            Arc::new(PgMessageBus::new(pool)),
        );
        system.database = Some(database);
        Ok(system)
    }

    /// Build for the configured backend
    pub async fn from_config(config: EditorialConfig) -> WorkflowResult<Self> {
        config
            .validate()
            .map_err(|e| WorkflowError::validation(e.to_string()))?;

        info!(
            environment = %config.environment,
            backend = ?config.backend,
            role = ?config.service.role,
            "Bootstrapping editorial system"
        );
        match config.backend {
            Backend::Memory => Ok(Self::in_memory(config)),
            Backend::Postgres => Self::connect(config).await,
        }
    }

    pub async fn from_config_manager(manager: &ConfigManager) -> WorkflowResult<Self> {
        Self::from_config(manager.config().clone()).await
    }

    /// Declare both queues and bind them to their routing keys
    pub async fn declare_topology(&self) -> WorkflowResult<()> {
        declare_review_topology(self.bus.as_ref(), &self.config.messaging).await?;
        Ok(())
    }

    pub fn config(&self) -> &EditorialConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    pub fn authoring(&self) -> &AuthoringDomain {
        &self.authoring
    }

    pub fn review(&self) -> &ReviewDomain {
        &self.review
    }

    pub fn database(&self) -> Option<&DatabaseConnection> {
        self.database.as_ref()
    }

    /// Spawn the consumers and dispatchers for the configured role
    pub fn start(&self) -> EditorialSystemHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let role = self.config.service.role;
        let mut tasks = Vec::new();

        if role.hosts_authoring() {
            let consumer = QueueConsumer::new(
                self.bus.clone(),
                self.authoring.results.clone(),
                &self.config.messaging.review_result_queue,
                self.config.consumer.clone(),
            );
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { consumer.run(rx).await }));

            let dispatcher = self.authoring.dispatcher.clone();
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { dispatcher.run(rx).await }));
        }

        if role.hosts_review() {
            let consumer = QueueConsumer::new(
                self.bus.clone(),
                self.review.decisions.clone(),
                &self.config.messaging.review_request_queue,
                self.config.consumer.clone(),
            );
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { consumer.run(rx).await }));

            let dispatcher = self.review.dispatcher.clone();
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { dispatcher.run(rx).await }));
        }

        info!(role = ?role, tasks = tasks.len(), "Editorial system started");
        EditorialSystemHandle {
            shutdown: shutdown_tx,
            tasks,
            role,
            environment: self.config.environment.clone(),
        }
    }
}

/// Lifecycle handle for the background loops
#[derive(Debug)]
pub struct EditorialSystemHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    role: ServiceRole,
    environment: String,
}

/// System status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub role: ServiceRole,
    pub background_tasks: usize,
}

impl EditorialSystemHandle {
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && self.tasks.iter().any(|task| !task.is_finished())
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.environment.clone(),
            role: self.role,
            background_tasks: self.tasks.len(),
        }
    }

    /// Signal every loop to stop and wait for them to finish
    pub async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            warn!("All background loops already exited");
        }
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Editorial system stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewWorkItem;
    use crate::state_machine::{ReviewDecision, WorkItemStatus};
    use std::time::Duration;

    fn fast_config(role: ServiceRole) -> EditorialConfig {
        let mut config = EditorialConfig::default();
        config.service.role = role;
        config.consumer.polling_interval_ms = 10;
        config.outbox.dispatch_interval_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_running_system_completes_review_cycle() {
        let system = EditorialSystem::from_config(fast_config(ServiceRole::All))
            .await
            .unwrap();
        system.declare_topology().await.unwrap();
        let handle = system.start();
        assert_eq!(handle.status().background_tasks, 4);

        let item = system
            .authoring()
            .service
            .create_post(NewWorkItem {
                title: "Title".to_string(),
                content: "Body".to_string(),
                author: "gabriel".to_string(),
            })
            .await
            .unwrap();
        system
            .authoring()
            .submissions
            .submit_for_review(item.id, "gabriel")
            .await
            .unwrap();

        let mut pending = Vec::new();
        for _ in 0..100 {
            pending = system.review().decisions.pending_reviews().await.unwrap();
            if !pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pending.len(), 1);

        system
            .review()
            .decisions
            .record_decision(item.id, "rita", ReviewDecision::Approved, None)
            .await
            .unwrap();

        let mut status = WorkItemStatus::Requested;
        for _ in 0..100 {
            status = system.authoring().service.get_post(item.id).await.unwrap().status;
            if status == WorkItemStatus::Published {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, WorkItemStatus::Published);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_role_limits_background_loops() {
        let system = EditorialSystem::in_memory(fast_config(ServiceRole::Review));
        system.declare_topology().await.unwrap();
        let handle = system.start();
        assert_eq!(handle.status().background_tasks, 2);
        assert_eq!(handle.status().role, ServiceRole::Review);
        handle.stop().await;
    }
}
