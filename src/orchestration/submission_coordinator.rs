//! # Submission Coordinator
//!
//! Moves a draft into REQUESTED and emits exactly one review-request event
//! per successful transition. The event is written to the authoring
//! outbox in the same atomic operation as the status change, then an
//! immediate drain publishes it. A failed publish never rolls the
//! transition back; the background dispatcher retries it.

use super::outbox_dispatcher::OutboxDispatcher;
use crate::constants::operations;
use crate::database::{NewOutboxMessage, Transition, WorkItemStore};
use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::log_workflow_operation;
use crate::messaging::{ReviewRequestEvent, Route};
use crate::models::{WorkItem, WorkItemId};
use crate::state_machine::{WorkItemEvent, WorkItemStatus};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct SubmissionCoordinator {
    store: Arc<dyn WorkItemStore>,
    dispatcher: Arc<OutboxDispatcher<dyn WorkItemStore>>,
    request_route: Route,
}

impl std::fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("request_route", &self.request_route)
            .finish_non_exhaustive()
    }
}

impl SubmissionCoordinator {
    pub fn new(
        store: Arc<dyn WorkItemStore>,
        dispatcher: Arc<OutboxDispatcher<dyn WorkItemStore>>,
        request_route: Route,
    ) -> Self {
        Self {
            store,
            dispatcher,
            request_route,
        }
    }

    /// DRAFT → REQUESTED plus one review-request event.
    ///
    /// Every submission opens a new review cycle; the event carries its id
    /// and only results echoing it are applied back. The caller has already checked that `actor` owns the item; it is
    /// only recorded in the logs.
    #[instrument(skip(self), fields(work_item_id = %id))]
    pub async fn submit_for_review(&self, id: WorkItemId, actor: &str) -> WorkflowResult<WorkItem> {
        let route = &self.request_route;
        let review_cycle = Uuid::new_v4();
        let transition = Transition::for_event(&WorkItemEvent::Submit)
            .with_mutator(move |item| item.review_cycle = Some(review_cycle))
            .with_outbox(move |item| {
                NewOutboxMessage::json(route, &ReviewRequestEvent::new(item, review_cycle))
            });

        let item = self
            .store
            .conditional_transition(id, transition)
            .await
            .map_err(|e| WorkflowError::from_transition(id, WorkItemStatus::Requested, e))?;

        info!(
            work_item_id = %id,
            actor = %actor,
            review_cycle = %review_cycle,
            routing_key = %route.routing_key,
            "Work item submitted for review"
        );
        log_workflow_operation(
            operations::SUBMIT_FOR_REVIEW,
            Some(id),
            item.status.as_str(),
            Some(actor),
        );

        self.dispatcher.drain_after_commit().await;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryWorkItemStore;
    use crate::messaging::{InMemoryMessageBus, MessageBus};
    use crate::models::NewWorkItem;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryWorkItemStore>,
        bus: Arc<InMemoryMessageBus>,
        coordinator: SubmissionCoordinator,
    }

    async fn fixture(bind: bool) -> Fixture {
        let store = Arc::new(InMemoryWorkItemStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        if bind {
            bus.declare_queue("requests").await.unwrap();
            bus.bind("post.review.exchange", "post.review.request", "requests")
                .await
                .unwrap();
        }
        let dyn_store: Arc<dyn WorkItemStore> = store.clone();
        let dispatcher = Arc::new(OutboxDispatcher::new(
            "authoring",
            dyn_store.clone(),
            bus.clone() as Arc<dyn MessageBus>,
            10,
            Duration::from_millis(10),
        ));
        let coordinator = SubmissionCoordinator::new(
            dyn_store,
            dispatcher,
            Route::new("post.review.exchange", "post.review.request"),
        );
        Fixture {
            store,
            bus,
            coordinator,
        }
    }

    async fn draft(store: &InMemoryWorkItemStore) -> WorkItem {
        store
            .create(NewWorkItem {
                title: "Title".to_string(),
                content: "Body".to_string(),
                author: "gabriel".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_publishes_one_request() {
        let f = fixture(true).await;
        let item = draft(&f.store).await;

        let submitted = f.coordinator.submit_for_review(item.id, "gabriel").await.unwrap();
        assert_eq!(submitted.status, WorkItemStatus::Requested);

        let published = f.bus.peek("requests");
        assert_eq!(published.len(), 1);
        let event: ReviewRequestEvent = serde_json::from_value(published[0].clone()).unwrap();
        assert_eq!(submitted.review_cycle, Some(event.review_cycle));
        assert_eq!(
            event,
            ReviewRequestEvent::new(&submitted, event.review_cycle)
        );
    }

    #[tokio::test]
    async fn test_resubmission_opens_a_new_cycle() {
        let f = fixture(true).await;
        let item = draft(&f.store).await;
        let first = f.coordinator.submit_for_review(item.id, "gabriel").await.unwrap();

        f.store
            .conditional_transition(item.id, Transition::overwrite(WorkItemStatus::Draft))
            .await
            .unwrap();
        let second = f.coordinator.submit_for_review(item.id, "gabriel").await.unwrap();

        assert!(first.review_cycle.is_some());
        assert_ne!(first.review_cycle, second.review_cycle);
        let cycles: Vec<_> = f
            .bus
            .peek("requests")
            .into_iter()
            .map(|payload| serde_json::from_value::<ReviewRequestEvent>(payload).unwrap())
            .map(|event| Some(event.review_cycle))
            .collect();
        assert_eq!(cycles, vec![first.review_cycle, second.review_cycle]);
    }

    #[tokio::test]
    async fn test_second_submit_is_invalid_and_silent() {
        let f = fixture(true).await;
        let item = draft(&f.store).await;
        f.coordinator.submit_for_review(item.id, "gabriel").await.unwrap();

        let err = f
            .coordinator
            .submit_for_review(item.id, "gabriel")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: WorkItemStatus::Requested,
                to: WorkItemStatus::Requested,
                ..
            }
        ));
        assert_eq!(f.bus.queue_depth("requests"), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_transition() {
        let f = fixture(false).await;
        let item = draft(&f.store).await;

        let submitted = f.coordinator.submit_for_review(item.id, "gabriel").await.unwrap();
        assert_eq!(submitted.status, WorkItemStatus::Requested);
        assert_eq!(f.store.outbox().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_missing_item() {
        let f = fixture(true).await;
        let err = f
            .coordinator
            .submit_for_review(uuid::Uuid::new_v4(), "gabriel")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }
}
