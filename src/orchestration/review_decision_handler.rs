//! # Review Decision Handler
//!
//! Review-domain side of the choreography. Review-request events become
//! pending reviews; a reviewer decision is validated, appended to the
//! review history and announced with a review-result event through the
//! review outbox. Work items are never written from here.
//!
//! A decision is bound to the review cycle of the submission it judges.
//! The cycle comes from the pending review when one exists, then from the
//! post's latest recorded decision, and finally from the authoring domain.

use super::outbox_dispatcher::OutboxDispatcher;
use super::work_item_client::WorkItemClient;
use crate::constants::operations;
use crate::database::{NewOutboxMessage, ReviewStore};
use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::log_workflow_operation;
use crate::messaging::{Delivery, MessageHandler, ReviewRequestEvent, ReviewResultEvent, Route};
use crate::models::{NewReviewRecord, PendingReview, ReviewRecord, WorkItem, WorkItemId};
use crate::state_machine::{ReviewDecision, WorkItemStatus};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Timestamps that survive a round trip through a microsecond column
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub struct ReviewDecisionHandler {
    store: Arc<dyn ReviewStore>,
    dispatcher: Arc<OutboxDispatcher<dyn ReviewStore>>,
    work_items: Arc<dyn WorkItemClient>,
    result_route: Route,
}

impl std::fmt::Debug for ReviewDecisionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewDecisionHandler")
            .field("result_route", &self.result_route)
            .finish_non_exhaustive()
    }
}

impl ReviewDecisionHandler {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        dispatcher: Arc<OutboxDispatcher<dyn ReviewStore>>,
        work_items: Arc<dyn WorkItemClient>,
        result_route: Route,
    ) -> Self {
        Self {
            store,
            dispatcher,
            work_items,
            result_route,
        }
    }

    /// Make a requested post visible to reviewers; safe to repeat
    #[instrument(skip(self, event), fields(work_item_id = %event.post_id))]
    pub async fn on_review_request(&self, event: &ReviewRequestEvent) -> WorkflowResult<bool> {
        let inserted = self
            .store
            .upsert_pending(PendingReview {
                post_id: event.post_id,
                review_cycle: event.review_cycle,
                title: event.title.clone(),
                content: event.content.clone(),
                author: event.author.clone(),
                requested_at: stored_now(),
            })
            .await?;

        if inserted {
            info!(
                work_item_id = %event.post_id,
                author = %event.author,
                review_cycle = %event.review_cycle,
                "Review requested"
            );
        } else {
            debug!(work_item_id = %event.post_id, "Review request redelivered - pending entry refreshed");
        }
        log_workflow_operation(
            operations::RECEIVE_REVIEW_REQUEST,
            Some(event.post_id),
            if inserted { "pending" } else { "refreshed" },
            None,
        );
        Ok(inserted)
    }

    /// Persist a reviewer decision and emit the matching review-result event
    #[instrument(skip(self, comment))]
    pub async fn record_decision(
        &self,
        post_id: WorkItemId,
        reviewer: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> WorkflowResult<ReviewRecord> {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(WorkflowError::validation("reviewer must not be blank"));
        }

        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if decision.requires_comment() && comment.is_none() {
            return Err(WorkflowError::validation(
                "a comment is required when rejecting a post",
            ));
        }

        let review_cycle = self.review_cycle_for(post_id).await?;
        let record = ReviewRecord::from_new(
            NewReviewRecord {
                post_id,
                review_cycle,
                reviewer: reviewer.to_string(),
                decision,
                comment,
            },
            stored_now(),
        );
        let message = NewOutboxMessage::json(&self.result_route, &ReviewResultEvent::from(&record))?;
        let record = self.store.append(record, Some(message)).await?;

        info!(
            work_item_id = %post_id,
            reviewer = %record.reviewer,
            decision = %decision,
            review_cycle = %review_cycle,
            target_status = %decision.target_status(),
            "Review decision recorded"
        );
        log_workflow_operation(
            operations::RECORD_DECISION,
            Some(post_id),
            decision.as_str(),
            Some(&record.reviewer),
        );

        self.dispatcher.drain_after_commit().await;
        Ok(record)
    }

    async fn review_cycle_for(&self, post_id: WorkItemId) -> WorkflowResult<Uuid> {
        if let Some(pending) = self.store.pending_review(post_id).await? {
            return Ok(pending.review_cycle);
        }
        if let Some(latest) = self.store.reviews_for_post(post_id).await?.first() {
            return Ok(latest.review_cycle);
        }

        let item = self.work_items.get_work_item(post_id).await?;
        item.review_cycle.ok_or_else(|| {
            WorkflowError::validation("post has never been submitted for review")
        })
    }

    /// Review history for a post, newest first
    pub async fn reviews_for_post(&self, post_id: WorkItemId) -> WorkflowResult<Vec<ReviewRecord>> {
        Ok(self.store.reviews_for_post(post_id).await?)
    }

    pub async fn pending_reviews(&self) -> WorkflowResult<Vec<PendingReview>> {
        Ok(self.store.pending_reviews().await?)
    }

    /// Posts currently awaiting review, read from the authoring domain
    pub async fn requested_posts(&self) -> WorkflowResult<Vec<WorkItem>> {
        self.work_items
            .list_by_status(WorkItemStatus::Requested)
            .await
    }
}

#[async_trait]
impl MessageHandler for ReviewDecisionHandler {
    fn name(&self) -> &'static str {
        "review_request_listener"
    }

    async fn handle(&self, delivery: &Delivery) -> WorkflowResult<()> {
        let event: ReviewRequestEvent = delivery.decode()?;
        self.on_review_request(&event).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemoryReviewStore, InMemoryWorkItemStore};
    use crate::messaging::{InMemoryMessageBus, MessageBus};
    use crate::models::NewWorkItem;
    use crate::orchestration::{AuthoringService, LocalWorkItemClient};
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryReviewStore>,
        bus: Arc<InMemoryMessageBus>,
        authoring: AuthoringService,
        handler: ReviewDecisionHandler,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryReviewStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        bus.declare_queue("results").await.unwrap();
        bus.bind("post.review.exchange", "post.review.result", "results")
            .await
            .unwrap();

        let dyn_store: Arc<dyn ReviewStore> = store.clone();
        let dispatcher = Arc::new(OutboxDispatcher::new(
            "review",
            dyn_store.clone(),
            bus.clone() as Arc<dyn MessageBus>,
            10,
            Duration::from_millis(10),
        ));
        let authoring = AuthoringService::new(Arc::new(InMemoryWorkItemStore::new()));
        let handler = ReviewDecisionHandler::new(
            dyn_store,
            dispatcher,
            Arc::new(LocalWorkItemClient::new(authoring.clone())),
            Route::new("post.review.exchange", "post.review.result"),
        );
        Fixture {
            store,
            bus,
            authoring,
            handler,
        }
    }

    fn request(post_id: WorkItemId) -> ReviewRequestEvent {
        ReviewRequestEvent {
            post_id,
            review_cycle: Uuid::new_v4(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            author: "gabriel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejection_without_comment_creates_nothing() {
        let f = fixture().await;
        let post_id = Uuid::new_v4();

        for comment in [None, Some(""), Some("   ")] {
            let err = f
                .handler
                .record_decision(post_id, "rita", ReviewDecision::Rejected, comment)
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)));
        }
        assert_eq!(f.store.record_count(), 0);
        assert_eq!(f.bus.queue_depth("results"), 0);
    }

    #[tokio::test]
    async fn test_blank_reviewer_is_rejected() {
        let f = fixture().await;
        let err = f
            .handler
            .record_decision(Uuid::new_v4(), " ", ReviewDecision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approval_publishes_result_and_clears_pending() {
        let f = fixture().await;
        let post_id = Uuid::new_v4();
        let request = request(post_id);
        f.handler.on_review_request(&request).await.unwrap();
        assert_eq!(f.handler.pending_reviews().await.unwrap().len(), 1);

        let record = f
            .handler
            .record_decision(post_id, "rita", ReviewDecision::Approved, Some("  "))
            .await
            .unwrap();
        assert_eq!(record.comment, None);
        assert!(f.handler.pending_reviews().await.unwrap().is_empty());

        let published = f.bus.peek("results");
        assert_eq!(published.len(), 1);
        let event: ReviewResultEvent = serde_json::from_value(published[0].clone()).unwrap();
        assert_eq!(event.decision, ReviewDecision::Approved);
        assert_eq!(event.reviewed_at, record.created_at);
        assert_eq!(event.review_cycle, request.review_cycle);
        assert_eq!(record.review_cycle, request.review_cycle);
        assert_eq!(event.target_status(), WorkItemStatus::Published);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let f = fixture().await;
        let post_id = Uuid::new_v4();
        let request = request(post_id);
        f.handler.on_review_request(&request).await.unwrap();
        f.handler
            .record_decision(post_id, "rita", ReviewDecision::Rejected, Some("needs rework"))
            .await
            .unwrap();
        f.handler
            .record_decision(post_id, "rita", ReviewDecision::Approved, None)
            .await
            .unwrap();

        let history = f.handler.reviews_for_post(post_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].decision, ReviewDecision::Approved);
        assert_eq!(history[1].comment.as_deref(), Some("needs rework"));
        assert!(history
            .iter()
            .all(|record| record.review_cycle == request.review_cycle));
    }

    #[tokio::test]
    async fn test_decision_without_request_uses_the_posts_current_cycle() {
        let f = fixture().await;
        let post = f
            .authoring
            .create_post(NewWorkItem {
                title: "Title".to_string(),
                content: "Body".to_string(),
                author: "gabriel".to_string(),
            })
            .await
            .unwrap();

        let err = f
            .handler
            .record_decision(post.id, "rita", ReviewDecision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err = f
            .handler
            .record_decision(Uuid::new_v4(), "rita", ReviewDecision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
        assert_eq!(f.store.record_count(), 0);
        assert_eq!(f.bus.queue_depth("results"), 0);
    }

    #[tokio::test]
    async fn test_refreshed_request_moves_decisions_to_the_new_cycle() {
        let f = fixture().await;
        let post_id = Uuid::new_v4();
        f.handler.on_review_request(&request(post_id)).await.unwrap();
        let resubmission = request(post_id);
        f.handler.on_review_request(&resubmission).await.unwrap();

        let record = f
            .handler
            .record_decision(post_id, "rita", ReviewDecision::Approved, None)
            .await
            .unwrap();
        assert_eq!(record.review_cycle, resubmission.review_cycle);
    }

    #[tokio::test]
    async fn test_redelivered_request_is_idempotent() {
        let f = fixture().await;
        let post_id = Uuid::new_v4();
        assert!(f.handler.on_review_request(&request(post_id)).await.unwrap());
        assert!(!f.handler.on_review_request(&request(post_id)).await.unwrap());
        assert_eq!(f.handler.pending_reviews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_request_is_permanent() {
        let f = fixture().await;
        let delivery = Delivery {
            delivery_id: 1,
            queue: "requests".to_string(),
            payload: serde_json::json!({"unexpected": true}),
            delivery_count: 1,
            enqueued_at: Utc::now(),
        };
        let err = f.handler.handle(&delivery).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
