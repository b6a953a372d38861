use editorial_workflow::config::{EditorialConfig, ResultApplyPolicy};
use editorial_workflow::database::{InMemoryReviewStore, InMemoryWorkItemStore};
use editorial_workflow::messaging::{InMemoryMessageBus, MessageBus, QueueConsumer};
use editorial_workflow::models::{NewWorkItem, WorkItem};
use editorial_workflow::orchestration::{EditorialSystem, ResultConsumer, ReviewDecisionHandler};
use std::sync::Arc;

/// Both domains wired over in-memory stores and bus, with typed handles
/// kept for inspection
pub struct TestSystem {
    pub system: EditorialSystem,
    pub bus: Arc<InMemoryMessageBus>,
    pub work_items: Arc<InMemoryWorkItemStore>,
    pub reviews: Arc<InMemoryReviewStore>,
}

pub fn test_config(policy: ResultApplyPolicy) -> EditorialConfig {
    let mut config = EditorialConfig::default();
    config.environment = "test".to_string();
    config.review.result_policy = policy;
    config.consumer.batch_size = 10;
    config.consumer.max_deliveries = 3;
    config
}

impl TestSystem {
    /// Wired but with no queues declared or bound
    pub fn without_topology(policy: ResultApplyPolicy) -> Self {
        let bus = Arc::new(InMemoryMessageBus::new());
        let work_items = Arc::new(InMemoryWorkItemStore::new());
        let reviews = Arc::new(InMemoryReviewStore::new());
        let system = EditorialSystem::assemble(
            test_config(policy),
            work_items.clone(),
            reviews.clone(),
            bus.clone(),
        );
        Self {
            system,
            bus,
            work_items,
            reviews,
        }
    }

    pub async fn new(policy: ResultApplyPolicy) -> Self {
        let harness = Self::without_topology(policy);
        harness
            .system
            .declare_topology()
            .await
            .expect("topology declaration");
        harness
    }

    pub fn request_queue(&self) -> &str {
        &self.system.config().messaging.review_request_queue
    }

    pub fn result_queue(&self) -> &str {
        &self.system.config().messaging.review_result_queue
    }

    pub fn request_consumer(&self) -> QueueConsumer<ReviewDecisionHandler> {
        QueueConsumer::new(
            self.bus.clone() as Arc<dyn MessageBus>,
            self.system.review().decisions.clone(),
            self.request_queue(),
            self.system.config().consumer.clone(),
        )
    }

    pub fn result_consumer(&self) -> QueueConsumer<ResultConsumer> {
        QueueConsumer::new(
            self.bus.clone() as Arc<dyn MessageBus>,
            self.system.authoring().results.clone(),
            self.result_queue(),
            self.system.config().consumer.clone(),
        )
    }

    pub async fn draft(&self, title: &str) -> WorkItem {
        self.system
            .authoring()
            .service
            .create_post(NewWorkItem {
                title: title.to_string(),
                content: format!("{title} body"),
                author: "gabriel".to_string(),
            })
            .await
            .expect("draft creation")
    }

    /// Create, submit and deliver the review request to the review domain
    pub async fn requested(&self, title: &str) -> WorkItem {
        let item = self.draft(title).await;
        let item = self
            .system
            .authoring()
            .submissions
            .submit_for_review(item.id, "gabriel")
            .await
            .expect("submission");
        let summary = self
            .request_consumer()
            .process_batch()
            .await
            .expect("request delivery");
        assert_eq!(summary.acked, 1);
        item
    }

    pub async fn current(&self, item: &WorkItem) -> WorkItem {
        self.system
            .authoring()
            .service
            .get_post(item.id)
            .await
            .expect("work item lookup")
    }
}
