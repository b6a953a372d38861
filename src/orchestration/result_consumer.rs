//! # Result Consumer
//!
//! Applies review-result events to work items in the authoring domain.
//!
//! Results arrive at least once and possibly out of order, so applying
//! one is idempotent: the transition is conditional on REQUESTED and on
//! the item still being in the review cycle the result was decided for.
//! A result the item already reflects is reported as
//! [`ApplyOutcome::Duplicate`]. A result for an item that has moved on is
//! [`ApplyOutcome::Stale`], whether it was re-edited or re-submitted into a
//! new cycle. Both are acknowledged no-ops.
//!
//! With [`ResultApplyPolicy::Overwrite`] the status is applied whatever
//! the current status is, except for exact duplicates. The review cycle
//! must still match.

use crate::config::ResultApplyPolicy;
use crate::constants::operations;
use crate::database::{StoreError, Transition, WorkItemStore};
use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::log_workflow_operation;
use crate::messaging::{Delivery, MessageHandler, ReviewResultEvent};
use crate::models::WorkItem;
use crate::state_machine::{WorkItemEvent, WorkItemStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The item transitioned and now carries this result
    Applied(WorkItem),
    /// The item already reflected this exact result
    Duplicate,
    /// The item is no longer awaiting this result
    Stale { actual: WorkItemStatus },
}

pub struct ResultConsumer {
    store: Arc<dyn WorkItemStore>,
    policy: ResultApplyPolicy,
}

impl std::fmt::Debug for ResultConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultConsumer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResultConsumer {
    pub fn new(store: Arc<dyn WorkItemStore>, policy: ResultApplyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ResultApplyPolicy {
        self.policy
    }

    #[instrument(skip(self, event), fields(work_item_id = %event.post_id, decision = %event.decision))]
    pub async fn apply_review_result(&self, event: &ReviewResultEvent) -> WorkflowResult<ApplyOutcome> {
        let outcome = match self.policy {
            ResultApplyPolicy::RequireRequested => self.apply_from_requested(event).await,
            ResultApplyPolicy::Overwrite => self.apply_overwrite(event).await,
        };

        match &outcome {
            Ok(ApplyOutcome::Applied(item)) => {
                info!(
                    work_item_id = %item.id,
                    status = %item.status,
                    reviewer = %event.reviewer,
                    "Review result applied"
                );
                log_workflow_operation(
                    operations::APPLY_REVIEW_RESULT,
                    Some(item.id),
                    item.status.as_str(),
                    Some(&event.reviewer),
                );
            }
            Ok(ApplyOutcome::Duplicate) => {
                debug!(work_item_id = %event.post_id, "Duplicate review result ignored");
            }
            Ok(ApplyOutcome::Stale { actual }) => {
                warn!(
                    work_item_id = %event.post_id,
                    review_cycle = %event.review_cycle,
                    actual_status = %actual,
                    target_status = %event.target_status(),
                    reviewed_at = %event.reviewed_at,
                    "Stale review result ignored"
                );
            }
            Err(WorkflowError::DanglingReference { id }) => {
                warn!(work_item_id = %id, "Review result for unknown work item discarded");
            }
            Err(_) => {}
        }
        outcome
    }

    fn side_record(event: &ReviewResultEvent) -> impl Fn(&mut WorkItem) + Send + Sync + '_ {
        move |item| {
            item.record_review(
                event.decision,
                &event.reviewer,
                event.comment.as_deref(),
                event.reviewed_at,
            )
        }
    }

    fn reflects(item: &WorkItem, event: &ReviewResultEvent) -> bool {
        item.reflects_review(
            event.review_cycle,
            event.decision,
            &event.reviewer,
            event.comment.as_deref(),
            event.reviewed_at,
        )
    }

    async fn apply_from_requested(&self, event: &ReviewResultEvent) -> WorkflowResult<ApplyOutcome> {
        let id = event.post_id;
        let cycle = event.review_cycle;
        let transition = Transition::for_event(&WorkItemEvent::ApplyReview(event.decision))
            .with_guard(move |item| item.is_in_review_cycle(cycle))
            .with_mutator(Self::side_record(event));

        match self.store.conditional_transition(id, transition).await {
            Ok(item) => Ok(ApplyOutcome::Applied(item)),
            Err(StoreError::NotFound { id }) => Err(WorkflowError::DanglingReference { id }),
            Err(StoreError::Conflict { actual, .. }) => {
                let current = self.current(event).await?;
                if Self::reflects(&current, event) {
                    Ok(ApplyOutcome::Duplicate)
                } else {
                    Ok(ApplyOutcome::Stale { actual })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_overwrite(&self, event: &ReviewResultEvent) -> WorkflowResult<ApplyOutcome> {
        let id = event.post_id;
        if Self::reflects(&self.current(event).await?, event) {
            return Ok(ApplyOutcome::Duplicate);
        }

        let cycle = event.review_cycle;
        let transition = Transition::overwrite(event.target_status())
            .with_guard(move |item| item.is_in_review_cycle(cycle))
            .with_mutator(Self::side_record(event));
        match self.store.conditional_transition(id, transition).await {
            Ok(item) => Ok(ApplyOutcome::Applied(item)),
            Err(StoreError::NotFound { id }) => Err(WorkflowError::DanglingReference { id }),
            Err(StoreError::Conflict { actual, .. }) => Ok(ApplyOutcome::Stale { actual }),
            Err(e) => Err(e.into()),
        }
    }

    async fn current(&self, event: &ReviewResultEvent) -> WorkflowResult<WorkItem> {
        match self.store.get(event.post_id).await {
            Ok(item) => Ok(item),
            Err(StoreError::NotFound { id }) => Err(WorkflowError::DanglingReference { id }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MessageHandler for ResultConsumer {
    fn name(&self) -> &'static str {
        "review_result_listener"
    }

    async fn handle(&self, delivery: &Delivery) -> WorkflowResult<()> {
        let event: ReviewResultEvent = delivery.decode()?;
        if delivery.is_redelivery() {
            debug!(
                work_item_id = %event.post_id,
                delivery_count = delivery.delivery_count,
                "Handling redelivered review result"
            );
        }
        self.apply_review_result(&event).await.map(|_| ())
    }
}
