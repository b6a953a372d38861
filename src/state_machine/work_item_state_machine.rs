//! Transition table for the editorial lifecycle.
//!
//! ```text
//! DRAFT     --submit-----------> REQUESTED
//! REQUESTED --approve----------> PUBLISHED
//! REQUESTED --reject-----------> REJECTED
//! REJECTED  --edit-------------> DRAFT
//! DRAFT     --edit-------------> DRAFT
//! ```
//!
//! The table is pure. Stores enforce it atomically by passing
//! [`source_states`] as the expected set of a conditional transition.

use super::errors::{StateMachineError, StateMachineResult};
use super::events::WorkItemEvent;
use super::states::WorkItemStatus;

const SUBMIT_SOURCES: &[WorkItemStatus] = &[WorkItemStatus::Draft];
const REVIEW_SOURCES: &[WorkItemStatus] = &[WorkItemStatus::Requested];
const EDIT_SOURCES: &[WorkItemStatus] = &WorkItemStatus::EDITABLE;

/// States from which `event` may fire
pub fn source_states(event: &WorkItemEvent) -> &'static [WorkItemStatus] {
    match event {
        WorkItemEvent::Submit => SUBMIT_SOURCES,
        WorkItemEvent::ApplyReview(_) => REVIEW_SOURCES,
        WorkItemEvent::Edit => EDIT_SOURCES,
    }
}

/// State reached when `event` fires from any of its source states
pub fn target_state(event: &WorkItemEvent) -> WorkItemStatus {
    match event {
        WorkItemEvent::Submit => WorkItemStatus::Requested,
        WorkItemEvent::ApplyReview(decision) => decision.target_status(),
        WorkItemEvent::Edit => WorkItemStatus::Draft,
    }
}

/// Determine the target state based on current state and event
pub fn determine_target_state(
    current: WorkItemStatus,
    event: &WorkItemEvent,
) -> StateMachineResult<WorkItemStatus> {
    if source_states(event).contains(&current) {
        Ok(target_state(event))
    } else {
        Err(StateMachineError::invalid_transition(current, event))
    }
}
