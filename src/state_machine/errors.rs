use super::events::WorkItemEvent;
use super::states::WorkItemStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition: {event} is not allowed from {from}")]
    InvalidTransition {
        from: WorkItemStatus,
        event: &'static str,
    },
}

impl StateMachineError {
    pub fn invalid_transition(from: WorkItemStatus, event: &WorkItemEvent) -> Self {
        Self::InvalidTransition {
            from,
            event: event.event_type(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
