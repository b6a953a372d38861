use crate::database::StoreError;
use crate::messaging::MessagingError;
use crate::models::WorkItemId;
use crate::state_machine::WorkItemStatus;
use thiserror::Error;

/// Errors surfaced by the workflow operations.
///
/// Nothing here is fatal to the process: callers either get the error back
/// or, for event consumption, it is logged and the delivery is settled
/// according to [`WorkflowError::is_permanent`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The item is not in a status the transition may fire from
    #[error("Invalid transition for work item {id}: {from} -> {to}")]
    InvalidTransition {
        id: WorkItemId,
        from: WorkItemStatus,
        to: WorkItemStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    /// A review result referenced an item that no longer exists
    #[error("Dangling reference: work item {id} does not exist")]
    DanglingReference { id: WorkItemId },

    #[error("Work item not found: {id}")]
    NotFound { id: WorkItemId },

    /// Broker unreachable or message unroutable; retried by infrastructure
    #[error("Transient delivery failure: {0}")]
    TransientDeliveryFailure(#[from] MessagingError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Map a failed conditional transition towards `to`
    pub fn from_transition(id: WorkItemId, to: WorkItemStatus, err: StoreError) -> Self {
        match err {
            StoreError::Conflict { actual, .. } => Self::InvalidTransition {
                id,
                from: actual,
                to,
            },
            other => other.into(),
        }
    }

    /// Retrying the same delivery may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientDeliveryFailure(_) => true,
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Retrying can never succeed; the delivery should be settled
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::NotFound { id },
            other => Self::Store(other),
        }
    }
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
