//! # Store Error Types
//!
//! Errors raised by the work item and review stores, in-memory and
//! PostgreSQL alike.

use crate::models::WorkItemId;
use crate::state_machine::WorkItemStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Conditional transition precondition failed; nothing was written
    #[error("Conflict on work item {id}: current status is {actual}")]
    Conflict {
        id: WorkItemId,
        actual: WorkItemStatus,
    },

    #[error("Work item not found: {id}")]
    NotFound { id: WorkItemId },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted row could not be mapped back to a domain value
    #[error("Corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn corrupt(id: impl ToString, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Failures that may clear up on their own, so the operation is worth retrying.
    ///
    /// Connection, pool and driver faults are transient, and so is any
    /// server error outside the SQLSTATE classes known to be permanent.
    /// Mapping and constraint failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => match err {
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::BeginFailed => true,
                sqlx::Error::Database(db_err) => db_err
                    .code()
                    .map_or(true, |code| is_transient_sqlstate(&code)),
                _ => false,
            },
            _ => false,
        }
    }
}

/// SQLSTATE classes that a retry can never fix
const PERMANENT_SQLSTATE_CLASSES: &[&str] = &[
    "0A", // feature_not_supported
    "22", // data_exception
    "23", // integrity_constraint_violation
    "28", // invalid_authorization_specification
    "42", // syntax_error_or_access_rule_violation
    "P0", // plpgsql_error
];

pub(crate) fn is_transient_sqlstate(code: &str) -> bool {
    let class = code.get(..2).unwrap_or(code);
    !PERMANENT_SQLSTATE_CLASSES.contains(&class)
}

pub type StoreResult<T> = Result<T, StoreError>;
