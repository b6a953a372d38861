//! # System Constants
//!
//! Default routing names, loop tunables and the operation names used in
//! structured log lines.

// Re-export state types for convenience
pub use crate::state_machine::{ReviewDecision, WorkItemStatus};

/// Broker routing defaults, matching the names the services were deployed with
pub mod messaging {
    pub const DEFAULT_EXCHANGE: &str = "post.review.exchange";
    pub const REVIEW_REQUEST_ROUTING_KEY: &str = "post.review.request";
    pub const REVIEW_RESULT_ROUTING_KEY: &str = "post.review.result";
    pub const REVIEW_REQUEST_QUEUE: &str = "post.review.request.queue";
    pub const REVIEW_RESULT_QUEUE: &str = "post.review.result.queue";
}

/// Tunables for the background loops
pub mod system {
    pub const DEFAULT_CONSUMER_BATCH_SIZE: usize = 10;
    pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_MAX_DELIVERIES: u32 = 5;
    pub const DEFAULT_OUTBOX_BATCH_SIZE: usize = 50;
    pub const DEFAULT_OUTBOX_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 5;
}

/// Outbox owner tags, one per domain store
pub mod domains {
    pub const AUTHORING: &str = "authoring";
    pub const REVIEW: &str = "review";
}

/// Operation names for structured logging
pub mod operations {
    pub const CREATE_POST: &str = "create_post";
    pub const UPDATE_POST: &str = "update_post";
    pub const DELETE_POST: &str = "delete_post";
    pub const SET_STATUS: &str = "set_status";
    pub const SUBMIT_FOR_REVIEW: &str = "submit_for_review";
    pub const RECEIVE_REVIEW_REQUEST: &str = "receive_review_request";
    pub const RECORD_DECISION: &str = "record_decision";
    pub const APPLY_REVIEW_RESULT: &str = "apply_review_result";
    pub const DISPATCH_OUTBOX: &str = "dispatch_outbox";
}
