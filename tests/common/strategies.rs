use chrono::{DateTime, TimeZone, Utc};
use editorial_workflow::state_machine::{ReviewDecision, WorkItemEvent, WorkItemStatus};
use proptest::prelude::*;

pub fn status_strategy() -> impl Strategy<Value = WorkItemStatus> {
    prop::sample::select(WorkItemStatus::ALL.to_vec())
}

pub fn decision_strategy() -> impl Strategy<Value = ReviewDecision> {
    prop_oneof![Just(ReviewDecision::Approved), Just(ReviewDecision::Rejected)]
}

pub fn event_strategy() -> impl Strategy<Value = WorkItemEvent> {
    prop_oneof![
        Just(WorkItemEvent::Submit),
        Just(WorkItemEvent::Edit),
        decision_strategy().prop_map(WorkItemEvent::ApplyReview),
    ]
}

/// Reviewer names are never blank
pub fn reviewer_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

pub fn comment_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z][a-zA-Z0-9 .,!?]{0,80}")
}

/// Whitespace-only or empty comments
pub fn blank_comment_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[ \t\n]{0,8}")
}

pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..1_900_000_000i64)
        .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
}
