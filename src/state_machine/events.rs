use super::states::ReviewDecision;
use serde::{Deserialize, Serialize};

/// Events that can trigger work item state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkItemEvent {
    /// Author submits the draft for review
    Submit,
    /// A review result arrived from the review domain
    ApplyReview(ReviewDecision),
    /// Author edits title, content or author
    Edit,
}

impl WorkItemEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::ApplyReview(ReviewDecision::Approved) => "approve",
            Self::ApplyReview(ReviewDecision::Rejected) => "reject",
            Self::Edit => "edit",
        }
    }

    /// Extract the review decision if this is a review event
    pub fn decision(&self) -> Option<ReviewDecision> {
        match self {
            Self::ApplyReview(decision) => Some(*decision),
            _ => None,
        }
    }
}
