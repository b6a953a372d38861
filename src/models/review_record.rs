//! # Review Record Model
//!
//! Append-only audit entry owned by the review domain. One record is written
//! per reviewer decision; records are never updated and a post may have any
//! number of them.

use super::work_item::WorkItemId;
use crate::state_machine::ReviewDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: Uuid,
    /// Reference into the authoring domain; not an ownership link
    pub post_id: WorkItemId,
    /// Submission of the post this decision was made for
    pub review_cycle: Uuid,
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new review record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReviewRecord {
    pub post_id: WorkItemId,
    pub review_cycle: Uuid,
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub comment: Option<String>,
}

impl ReviewRecord {
    pub fn from_new(new: NewReviewRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id: new.post_id,
            review_cycle: new.review_cycle,
            reviewer: new.reviewer,
            decision: new.decision,
            comment: new.comment,
            created_at,
        }
    }
}

/// A post waiting in the reviewers' queue.
///
/// Projection of a review-request event; keyed by post so that redelivered
/// requests overwrite instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReview {
    pub post_id: WorkItemId,
    pub review_cycle: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub requested_at: DateTime<Utc>,
}
