//! # Work Item Model
//!
//! The editorial post as owned by the authoring domain.
//!
//! ## Overview
//!
//! A `WorkItem` carries the post content, its lifecycle status and the
//! outcome of the most recent review cycle. The review domain never writes
//! this record; it only learns about it through review-request events and
//! the synchronous `WorkItemClient`, and influences it through
//! review-result events consumed back into the authoring domain.
//!
//! ## Database Schema
//!
//! Maps to `editorial_work_items`:
//! - `id`: UUID primary key
//! - `status`: VARCHAR holding `DRAFT | REQUESTED | PUBLISHED | REJECTED`
//! - `review_cycle`: UUID minted on every submission, NULL for never-submitted drafts
//! - `last_review_*`: NULL until the first review result is applied

use crate::state_machine::{ReviewDecision, WorkItemStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, immutable identity of a work item
pub type WorkItemId = Uuid;

/// An editorial post and its workflow state.
///
/// `last_review_decision` is `Some` if and only if at least one review
/// result has been applied to the item. `review_cycle` identifies the
/// current submission; a review result only lands on the cycle it was
/// decided for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub status: WorkItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub review_cycle: Option<Uuid>,
    pub last_review_decision: Option<ReviewDecision>,
    pub last_review_comment: Option<String>,
    pub last_review_reviewer: Option<String>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// New work item for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkItem {
    pub title: String,
    pub content: String,
    pub author: String,
}

/// Partial content update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
}

impl WorkItem {
    /// Materialize a freshly created draft
    pub fn from_new(id: WorkItemId, new: NewWorkItem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            content: new.content,
            author: new.author,
            status: WorkItemStatus::Draft,
            created_at: now,
            updated_at: now,
            review_cycle: None,
            last_review_decision: None,
            last_review_comment: None,
            last_review_reviewer: None,
            last_reviewed_at: None,
        }
    }

    pub fn apply_edit(&mut self, edit: &ContentEdit) {
        if let Some(title) = &edit.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &edit.content {
            self.content.clone_from(content);
        }
        if let Some(author) = &edit.author {
            self.author.clone_from(author);
        }
    }

    pub fn is_in_review_cycle(&self, cycle: Uuid) -> bool {
        self.review_cycle == Some(cycle)
    }

    /// Overwrite the last-review side record
    pub fn record_review(
        &mut self,
        decision: ReviewDecision,
        reviewer: &str,
        comment: Option<&str>,
        reviewed_at: DateTime<Utc>,
    ) {
        self.last_review_decision = Some(decision);
        self.last_review_reviewer = Some(reviewer.to_string());
        self.last_review_comment = comment.map(str::to_string);
        self.last_reviewed_at = Some(reviewed_at);
    }

    /// True when this item already carries exactly the given review outcome
    /// for the given cycle
    pub fn reflects_review(
        &self,
        cycle: Uuid,
        decision: ReviewDecision,
        reviewer: &str,
        comment: Option<&str>,
        reviewed_at: DateTime<Utc>,
    ) -> bool {
        self.is_in_review_cycle(cycle)
            && self.status == decision.target_status()
            && self.last_review_decision == Some(decision)
            && self.last_review_reviewer.as_deref() == Some(reviewer)
            && self.last_review_comment.as_deref() == comment
            && self.last_reviewed_at == Some(reviewed_at)
    }

    pub fn has_been_reviewed(&self) -> bool {
        self.last_review_decision.is_some()
    }
}

/// Filter over published posts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Case-insensitive substring of title or content
    pub text: Option<String>,
    /// Case-insensitive substring of author
    pub author: Option<String>,
    /// Inclusive lower bound on the creation date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date
    pub to: Option<NaiveDate>,
}

impl SearchCriteria {
    pub fn matches(&self, item: &WorkItem) -> bool {
        if let Some(text) = non_blank(&self.text) {
            let needle = text.to_lowercase();
            if !item.title.to_lowercase().contains(&needle)
                && !item.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(author) = non_blank(&self.author) {
            if !item
                .author
                .to_lowercase()
                .contains(&author.to_lowercase())
            {
                return false;
            }
        }

        let created = item.created_at.date_naive();
        self.from.map_or(true, |from| created >= from) && self.to.map_or(true, |to| created <= to)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(now: DateTime<Utc>) -> WorkItem {
        WorkItem::from_new(
            Uuid::new_v4(),
            NewWorkItem {
                title: "Rust in Production".to_string(),
                content: "Ownership makes refactors boring".to_string(),
                author: "Gabriel".to_string(),
            },
            now,
        )
    }

    #[test]
    fn test_new_item_is_unreviewed_draft() {
        let item = sample(Utc::now());
        assert_eq!(item.status, WorkItemStatus::Draft);
        assert!(!item.has_been_reviewed());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_apply_edit_only_touches_provided_fields() {
        let mut item = sample(Utc::now());
        item.apply_edit(&ContentEdit {
            title: Some("New title".to_string()),
            ..ContentEdit::default()
        });
        assert_eq!(item.title, "New title");
        assert_eq!(item.content, "Ownership makes refactors boring");
        assert_eq!(item.author, "Gabriel");
    }

    #[test]
    fn test_reflects_review() {
        let mut item = sample(Utc::now());
        let cycle = Uuid::new_v4();
        item.review_cycle = Some(cycle);
        let reviewed_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        item.status = WorkItemStatus::Rejected;
        item.record_review(ReviewDecision::Rejected, "rita", Some("needs rework"), reviewed_at);

        assert!(item.reflects_review(
            cycle,
            ReviewDecision::Rejected,
            "rita",
            Some("needs rework"),
            reviewed_at
        ));
        assert!(!item.reflects_review(cycle, ReviewDecision::Rejected, "rita", None, reviewed_at));
        assert!(!item.reflects_review(
            cycle,
            ReviewDecision::Approved,
            "rita",
            Some("needs rework"),
            reviewed_at
        ));
        assert!(!item.reflects_review(
            Uuid::new_v4(),
            ReviewDecision::Rejected,
            "rita",
            Some("needs rework"),
            reviewed_at
        ));
    }

    #[test]
    fn test_review_cycle_membership() {
        let mut item = sample(Utc::now());
        let first = Uuid::new_v4();
        assert!(!item.is_in_review_cycle(first));

        item.review_cycle = Some(first);
        assert!(item.is_in_review_cycle(first));

        item.review_cycle = Some(Uuid::new_v4());
        assert!(!item.is_in_review_cycle(first));
    }

    #[test]
    fn test_search_criteria() {
        let created = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let item = sample(created);

        assert!(SearchCriteria::default().matches(&item));
        assert!(SearchCriteria {
            text: Some("OWNERSHIP".to_string()),
            ..Default::default()
        }
        .matches(&item));
        assert!(SearchCriteria {
            author: Some("gab".to_string()),
            text: Some("   ".to_string()),
            ..Default::default()
        }
        .matches(&item));
        assert!(!SearchCriteria {
            author: Some("rita".to_string()),
            ..Default::default()
        }
        .matches(&item));
        assert!(SearchCriteria {
            from: NaiveDate::from_ymd_opt(2026, 5, 10),
            to: NaiveDate::from_ymd_opt(2026, 5, 10),
            ..Default::default()
        }
        .matches(&item));
        assert!(!SearchCriteria {
            from: NaiveDate::from_ymd_opt(2026, 5, 11),
            ..Default::default()
        }
        .matches(&item));
    }
}
