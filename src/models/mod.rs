//! # Models
//!
//! Records owned by the two domains: [`WorkItem`] by authoring,
//! [`ReviewRecord`] and [`PendingReview`] by review.

pub mod review_record;
pub mod work_item;

pub use review_record::{NewReviewRecord, PendingReview, ReviewRecord};
pub use work_item::{ContentEdit, NewWorkItem, SearchCriteria, WorkItem, WorkItemId};
