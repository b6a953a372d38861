//! # Message Structures
//!
//! Wire formats exchanged between the authoring and review domains, plus
//! the envelope a consumer receives from the bus. Events are JSON with
//! camelCase field names.

use crate::models::{ReviewRecord, WorkItem, WorkItemId};
use crate::state_machine::{ReviewDecision, WorkItemStatus};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exchange plus routing key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub exchange: String,
    pub routing_key: String,
}

impl Route {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }
}

/// Authoring → review: a post entered REQUESTED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequestEvent {
    pub post_id: WorkItemId,
    /// Identity of this submission; echoed back on the result
    pub review_cycle: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
}

impl ReviewRequestEvent {
    /// Snapshot of `item` as submitted for `review_cycle`
    pub fn new(item: &WorkItem, review_cycle: Uuid) -> Self {
        Self {
            post_id: item.id,
            review_cycle,
            title: item.title.clone(),
            content: item.content.clone(),
            author: item.author.clone(),
        }
    }
}

/// Review → authoring: a reviewer decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResultEvent {
    pub post_id: WorkItemId,
    pub review_cycle: Uuid,
    pub decision: ReviewDecision,
    pub reviewer: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewResultEvent {
    pub fn target_status(&self) -> WorkItemStatus {
        self.decision.target_status()
    }
}

impl From<&ReviewRecord> for ReviewResultEvent {
    fn from(record: &ReviewRecord) -> Self {
        Self {
            post_id: record.post_id,
            review_cycle: record.review_cycle,
            decision: record.decision,
            reviewer: record.reviewer.clone(),
            comment: record.comment.clone(),
            reviewed_at: record.created_at,
        }
    }
}

/// A message handed to a consumer; settled with ack or release
#[derive(Debug, Clone)]
pub struct Delivery {
    pub delivery_id: i64,
    pub queue: String,
    pub payload: serde_json::Value,
    /// 1 on first delivery, incremented on every redelivery
    pub delivery_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Delivery {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_result_event_wire_format() {
        let post_id = Uuid::new_v4();
        let review_cycle = Uuid::new_v4();
        let event = ReviewResultEvent {
            post_id,
            review_cycle,
            decision: ReviewDecision::Rejected,
            reviewer: "rita".to_string(),
            comment: Some("needs rework".to_string()),
            reviewed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["postId"], json!(post_id.to_string()));
        assert_eq!(value["reviewCycle"], json!(review_cycle.to_string()));
        assert_eq!(value["decision"], json!("REJECTED"));
        assert_eq!(value["reviewedAt"], json!("2026-01-02T03:04:05Z"));
        assert_eq!(event.target_status(), WorkItemStatus::Rejected);
    }

    #[test]
    fn test_result_event_comment_is_optional_on_the_wire() {
        let post_id = Uuid::new_v4();
        let payload = json!({
            "postId": post_id,
            "reviewCycle": Uuid::new_v4(),
            "decision": "APPROVED",
            "reviewer": "rita",
            "reviewedAt": "2026-01-02T03:04:05Z"
        });
        let event: ReviewResultEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(event.comment, None);
        assert_eq!(event.target_status(), WorkItemStatus::Published);
    }

    #[test]
    fn test_delivery_decode() {
        let post_id = Uuid::new_v4();
        let delivery = Delivery {
            delivery_id: 7,
            queue: "q".to_string(),
            payload: json!({
                "postId": post_id,
                "reviewCycle": Uuid::new_v4(),
                "title": "T",
                "content": "C",
                "author": "gabriel"
            }),
            delivery_count: 2,
            enqueued_at: Utc::now(),
        };

        let event: ReviewRequestEvent = delivery.decode().unwrap();
        assert_eq!(event.post_id, post_id);
        assert_eq!(event.author, "gabriel");
        assert!(delivery.is_redelivery());
        assert!(delivery.decode::<ReviewResultEvent>().is_err());
    }
}
