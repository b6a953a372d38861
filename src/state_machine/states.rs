use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an editorial work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemStatus {
    /// Initial state; content is editable by the author
    Draft,
    /// Submitted and waiting for a reviewer decision
    Requested,
    /// Approved by a reviewer
    Published,
    /// Rejected by a reviewer; editable again, which re-opens it as a draft
    Rejected,
}

impl WorkItemStatus {
    pub const ALL: [WorkItemStatus; 4] = [
        Self::Draft,
        Self::Requested,
        Self::Published,
        Self::Rejected,
    ];

    /// Statuses in which the author may edit content
    pub const EDITABLE: [WorkItemStatus; 2] = [Self::Draft, Self::Rejected];

    /// Check if this is the happy-path terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published)
    }

    /// Check if content edits are allowed in this state
    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }

    /// Check if a review decision is outstanding
    pub fn awaits_review(&self) -> bool {
        matches!(self, Self::Requested)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Requested => "REQUESTED",
            Self::Published => "PUBLISHED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "REQUESTED" => Ok(Self::Requested),
            "PUBLISHED" => Ok(Self::Published),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!("Invalid work item status: {s}")),
        }
    }
}

impl Default for WorkItemStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Outcome of a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    /// Workflow status a post moves to once this decision is applied
    pub fn target_status(&self) -> WorkItemStatus {
        match self {
            Self::Approved => WorkItemStatus::Published,
            Self::Rejected => WorkItemStatus::Rejected,
        }
    }

    /// Rejections must explain themselves
    pub fn requires_comment(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!("Invalid review decision: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(WorkItemStatus::Published.is_terminal());
        assert!(!WorkItemStatus::Rejected.is_terminal());
        assert!(WorkItemStatus::Draft.is_editable());
        assert!(WorkItemStatus::Rejected.is_editable());
        assert!(!WorkItemStatus::Requested.is_editable());
        assert!(!WorkItemStatus::Published.is_editable());
        assert!(WorkItemStatus::Requested.awaits_review());
    }

    #[test]
    fn test_status_string_conversion() {
        for status in WorkItemStatus::ALL {
            assert_eq!(status.to_string().parse::<WorkItemStatus>().unwrap(), status);
        }
        assert!("draft".parse::<WorkItemStatus>().is_err());
    }

    #[test]
    fn test_decision_maps_to_status() {
        assert_eq!(
            ReviewDecision::Approved.target_status(),
            WorkItemStatus::Published
        );
        assert_eq!(
            ReviewDecision::Rejected.target_status(),
            WorkItemStatus::Rejected
        );
        assert!(ReviewDecision::Rejected.requires_comment());
        assert!(!ReviewDecision::Approved.requires_comment());
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&WorkItemStatus::Requested).unwrap(),
            "\"REQUESTED\""
        );
        let decision: ReviewDecision = serde_json::from_str("\"APPROVED\"").unwrap();
        assert_eq!(decision, ReviewDecision::Approved);
    }
}
