use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TransitionIds;

/// A tracker issue key such as `CHLC-1234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow states the tool moves issues into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Planned,
    InProgress,
    FeedbackOpen,
    FeedbackReview,
    Closed,
}

impl WorkflowState {
    pub fn transition_id(self, ids: &TransitionIds) -> u32 {
        match self {
            WorkflowState::Planned => ids.planned,
            WorkflowState::InProgress => ids.in_progress,
            WorkflowState::FeedbackOpen => ids.feedback_open,
            WorkflowState::FeedbackReview => ids.feedback_review,
            WorkflowState::Closed => ids.closed,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Planned => "Planned",
            WorkflowState::InProgress => "In Progress",
            WorkflowState::FeedbackOpen => "Feedback Open",
            WorkflowState::FeedbackReview => "Feedback Review",
            WorkflowState::Closed => "Closed",
        };
        f.write_str(name)
    }
}
