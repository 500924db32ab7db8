pub mod console;

use async_trait::async_trait;

use crate::error::AppError;
use crate::issue::{ChallengeCreationIssue, ChallengeRequestIssue};
use crate::ticket::types::{IssueId, WorkflowState};
use crate::workflow::types::{fix_description_from_input, BranchSet};
use crate::workspace::Repository;

pub use console::ConsoleOperator;

/// Answer to an operator prompt. `Cancelled` means the operator interrupted
/// the prompt; the caller abandons the current unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompted<T> {
    Answered(T),
    Cancelled,
}

impl<T> Prompted<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Prompted::Cancelled)
    }

    pub fn answered(self) -> Option<T> {
        match self {
            Prompted::Answered(value) => Some(value),
            Prompted::Cancelled => None,
        }
    }
}

/// The human driving the session. Implementations own input validation.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show a message to the operator.
    fn notify(&self, message: &str);

    async fn repository_name(&self) -> Prompted<String>;

    async fn request_issue(&self) -> Prompted<ChallengeRequestIssue>;

    async fn creation_issue(&self) -> Prompted<ChallengeCreationIssue>;

    /// Next branch to fix, chosen from `candidates`. `None` means no more.
    async fn next_branch(
        &self,
        candidates: &BranchSet,
        repository: &dyn Repository,
    ) -> Prompted<Option<String>>;

    /// Block until the operator says the fix on `branch` is in place.
    async fn confirm_fix_made(&self, branch: &str) -> Prompted<()>;

    /// Non-empty description of the fix, as typed.
    async fn fix_description(&self) -> Prompted<String>;

    /// Ask the operator to correct the working tree before committing again.
    async fn confirm_commit_retry(&self, branch: &str, error: &AppError) -> Prompted<()>;

    async fn fix_another(&self) -> Prompted<bool>;

    async fn confirm_propagation(&self, commit_id: &str, targets: &[String]) -> Prompted<()>;

    /// Ask the operator to resolve cherry-pick conflicts in the working tree.
    async fn resolve_conflict(&self, branch: &str, files: &[String]) -> Prompted<()>;

    async fn confirm_push(&self) -> Prompted<()>;

    async fn bulk_transition_required(&self) -> Prompted<bool>;

    async fn confirm_request_transition(&self, issue: &IssueId) -> Prompted<()>;

    /// Confirm a batch of `count` creation issues once.
    async fn confirm_batch(&self, count: usize) -> Prompted<()>;

    async fn confirm_issue_transition(
        &self,
        issue: &IssueId,
        target: WorkflowState,
    ) -> Prompted<()>;
}

/// Ask for a fix description until it maps to something recordable.
pub async fn ask_fix_description(operator: &dyn Operator) -> Prompted<String> {
    loop {
        let raw = match operator.fix_description().await {
            Prompted::Answered(raw) => raw,
            Prompted::Cancelled => return Prompted::Cancelled,
        };
        match fix_description_from_input(&raw) {
            Some(description) => return Prompted::Answered(description),
            None => operator.notify(EMPTY_DESCRIPTION_HINT),
        }
    }
}

pub(crate) const EMPTY_DESCRIPTION_HINT: &str =
    "Fix description cannot be empty (enter a single space to skip)";
