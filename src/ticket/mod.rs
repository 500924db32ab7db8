pub mod jira;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Check that the configured credentials are accepted by the tracker.
    async fn verify_credentials(&self) -> Result<()>;

    /// Move an issue into `target` via its workflow transition.
    async fn transition(&self, issue: &IssueId, target: WorkflowState) -> Result<()>;

    /// Post a comment on an issue.
    async fn comment(&self, issue: &IssueId, body: &str) -> Result<()>;

    /// Assign an issue to an account.
    async fn assign(&self, issue: &IssueId, account_id: &str) -> Result<()>;

    /// List the creation issues linked to `anchor`.
    async fn find_linked_issues(&self, anchor: &IssueId) -> Result<Vec<IssueId>>;
}
