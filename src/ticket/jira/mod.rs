pub mod client;
pub mod mapper;

pub use client::JiraClient;

use crate::ticket::types::IssueId;

/// JQL selecting every creation issue linked to `anchor`.
pub fn linked_issues_jql(project: &str, issue_type: &str, anchor: &IssueId) -> String {
    format!(
        "project = '{project}' AND issuetype = {issue_type} \
         AND issue in linkedIssues('{anchor}') ORDER BY created DESC"
    )
}

/// Browser link to an issue.
pub fn browse_url(base_url: &str, issue: &IssueId) -> String {
    format!("{}/browse/{issue}", base_url.trim_end_matches('/'))
}

/// Browser link listing the linked creation issues, ready for a manual bulk transition.
pub fn bulk_transition_url(
    base_url: &str,
    project: &str,
    issue_type: &str,
    anchor: &IssueId,
) -> String {
    let jql = linked_issues_jql(project, issue_type, anchor);
    format!(
        "{}?jql={}",
        browse_url(base_url, anchor),
        urlencoding::encode(&jql)
    )
}
