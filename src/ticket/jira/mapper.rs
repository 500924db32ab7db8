use serde::Deserialize;
use serde_json::{json, Value};

use crate::ticket::types::IssueId;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
}

/// Map a `/search` response body to the issue keys it lists.
pub fn map_search_response(body: Value) -> serde_json::Result<Vec<IssueId>> {
    let response: SearchResponse = serde_json::from_value(body)?;
    Ok(response
        .issues
        .into_iter()
        .map(|issue| IssueId::new(issue.key))
        .collect())
}

pub fn transition_body(transition_id: u32) -> Value {
    json!({ "transition": { "id": transition_id.to_string() } })
}

pub fn comment_body(text: &str) -> Value {
    json!({ "body": text })
}

pub fn assignee_body(account_id: &str) -> Value {
    json!({ "accountId": account_id })
}
