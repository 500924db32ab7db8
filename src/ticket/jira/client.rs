use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::{Credentials, JiraConfig, TransitionIds};
use crate::error::{AppError, Result};
use crate::ticket::types::*;
use crate::ticket::TicketClient;

use super::{linked_issues_jql, mapper};

const API_PATH: &str = "rest/api/latest";
const MAX_SEARCH_RESULTS: u32 = 100;

pub struct JiraClient {
    client: Client,
    api_url: String,
    credentials: Credentials,
    transitions: TransitionIds,
    creation_project: String,
    creation_issue_type: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            api_url: format!("{}/{API_PATH}", config.base_url.trim_end_matches('/')),
            credentials,
            transitions: config.transitions,
            creation_project: config.creation_project.clone(),
            creation_issue_type: config.creation_issue_type.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_key))
            .header("Accept", "application/json")
    }

    /// Turn a non-success response into an error naming the call that failed.
    async fn check(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Credentials(format!(
                "{context} was rejected ({status}); check the Jira email and API key"
            )));
        }
        Err(AppError::TicketApi(format!("{context} returned {status}: {body}")))
    }
}

#[async_trait]
impl TicketClient for JiraClient {
    async fn verify_credentials(&self) -> Result<()> {
        let response = self
            .authorized(self.client.get(self.url("myself")))
            .send()
            .await?;
        Self::check(response, "Credential check").await?;
        Ok(())
    }

    async fn transition(&self, issue: &IssueId, target: WorkflowState) -> Result<()> {
        let transition_id = target.transition_id(&self.transitions);
        tracing::debug!(issue = %issue, state = %target, transition_id, "Transitioning issue");

        let response = self
            .authorized(self.client.post(self.url(&format!("issue/{issue}/transitions"))))
            .json(&mapper::transition_body(transition_id))
            .send()
            .await?;
        Self::check(response, &format!("Transition of {issue} to {target}")).await?;
        Ok(())
    }

    async fn comment(&self, issue: &IssueId, body: &str) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.url(&format!("issue/{issue}/comment"))))
            .json(&mapper::comment_body(body))
            .send()
            .await?;
        Self::check(response, &format!("Comment on {issue}")).await?;
        Ok(())
    }

    async fn assign(&self, issue: &IssueId, account_id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.put(self.url(&format!("issue/{issue}/assignee"))))
            .json(&mapper::assignee_body(account_id))
            .send()
            .await?;
        Self::check(response, &format!("Assignment of {issue}")).await?;
        Ok(())
    }

    async fn find_linked_issues(&self, anchor: &IssueId) -> Result<Vec<IssueId>> {
        let jql = linked_issues_jql(&self.creation_project, &self.creation_issue_type, anchor);
        tracing::debug!(anchor = %anchor, jql = %jql, "Searching linked issues");

        let max_results = MAX_SEARCH_RESULTS.to_string();
        let response = self
            .authorized(self.client.get(self.url("search")))
            .query(&[
                ("jql", jql.as_str()),
                ("fields", "key"),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await?;
        let response = Self::check(response, &format!("Linked issue search for {anchor}")).await?;

        let body: serde_json::Value = response.json().await?;
        Ok(mapper::map_search_response(body)?)
    }
}
