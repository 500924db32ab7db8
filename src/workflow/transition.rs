use std::fmt;

use crate::issue::{ApplicationCreationIssue, ChallengeCreationIssue, ChallengeRequestIssue};
use crate::operator::{Operator, Prompted};
use crate::ticket::types::{IssueId, WorkflowState};
use crate::ticket::TicketClient;

/// Transitions every creation issue goes through, in order.
pub const CREATION_SEQUENCE: [WorkflowState; 2] =
    [WorkflowState::FeedbackOpen, WorkflowState::FeedbackReview];

/// Transitions that open a request issue before work starts.
pub const OPENING_SEQUENCE: [WorkflowState; 2] =
    [WorkflowState::Planned, WorkflowState::InProgress];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    /// Every creation issue linked to the request, confirmed once.
    Bulk,
    /// Confirm each transition call on its own.
    PerIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Once,
    EachCall,
}

/// Inputs for closing out a fix in the tracker.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub request: ChallengeRequestIssue,
    /// Creation issue tied to the fixed branch.
    pub creation: Option<ChallengeCreationIssue>,
    pub application: Option<ApplicationCreationIssue>,
    pub fix_messages: Vec<String>,
    pub did_propagate: bool,
    pub mode: TransitionMode,
}

impl TransitionRequest {
    /// Issue the linked creation issues hang off.
    pub fn anchor(&self) -> IssueId {
        match &self.application {
            Some(application) => application.issue_id(),
            None => self.request.issue_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStep {
    pub issue: IssueId,
    /// Empty when there is nothing to report.
    pub comment: String,
    pub target: WorkflowState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueStep {
    pub issue: IssueId,
    pub sequence: Vec<WorkflowState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub request: RequestStep,
    pub creation: Vec<IssueStep>,
    pub confirmation: Confirmation,
}

/// One `- message` line per fix.
pub fn format_fix_messages(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decide which calls to make. Linked issues only count when the fix was
/// propagated; the tied creation issue is always included.
pub fn plan_transitions(request: &TransitionRequest, linked: &[IssueId]) -> TransitionPlan {
    let mut issues: Vec<IssueId> = Vec::new();
    if request.did_propagate {
        for issue in linked {
            if !issues.contains(issue) {
                issues.push(issue.clone());
            }
        }
    }
    if let Some(tied) = &request.creation {
        let tied = tied.issue_id();
        if !issues.contains(&tied) {
            issues.push(tied);
        }
    }

    TransitionPlan {
        request: RequestStep {
            issue: request.request.issue_id(),
            comment: format_fix_messages(&request.fix_messages),
            target: WorkflowState::Closed,
        },
        creation: issues
            .into_iter()
            .map(|issue| IssueStep {
                issue,
                sequence: CREATION_SEQUENCE.to_vec(),
            })
            .collect(),
        confirmation: match request.mode {
            TransitionMode::Bulk => Confirmation::Once,
            TransitionMode::PerIssue => Confirmation::EachCall,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Every transition in the sequence succeeded.
    Transitioned(WorkflowState),
    Failed {
        state: WorkflowState,
        error: String,
        /// Last state reached before the failure.
        reached: Option<WorkflowState>,
    },
    Skipped {
        reached: Option<WorkflowState>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReport {
    pub issue: IssueId,
    pub outcome: IssueOutcome,
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            IssueOutcome::Transitioned(state) => write!(f, "{}: {state}", self.issue),
            IssueOutcome::Failed { state, error, .. } => {
                write!(f, "{}: failed moving to {state} ({error})", self.issue)
            }
            IssueOutcome::Skipped { .. } => write!(f, "{}: skipped", self.issue),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionSummary {
    pub request: IssueReport,
    pub issues: Vec<IssueReport>,
    /// Set when the linked issue lookup failed.
    pub discovery_error: Option<String>,
}

impl TransitionSummary {
    fn count(&self, pred: impl Fn(&IssueOutcome) -> bool) -> usize {
        self.issues.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn successes(&self) -> usize {
        self.count(|o| matches!(o, IssueOutcome::Transitioned(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, IssueOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, IssueOutcome::Skipped { .. }))
    }
}

impl fmt::Display for TransitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.request)?;
        if let Some(error) = &self.discovery_error {
            writeln!(f, "Linked issue lookup failed: {error}")?;
        }
        write!(
            f,
            "CHLC transitions: {} succeeded, {} failed, {} skipped",
            self.successes(),
            self.failures(),
            self.skipped()
        )
    }
}

/// Moves the request and creation issues through their workflows.
pub struct TicketTransitionCoordinator<'a> {
    client: &'a dyn TicketClient,
    operator: &'a dyn Operator,
    content_verifier_id: Option<String>,
}

impl<'a> TicketTransitionCoordinator<'a> {
    pub fn new(
        client: &'a dyn TicketClient,
        operator: &'a dyn Operator,
        content_verifier_id: Option<String>,
    ) -> Self {
        Self {
            client,
            operator,
            content_verifier_id,
        }
    }

    /// Move the request issue from the backlog into progress.
    pub async fn open_request(&self, request: &ChallengeRequestIssue) -> IssueReport {
        let issue = request.issue_id();
        let outcome = self
            .run_sequence(&issue, &OPENING_SEQUENCE, Confirmation::Once)
            .await;
        let report = IssueReport { issue, outcome };
        self.operator.notify(&report.to_string());
        report
    }

    pub async fn transition(&self, request: TransitionRequest) -> TransitionSummary {
        let mut discovery_error = None;
        let linked = if request.did_propagate {
            let anchor = request.anchor();
            match self.client.find_linked_issues(&anchor).await {
                Ok(linked) => linked,
                Err(e) => {
                    tracing::warn!(anchor = %anchor, error = %e, "Linked issue lookup failed");
                    self.operator
                        .notify(&format!("Could not find issues linked to {anchor}: {e}"));
                    discovery_error = Some(e.to_string());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let plan = plan_transitions(&request, &linked);
        let request_report = self.close_request(&plan.request).await;
        self.operator.notify(&request_report.to_string());

        let issues = self.transition_creation_issues(&plan).await;

        let summary = TransitionSummary {
            request: request_report,
            issues,
            discovery_error,
        };
        self.operator.notify(&summary.to_string());
        summary
    }

    async fn close_request(&self, step: &RequestStep) -> IssueReport {
        let issue = step.issue.clone();
        if let Prompted::Cancelled = self.operator.confirm_request_transition(&issue).await {
            return IssueReport {
                issue,
                outcome: IssueOutcome::Skipped { reached: None },
            };
        }

        if !step.comment.is_empty() {
            if let Err(e) = self.client.comment(&issue, &step.comment).await {
                tracing::warn!(issue = %issue, error = %e, "Failed to comment fix messages");
                return IssueReport {
                    issue,
                    outcome: IssueOutcome::Failed {
                        state: step.target,
                        error: format!("could not add fix comment: {e}"),
                        reached: None,
                    },
                };
            }
        }

        let outcome = self
            .run_sequence(&issue, &[step.target], Confirmation::Once)
            .await;
        IssueReport { issue, outcome }
    }

    async fn transition_creation_issues(&self, plan: &TransitionPlan) -> Vec<IssueReport> {
        if plan.creation.is_empty() {
            self.operator.notify("No CHLC issues to transition");
            return Vec::new();
        }

        if plan.confirmation == Confirmation::Once {
            if let Prompted::Cancelled = self.operator.confirm_batch(plan.creation.len()).await {
                return plan
                    .creation
                    .iter()
                    .map(|step| IssueReport {
                        issue: step.issue.clone(),
                        outcome: IssueOutcome::Skipped { reached: None },
                    })
                    .collect();
            }
        }

        let mut reports = Vec::with_capacity(plan.creation.len());
        for step in &plan.creation {
            let outcome = self
                .run_sequence(&step.issue, &step.sequence, plan.confirmation)
                .await;
            if outcome == IssueOutcome::Transitioned(WorkflowState::FeedbackReview) {
                self.follow_up(&step.issue, &plan.request.issue).await;
            }
            reports.push(IssueReport {
                issue: step.issue.clone(),
                outcome,
            });
        }
        reports
    }

    /// Apply `sequence` in order; a failed call ends the sequence for this issue.
    async fn run_sequence(
        &self,
        issue: &IssueId,
        sequence: &[WorkflowState],
        confirmation: Confirmation,
    ) -> IssueOutcome {
        let mut reached = None;
        for &state in sequence {
            if confirmation == Confirmation::EachCall
                && self
                    .operator
                    .confirm_issue_transition(issue, state)
                    .await
                    .is_cancelled()
            {
                return IssueOutcome::Skipped { reached };
            }

            match self.client.transition(issue, state).await {
                Ok(()) => {
                    tracing::info!(issue = %issue, state = %state, "Issue transitioned");
                    reached = Some(state);
                }
                Err(e) => {
                    tracing::warn!(issue = %issue, state = %state, error = %e, "Transition failed");
                    self.operator
                        .notify(&format!("Failed to transition {issue} to {state}: {e}"));
                    return IssueOutcome::Failed {
                        state,
                        error: e.to_string(),
                        reached,
                    };
                }
            }
        }

        match reached {
            Some(state) => IssueOutcome::Transitioned(state),
            None => IssueOutcome::Skipped { reached: None },
        }
    }

    /// Hand a reviewed creation issue to content verification.
    async fn follow_up(&self, issue: &IssueId, request: &IssueId) {
        if let Err(e) = self
            .client
            .comment(issue, &format!("Fixed as part of {request}"))
            .await
        {
            tracing::warn!(issue = %issue, error = %e, "Failed to comment request key");
        }

        if let Some(account_id) = &self.content_verifier_id {
            if let Err(e) = self.client.assign(issue, account_id).await {
                tracing::warn!(issue = %issue, error = %e, "Failed to assign content verifier");
                self.operator
                    .notify(&format!("Assign {issue} to the content verifier by hand"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{FakeOperator, FakeTicketClient, TicketCall};

    fn request(did_propagate: bool, mode: TransitionMode, tied: Option<&str>) -> TransitionRequest {
        TransitionRequest {
            request: ChallengeRequestIssue::new("42").unwrap(),
            creation: tied.map(|n| ChallengeCreationIssue::new(n).unwrap()),
            application: None,
            fix_messages: vec!["escape input".to_string(), "-".to_string()],
            did_propagate,
            mode,
        }
    }

    fn ids(keys: &[&str]) -> Vec<IssueId> {
        keys.iter().map(|k| IssueId::new(*k)).collect()
    }

    fn planned(plan: &TransitionPlan) -> Vec<IssueId> {
        plan.creation.iter().map(|s| s.issue.clone()).collect()
    }

    #[test]
    fn test_propagated_fix_includes_every_linked_issue() {
        let linked = ids(&["CHLC-11", "CHLC-12"]);
        let plan = plan_transitions(&request(true, TransitionMode::Bulk, Some("12")), &linked);
        assert_eq!(planned(&plan), ids(&["CHLC-11", "CHLC-12"]));

        let plan = plan_transitions(&request(true, TransitionMode::Bulk, Some("77")), &linked);
        assert_eq!(planned(&plan), ids(&["CHLC-11", "CHLC-12", "CHLC-77"]));
        assert_eq!(plan.confirmation, Confirmation::Once);
    }

    #[test]
    fn test_unpropagated_fix_includes_only_tied_issue() {
        let linked = ids(&["CHLC-11", "CHLC-12"]);
        let plan = plan_transitions(&request(false, TransitionMode::PerIssue, Some("77")), &linked);
        assert_eq!(planned(&plan), ids(&["CHLC-77"]));
        assert_eq!(plan.creation[0].sequence, CREATION_SEQUENCE.to_vec());
        assert_eq!(plan.confirmation, Confirmation::EachCall);
    }

    #[test]
    fn test_request_comment_lists_fix_messages() {
        let plan = plan_transitions(&request(false, TransitionMode::Bulk, None), &[]);
        assert_eq!(plan.request.comment, "- escape input\n- -");
        assert_eq!(plan.request.target, WorkflowState::Closed);
    }

    #[test]
    fn test_anchor_prefers_application_issue() {
        let mut req = request(true, TransitionMode::Bulk, None);
        assert_eq!(req.anchor(), IssueId::new("CHLRQ-42"));
        req.application = Some(ApplicationCreationIssue::new("900").unwrap());
        assert_eq!(req.anchor(), IssueId::new("CHLC-900"));
    }

    #[tokio::test]
    async fn test_bulk_transition_with_one_failing_issue() {
        let client = FakeTicketClient::with_linked(&["CHLC-1", "CHLC-2", "CHLC-3"]);
        client.fail_transition("CHLC-2", WorkflowState::FeedbackOpen);
        let operator = FakeOperator::default();

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(true, TransitionMode::Bulk, None))
            .await;

        assert_eq!(client.state_of("CHLC-1"), Some(WorkflowState::FeedbackReview));
        assert_eq!(client.state_of("CHLC-3"), Some(WorkflowState::FeedbackReview));
        assert_eq!(client.state_of("CHLC-2"), None);
        assert_eq!(client.transitions_of("CHLC-2"), vec![WorkflowState::FeedbackOpen]);
        assert_eq!(summary.successes(), 2);
        assert_eq!(summary.failures(), 1);
        assert_eq!(operator.script().batch_sizes, vec![3]);
        assert_eq!(client.state_of("CHLRQ-42"), Some(WorkflowState::Closed));
    }

    #[tokio::test]
    async fn test_second_transition_needs_first_to_succeed() {
        let client = FakeTicketClient::default();
        client.fail_transition("CHLC-77", WorkflowState::FeedbackOpen);
        let operator = FakeOperator::default();

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(false, TransitionMode::PerIssue, Some("77")))
            .await;

        assert_eq!(client.transitions_of("CHLC-77"), vec![WorkflowState::FeedbackOpen]);
        assert_eq!(
            summary.issues[0].outcome,
            IssueOutcome::Failed {
                state: WorkflowState::FeedbackOpen,
                error: "Ticket API error: transition of CHLC-77 to Feedback Open refused"
                    .to_string(),
                reached: None,
            }
        );
    }

    #[tokio::test]
    async fn test_unpropagated_fix_does_not_query_linked_issues() {
        let client = FakeTicketClient::with_linked(&["CHLC-1"]);
        let operator = FakeOperator::default();

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(false, TransitionMode::PerIssue, Some("77")))
            .await;

        assert!(!client
            .state()
            .calls
            .iter()
            .any(|c| matches!(c, TicketCall::FindLinked(_))));
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(client.state_of("CHLC-77"), Some(WorkflowState::FeedbackReview));
        assert_eq!(operator.script().issue_prompts.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_call_skips_only_that_issue() {
        let client = FakeTicketClient::with_linked(&["CHLC-1", "CHLC-2"]);
        let operator = FakeOperator::default();
        {
            let mut script = operator.script();
            script.issue_confirm.push_back(Prompted::Answered(()));
            script.issue_confirm.push_back(Prompted::Cancelled);
        }

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(true, TransitionMode::PerIssue, None))
            .await;

        assert_eq!(
            summary.issues[0].outcome,
            IssueOutcome::Skipped {
                reached: Some(WorkflowState::FeedbackOpen)
            }
        );
        assert_eq!(
            summary.issues[1].outcome,
            IssueOutcome::Transitioned(WorkflowState::FeedbackReview)
        );
        assert_eq!(summary.skipped(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_every_issue() {
        let client = FakeTicketClient::with_linked(&["CHLC-1", "CHLC-2"]);
        let operator = FakeOperator::default();
        operator.script().batch.push_back(Prompted::Cancelled);

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(true, TransitionMode::Bulk, None))
            .await;

        assert_eq!(summary.skipped(), 2);
        assert!(client.transitions_of("CHLC-1").is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_confirmation_skips_request_only() {
        let client = FakeTicketClient::default();
        let operator = FakeOperator::default();
        operator.script().request_confirm.push_back(Prompted::Cancelled);

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(false, TransitionMode::Bulk, Some("77")))
            .await;

        assert_eq!(summary.request.outcome, IssueOutcome::Skipped { reached: None });
        assert!(client.transitions_of("CHLRQ-42").is_empty());
        assert_eq!(client.state_of("CHLC-77"), Some(WorkflowState::FeedbackReview));
    }

    #[tokio::test]
    async fn test_failed_comment_leaves_request_open() {
        let client = FakeTicketClient::default();
        client
            .state()
            .failing_comments
            .insert(IssueId::new("CHLRQ-42"));
        let operator = FakeOperator::default();

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(false, TransitionMode::Bulk, None))
            .await;

        assert!(matches!(summary.request.outcome, IssueOutcome::Failed { .. }));
        assert!(client.transitions_of("CHLRQ-42").is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_back_to_tied_issue() {
        let client = FakeTicketClient::default();
        client.state().linked_query_fails = true;
        let operator = FakeOperator::default();

        let summary = TicketTransitionCoordinator::new(&client, &operator, None)
            .transition(request(true, TransitionMode::Bulk, Some("77")))
            .await;

        assert!(summary.discovery_error.is_some());
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.issues[0].issue, IssueId::new("CHLC-77"));
    }

    #[tokio::test]
    async fn test_reviewed_issue_is_assigned_to_verifier() {
        let client = FakeTicketClient::default();
        let operator = FakeOperator::default();

        TicketTransitionCoordinator::new(&client, &operator, Some("acc-1".to_string()))
            .transition(request(false, TransitionMode::Bulk, Some("77")))
            .await;

        let calls = client.state().calls.clone();
        assert!(calls.contains(&TicketCall::Comment(
            IssueId::new("CHLC-77"),
            "Fixed as part of CHLRQ-42".to_string()
        )));
        assert!(calls.contains(&TicketCall::Assign(IssueId::new("CHLC-77"), "acc-1".to_string())));
    }

    #[tokio::test]
    async fn test_open_request_stops_at_first_failure() {
        let client = FakeTicketClient::default();
        client.fail_transition("CHLRQ-42", WorkflowState::Planned);
        let operator = FakeOperator::default();

        let report = TicketTransitionCoordinator::new(&client, &operator, None)
            .open_request(&ChallengeRequestIssue::new("42").unwrap())
            .await;

        assert!(matches!(
            report.outcome,
            IssueOutcome::Failed {
                state: WorkflowState::Planned,
                ..
            }
        ));
        assert_eq!(client.transitions_of("CHLRQ-42"), vec![WorkflowState::Planned]);
    }
}
