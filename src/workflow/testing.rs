//! In-memory collaborators for exercising the workflow without git, a
//! terminal, or a tracker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::editor::Editor;
use crate::error::{AppError, Result};
use crate::issue::{ChallengeCreationIssue, ChallengeRequestIssue};
use crate::operator::{Operator, Prompted};
use crate::ticket::types::{IssueId, WorkflowState};
use crate::ticket::TicketClient;
use crate::workflow::types::BranchSet;
use crate::workspace::{CherryPickResult, Repository};

/// Scripted result for cherry-picking onto one branch.
#[derive(Debug, Clone)]
pub enum PickScript {
    Clean,
    AlreadyApplied,
    Conflict(Vec<String>),
    Error(String),
}

#[derive(Debug, Default)]
pub struct RepoState {
    pub current: String,
    pub commits: Vec<(String, String)>,
    pub failing_commits: usize,
    pub commit_attempts: usize,
    pub checkout_failures: HashSet<String>,
    pub pick_scripts: HashMap<String, PickScript>,
    pub picks: Vec<(String, String)>,
    pub resolvable: HashSet<String>,
    pub completed: Vec<String>,
    pub aborted: Vec<String>,
    pub line_delta: i64,
    pub pushed: bool,
    pub push_fails: bool,
    next_id: usize,
}

pub struct FakeRepository {
    branches: Vec<String>,
    multi_branch: bool,
    state: Mutex<RepoState>,
}

impl FakeRepository {
    pub fn new(branches: &[&str], multi_branch: bool) -> Self {
        Self {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            multi_branch,
            state: Mutex::new(RepoState::default()),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, RepoState> {
        self.state.lock().unwrap()
    }

    fn next_id(state: &mut RepoState) -> String {
        state.next_id += 1;
        format!("c{:07}", state.next_id)
    }
}

#[async_trait]
impl Repository for FakeRepository {
    fn name(&self) -> &str {
        "fake-app"
    }

    fn path(&self) -> &Path {
        Path::new("/tmp/fake-app")
    }

    fn is_multi_branch_app(&self) -> bool {
        self.multi_branch
    }

    fn secure_branch_suggestions(&self) -> Vec<String> {
        self.branches
            .iter()
            .filter(|b| b.contains("secure"))
            .cloned()
            .collect()
    }

    async fn branches(&self) -> Result<Vec<String>> {
        Ok(self.branches.clone())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.state();
        if state.checkout_failures.contains(branch) {
            return Err(AppError::Git(format!("cannot checkout {branch}")));
        }
        state.current = branch.to_string();
        Ok(())
    }

    async fn stage_all(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<String> {
        let mut state = self.state();
        state.commit_attempts += 1;
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(AppError::NothingToCommit(state.current.clone()));
        }
        let id = Self::next_id(&mut state);
        let branch = state.current.clone();
        state.commits.push((branch, message.to_string()));
        Ok(id)
    }

    async fn last_commit_id(&self) -> Result<String> {
        let state = self.state();
        Ok(format!("c{:07}", state.next_id))
    }

    async fn last_commit_line_delta(&self) -> Result<i64> {
        Ok(self.state().line_delta)
    }

    async fn cherry_pick(&self, commit_id: &str) -> Result<CherryPickResult> {
        let mut state = self.state();
        let branch = state.current.clone();
        state.picks.push((branch.clone(), commit_id.to_string()));
        match state.pick_scripts.get(&branch).cloned().unwrap_or(PickScript::Clean) {
            PickScript::Clean => Ok(CherryPickResult::Applied(Self::next_id(&mut state))),
            PickScript::AlreadyApplied => Ok(CherryPickResult::AlreadyApplied),
            PickScript::Conflict(files) => Ok(CherryPickResult::Conflict(files)),
            PickScript::Error(message) => Err(AppError::Git(message)),
        }
    }

    async fn complete_cherry_pick(&self, _commit_id: &str) -> Result<String> {
        let mut state = self.state();
        let branch = state.current.clone();
        if !state.resolvable.contains(&branch) {
            return Err(AppError::CherryPick("unresolved conflicts remain".to_string()));
        }
        state.completed.push(branch);
        Ok(Self::next_id(&mut state))
    }

    async fn abort_cherry_pick(&self) -> Result<()> {
        let mut state = self.state();
        let branch = state.current.clone();
        state.aborted.push(branch);
        Ok(())
    }

    async fn push_all(&self) -> Result<()> {
        let mut state = self.state();
        if state.push_fails {
            return Err(AppError::Git("remote rejected push".to_string()));
        }
        state.pushed = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEditor {
    pub opened: Mutex<usize>,
}

#[async_trait]
impl Editor for FakeEditor {
    async fn open(&self, _path: &Path) -> Result<()> {
        *self.opened.lock().unwrap() += 1;
        Ok(())
    }
}

/// Queued answers per prompt; an empty queue falls back to a neutral answer.
#[derive(Debug, Default)]
pub struct Script {
    pub request_issues: VecDeque<Prompted<ChallengeRequestIssue>>,
    pub creation_issues: VecDeque<Prompted<ChallengeCreationIssue>>,
    pub branches: VecDeque<Prompted<Option<String>>>,
    pub fix_made: VecDeque<Prompted<()>>,
    pub descriptions: VecDeque<Prompted<String>>,
    pub fix_another: VecDeque<Prompted<bool>>,
    pub propagation: VecDeque<Prompted<()>>,
    pub conflicts: VecDeque<Prompted<()>>,
    pub push: VecDeque<Prompted<()>>,
    pub bulk: VecDeque<Prompted<bool>>,
    pub request_confirm: VecDeque<Prompted<()>>,
    pub batch: VecDeque<Prompted<()>>,
    pub issue_confirm: VecDeque<Prompted<()>>,

    pub offered: Vec<Vec<String>>,
    pub notices: Vec<String>,
    pub retry_prompts: usize,
    pub propagation_prompts: Vec<Vec<String>>,
    pub batch_sizes: Vec<usize>,
    pub issue_prompts: Vec<(IssueId, WorkflowState)>,
}

#[derive(Default)]
pub struct FakeOperator {
    script: Mutex<Script>,
}

impl FakeOperator {
    /// Operator who fixes `fixes` in order, describing each as given, then stops.
    pub fn fixing(fixes: &[(&str, &str)]) -> Self {
        let operator = Self::default();
        {
            let mut script = operator.script();
            for (i, (branch, description)) in fixes.iter().enumerate() {
                script
                    .branches
                    .push_back(Prompted::Answered(Some(branch.to_string())));
                script
                    .descriptions
                    .push_back(Prompted::Answered(description.to_string()));
                script
                    .fix_another
                    .push_back(Prompted::Answered(i + 1 < fixes.len()));
            }
        }
        operator
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn confirmed(queue: &mut VecDeque<Prompted<()>>) -> Prompted<()> {
        queue.pop_front().unwrap_or(Prompted::Answered(()))
    }
}

#[async_trait]
impl Operator for FakeOperator {
    fn notify(&self, message: &str) {
        self.script().notices.push(message.to_string());
    }

    async fn repository_name(&self) -> Prompted<String> {
        Prompted::Cancelled
    }

    async fn request_issue(&self) -> Prompted<ChallengeRequestIssue> {
        self.script()
            .request_issues
            .pop_front()
            .unwrap_or(Prompted::Cancelled)
    }

    async fn creation_issue(&self) -> Prompted<ChallengeCreationIssue> {
        self.script()
            .creation_issues
            .pop_front()
            .unwrap_or(Prompted::Cancelled)
    }

    async fn next_branch(
        &self,
        candidates: &BranchSet,
        _repository: &dyn Repository,
    ) -> Prompted<Option<String>> {
        let mut script = self.script();
        script.offered.push(candidates.to_vec());
        script.branches.pop_front().unwrap_or(Prompted::Answered(None))
    }

    async fn confirm_fix_made(&self, _branch: &str) -> Prompted<()> {
        Self::confirmed(&mut self.script().fix_made)
    }

    async fn fix_description(&self) -> Prompted<String> {
        self.script()
            .descriptions
            .pop_front()
            .unwrap_or_else(|| Prompted::Answered("fix".to_string()))
    }

    async fn confirm_commit_retry(&self, _branch: &str, _error: &AppError) -> Prompted<()> {
        self.script().retry_prompts += 1;
        Prompted::Answered(())
    }

    async fn fix_another(&self) -> Prompted<bool> {
        self.script()
            .fix_another
            .pop_front()
            .unwrap_or(Prompted::Answered(false))
    }

    async fn confirm_propagation(&self, _commit_id: &str, targets: &[String]) -> Prompted<()> {
        let mut script = self.script();
        script.propagation_prompts.push(targets.to_vec());
        Self::confirmed(&mut script.propagation)
    }

    async fn resolve_conflict(&self, _branch: &str, _files: &[String]) -> Prompted<()> {
        Self::confirmed(&mut self.script().conflicts)
    }

    async fn confirm_push(&self) -> Prompted<()> {
        Self::confirmed(&mut self.script().push)
    }

    async fn bulk_transition_required(&self) -> Prompted<bool> {
        self.script()
            .bulk
            .pop_front()
            .unwrap_or(Prompted::Answered(false))
    }

    async fn confirm_request_transition(&self, _issue: &IssueId) -> Prompted<()> {
        Self::confirmed(&mut self.script().request_confirm)
    }

    async fn confirm_batch(&self, count: usize) -> Prompted<()> {
        let mut script = self.script();
        script.batch_sizes.push(count);
        Self::confirmed(&mut script.batch)
    }

    async fn confirm_issue_transition(
        &self,
        issue: &IssueId,
        target: WorkflowState,
    ) -> Prompted<()> {
        let mut script = self.script();
        script.issue_prompts.push((issue.clone(), target));
        Self::confirmed(&mut script.issue_confirm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketCall {
    Transition(IssueId, WorkflowState),
    Comment(IssueId, String),
    Assign(IssueId, String),
    FindLinked(IssueId),
}

#[derive(Debug, Default)]
pub struct TicketState {
    pub calls: Vec<TicketCall>,
    pub states: HashMap<IssueId, WorkflowState>,
    pub failing_transitions: HashSet<(IssueId, WorkflowState)>,
    pub failing_comments: HashSet<IssueId>,
    pub linked: Vec<IssueId>,
    pub linked_query_fails: bool,
    pub reject_credentials: bool,
}

#[derive(Default)]
pub struct FakeTicketClient {
    state: Mutex<TicketState>,
}

impl FakeTicketClient {
    pub fn with_linked(keys: &[&str]) -> Self {
        let client = Self::default();
        client.state().linked = keys.iter().map(|k| IssueId::new(*k)).collect();
        client
    }

    pub fn state(&self) -> MutexGuard<'_, TicketState> {
        self.state.lock().unwrap()
    }

    pub fn fail_transition(&self, key: &str, target: WorkflowState) {
        self.state()
            .failing_transitions
            .insert((IssueId::new(key), target));
    }

    pub fn transitions_of(&self, key: &str) -> Vec<WorkflowState> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                TicketCall::Transition(issue, state) if issue.as_str() == key => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn state_of(&self, key: &str) -> Option<WorkflowState> {
        self.state().states.get(&IssueId::new(key)).copied()
    }
}

#[async_trait]
impl TicketClient for FakeTicketClient {
    async fn verify_credentials(&self) -> Result<()> {
        if self.state().reject_credentials {
            return Err(AppError::Credentials("rejected".to_string()));
        }
        Ok(())
    }

    async fn transition(&self, issue: &IssueId, target: WorkflowState) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TicketCall::Transition(issue.clone(), target));
        if state.failing_transitions.contains(&(issue.clone(), target)) {
            return Err(AppError::TicketApi(format!("transition of {issue} to {target} refused")));
        }
        state.states.insert(issue.clone(), target);
        Ok(())
    }

    async fn comment(&self, issue: &IssueId, body: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TicketCall::Comment(issue.clone(), body.to_string()));
        if state.failing_comments.contains(issue) {
            return Err(AppError::TicketApi(format!("comment on {issue} refused")));
        }
        Ok(())
    }

    async fn assign(&self, issue: &IssueId, account_id: &str) -> Result<()> {
        self.state()
            .calls
            .push(TicketCall::Assign(issue.clone(), account_id.to_string()));
        Ok(())
    }

    async fn find_linked_issues(&self, anchor: &IssueId) -> Result<Vec<IssueId>> {
        let mut state = self.state();
        state.calls.push(TicketCall::FindLinked(anchor.clone()));
        if state.linked_query_fails {
            return Err(AppError::TicketApi("search failed".to_string()));
        }
        Ok(state.linked.clone())
    }
}
