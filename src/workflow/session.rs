use crate::config::AppConfig;
use crate::editor::Editor;
use crate::error::{AppError, Result};
use crate::issue::{ApplicationCreationIssue, ChallengeCreationIssue, ChallengeRequestIssue};
use crate::operator::{ask_fix_description, Operator, Prompted};
use crate::ticket::jira::{browse_url, bulk_transition_url};
use crate::ticket::TicketClient;
use crate::workflow::fix::{BranchFixOrchestrator, FixSettings};
use crate::workflow::transition::{
    format_fix_messages, TicketTransitionCoordinator, TransitionMode, TransitionRequest,
};
use crate::workflow::types::{BranchSet, FixResult};
use crate::workspace::{GitRepository, Repository, WorkspaceManager};

/// Command-line choices for one run.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub repository: Option<String>,
    /// Skip pushing and the tracker entirely.
    pub test_mode: bool,
    pub request: Option<ChallengeRequestIssue>,
    pub creation: Option<ChallengeCreationIssue>,
    pub application: Option<ApplicationCreationIssue>,
    pub cherry_pick: bool,
}

/// One operator session: fix branches of one repository, then close out the
/// tickets. `tickets` is `None` when the tracker API is not used.
pub struct Session<'a> {
    config: &'a AppConfig,
    operator: &'a dyn Operator,
    editor: &'a dyn Editor,
    tickets: Option<&'a dyn TicketClient>,
    options: SessionOptions,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a AppConfig,
        operator: &'a dyn Operator,
        editor: &'a dyn Editor,
        tickets: Option<&'a dyn TicketClient>,
        options: SessionOptions,
    ) -> Self {
        Self {
            config,
            operator,
            editor,
            tickets,
            options,
        }
    }

    fn coordinator(&self, tickets: &'a dyn TicketClient) -> TicketTransitionCoordinator<'a> {
        TicketTransitionCoordinator::new(
            tickets,
            self.operator,
            self.config.jira.content_verifier_id.clone(),
        )
    }

    /// Clone the repository and run the fix session in it.
    pub async fn run_fix(&self) -> Result<()> {
        if let Some(tickets) = self.tickets {
            tickets.verify_credentials().await?;
        }

        match self.clone_repository().await? {
            Some(repository) => self.fix_repository(&repository).await,
            None => Ok(()),
        }
    }

    /// Clone the repository and open one of its branches in the editor.
    pub async fn run_view(&self) -> Result<()> {
        match self.clone_repository().await? {
            Some(repository) => self.view_repository(&repository).await,
            None => Ok(()),
        }
    }

    async fn clone_repository(&self) -> Result<Option<GitRepository>> {
        let name = match &self.options.repository {
            Some(name) => name.clone(),
            None => match self.operator.repository_name().await {
                Prompted::Answered(name) => name,
                Prompted::Cancelled => return Ok(None),
            },
        };

        let path = WorkspaceManager::new(&self.config.workspace)
            .clone_repository(&name, &self.config.git)
            .await?;
        let repository = GitRepository::open(
            &name,
            path,
            &self.config.fix.secure_branch,
            self.config.git.token.clone(),
        )
        .await?;
        Ok(Some(repository))
    }

    pub async fn view_repository(&self, repository: &dyn Repository) -> Result<()> {
        let candidates: BranchSet = repository.branches().await?.into_iter().collect();
        let branch = match self.operator.next_branch(&candidates, repository).await {
            Prompted::Answered(Some(branch)) => branch,
            Prompted::Answered(None) | Prompted::Cancelled => return Ok(()),
        };

        repository.checkout(&branch).await?;
        self.editor.open(repository.path()).await?;
        self.operator.notify(&format!(
            "Opened \"{branch}\" of {} in the editor",
            repository.name()
        ));
        Ok(())
    }

    pub async fn fix_repository(&self, repository: &dyn Repository) -> Result<()> {
        let branches = repository.branches().await?;
        self.operator.notify(&format!(
            "Repository: {}\nBranches: {}\nApp type: {}",
            repository.name(),
            branches.len(),
            if repository.is_multi_branch_app() {
                "Full"
            } else {
                "Minified"
            }
        ));

        let request = match self.request_issue().await {
            Some(request) => request,
            None => return Ok(()),
        };

        match self.tickets {
            Some(tickets) => {
                self.coordinator(tickets).open_request(&request).await;
            }
            None => self.operator.notify(&format!(
                "Move {request} to In Progress: {}",
                browse_url(&self.config.jira.base_url, &request.issue_id())
            )),
        }

        let mut candidates: BranchSet = branches.into_iter().collect();
        let settings = FixSettings {
            secure_branch: self.config.fix.secure_branch.clone(),
            cherry_pick: self.options.cherry_pick,
        };
        let result = BranchFixOrchestrator::new(repository, self.editor, self.operator, settings)
            .run(&mut candidates, &request)
            .await;

        if result.is_empty() {
            self.operator.notify("No fixes were made");
            return Ok(());
        }

        if self.options.test_mode {
            self.operator.notify("Test mode: nothing pushed, tickets untouched");
            self.closing_checklist(&result);
            return Ok(());
        }

        if self.operator.confirm_push().await.is_cancelled() {
            self.operator.notify("Push skipped; tickets left untouched");
            return Ok(());
        }
        repository.push_all().await?;
        self.operator.notify("Pushed all branches");

        match self.tickets {
            Some(tickets) => self.transition_tickets(tickets, request, &result).await,
            None => self.manual_transition_checklist(&request, &result),
        }

        self.closing_checklist(&result);
        Ok(())
    }

    /// Transition tickets for a fix that was made outside this tool.
    pub async fn run_transition(&self) -> Result<()> {
        let tickets = self.tickets.ok_or_else(|| {
            AppError::Config("transition mode needs the tracker API".to_string())
        })?;
        tickets.verify_credentials().await?;

        let Some(request) = self.request_issue().await else {
            return Ok(());
        };
        let bulk = match self.operator.bulk_transition_required().await {
            Prompted::Answered(bulk) => bulk,
            Prompted::Cancelled => return Ok(()),
        };
        let fix_message = match ask_fix_description(self.operator).await {
            Prompted::Answered(description) => description,
            Prompted::Cancelled => return Ok(()),
        };
        let creation = if bulk {
            None
        } else {
            match self.creation_issue().await {
                Some(creation) => Some(creation),
                None => return Ok(()),
            }
        };

        self.coordinator(tickets)
            .transition(TransitionRequest {
                request,
                creation,
                application: self.options.application.clone(),
                fix_messages: vec![fix_message],
                did_propagate: bulk,
                mode: if bulk {
                    TransitionMode::Bulk
                } else {
                    TransitionMode::PerIssue
                },
            })
            .await;
        Ok(())
    }

    async fn request_issue(&self) -> Option<ChallengeRequestIssue> {
        match &self.options.request {
            Some(request) => Some(request.clone()),
            None => self.operator.request_issue().await.answered(),
        }
    }

    async fn creation_issue(&self) -> Option<ChallengeCreationIssue> {
        match &self.options.creation {
            Some(creation) => Some(creation.clone()),
            None => self.operator.creation_issue().await.answered(),
        }
    }

    async fn transition_tickets(
        &self,
        tickets: &'a dyn TicketClient,
        request: ChallengeRequestIssue,
        result: &FixResult,
    ) {
        let creation = if result.propagated() {
            self.options.creation.clone()
        } else {
            self.creation_issue().await
        };
        let mode = match self.operator.bulk_transition_required().await {
            Prompted::Answered(true) => TransitionMode::Bulk,
            Prompted::Answered(false) => TransitionMode::PerIssue,
            Prompted::Cancelled => {
                self.operator.notify("Ticket transitions skipped");
                return;
            }
        };

        self.coordinator(tickets)
            .transition(TransitionRequest {
                request,
                creation,
                application: self.options.application.clone(),
                fix_messages: result.fix_messages().to_vec(),
                did_propagate: result.propagated(),
                mode,
            })
            .await;
    }

    fn manual_transition_checklist(&self, request: &ChallengeRequestIssue, result: &FixResult) {
        let jira = &self.config.jira;
        let mut steps = vec![format!(
            "Close {request} ({}) with the comment:\n{}",
            browse_url(&jira.base_url, &request.issue_id()),
            format_fix_messages(result.fix_messages())
        )];

        if result.propagated() {
            let anchor = match &self.options.application {
                Some(application) => application.issue_id(),
                None => request.issue_id(),
            };
            steps.push(format!(
                "Bulk transition the linked {} issues to Feedback Open, then Feedback Review: {}",
                jira.creation_project,
                bulk_transition_url(
                    &jira.base_url,
                    &jira.creation_project,
                    &jira.creation_issue_type,
                    &anchor
                )
            ));
        } else {
            steps.push(format!(
                "Move the {} issue to Feedback Open, then Feedback Review",
                jira.creation_project
            ));
        }
        steps.push(format!(
            "Comment {request} on each reviewed issue and assign it to the content verifier"
        ));

        self.operator.notify(&checklist(&steps));
    }

    fn closing_checklist(&self, result: &FixResult) {
        let mut steps = vec!["Update the CMS branches for the fixed applications".to_string()];
        if result.chunk_fixing_required() {
            steps.push("Line numbers changed: re-check the CMS code chunks".to_string());
        }
        self.operator.notify(&checklist(&steps));
    }
}

fn checklist(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
