use crate::editor::Editor;
use crate::error::Result;
use crate::issue::ChallengeRequestIssue;
use crate::operator::{ask_fix_description, Operator, Prompted};
use crate::workflow::propagate::CherryPickPropagator;
use crate::workflow::types::{commit_message, BranchSet, FixResult, PropagationOutcome};
use crate::workspace::Repository;

#[derive(Debug, Clone)]
pub struct FixSettings {
    /// Branch whose fix is propagated on multi-branch applications.
    pub secure_branch: String,
    /// When false the operator propagates the secure fix by hand.
    pub cherry_pick: bool,
}

enum Attempt {
    Committed { description: String },
    Abandoned,
}

/// Drives the operator through fixing one branch at a time.
pub struct BranchFixOrchestrator<'a> {
    repository: &'a dyn Repository,
    editor: &'a dyn Editor,
    operator: &'a dyn Operator,
    settings: FixSettings,
}

impl<'a> BranchFixOrchestrator<'a> {
    pub fn new(
        repository: &'a dyn Repository,
        editor: &'a dyn Editor,
        operator: &'a dyn Operator,
        settings: FixSettings,
    ) -> Self {
        Self {
            repository,
            editor,
            operator,
            settings,
        }
    }

    /// Run the fix loop until the operator stops. Fixed branches are removed
    /// from `candidates`.
    pub async fn run(
        &self,
        candidates: &mut BranchSet,
        request: &ChallengeRequestIssue,
    ) -> FixResult {
        let mut result = FixResult::default();

        let mut branch = match self.operator.next_branch(candidates, self.repository).await {
            Prompted::Answered(Some(branch)) => branch,
            Prompted::Answered(None) | Prompted::Cancelled => return result,
        };

        loop {
            match self.attempt(&branch, request).await {
                Attempt::Committed { description } => {
                    candidates.remove(&branch);
                    result.fix_messages.push(description);
                    result.fixed_branches.push(branch.clone());

                    if self.line_delta_changed(&branch).await {
                        result.chunk_fixing_required = true;
                    }

                    if self.triggers_propagation(&branch) {
                        result.propagation = self.propagate(candidates).await;
                    }
                }
                Attempt::Abandoned => {
                    tracing::info!(branch = %branch, "Fix attempt abandoned");
                    result.abandoned_branches.push(branch.clone());
                }
            }

            if !matches!(self.operator.fix_another().await, Prompted::Answered(true)) {
                break;
            }
            if candidates.is_empty() {
                self.operator.notify("No branches left to fix");
                break;
            }
            branch = match self.operator.next_branch(candidates, self.repository).await {
                Prompted::Answered(Some(branch)) => branch,
                Prompted::Answered(None) | Prompted::Cancelled => break,
            };
        }

        tracing::info!(
            fixed = result.fixed_branches.len(),
            abandoned = result.abandoned_branches.len(),
            propagated = result.propagated(),
            "Fix session finished"
        );
        result
    }

    async fn attempt(&self, branch: &str, request: &ChallengeRequestIssue) -> Attempt {
        if let Err(e) = self.repository.checkout(branch).await {
            tracing::warn!(branch = %branch, error = %e, "Checkout failed");
            self.operator
                .notify(&format!("Could not check out \"{branch}\": {e}"));
            return Attempt::Abandoned;
        }

        let path = self.repository.path();
        if let Err(e) = self.editor.open(path).await {
            self.operator.notify(&format!(
                "Could not open the editor ({e}); make the fix in {}",
                path.display()
            ));
        }

        if self.operator.confirm_fix_made(branch).await.is_cancelled() {
            return Attempt::Abandoned;
        }

        let description = match ask_fix_description(self.operator).await {
            Prompted::Answered(description) => description,
            Prompted::Cancelled => return Attempt::Abandoned,
        };
        let message = commit_message(request, &description);

        loop {
            match self.stage_and_commit(&message).await {
                Ok(commit_id) => {
                    tracing::info!(branch = %branch, commit = %commit_id, "Fix committed");
                    return Attempt::Committed { description };
                }
                Err(e) => {
                    tracing::warn!(branch = %branch, error = %e, "Commit failed");
                    if self
                        .operator
                        .confirm_commit_retry(branch, &e)
                        .await
                        .is_cancelled()
                    {
                        return Attempt::Abandoned;
                    }
                }
            }
        }
    }

    async fn stage_and_commit(&self, message: &str) -> Result<String> {
        self.repository.stage_all().await?;
        self.repository.commit(message).await
    }

    async fn line_delta_changed(&self, branch: &str) -> bool {
        match self.repository.last_commit_line_delta().await {
            Ok(delta) => delta != 0,
            Err(e) => {
                tracing::warn!(branch = %branch, error = %e, "Could not inspect the fix commit");
                true
            }
        }
    }

    fn triggers_propagation(&self, branch: &str) -> bool {
        self.repository.is_multi_branch_app() && branch == self.settings.secure_branch
    }

    async fn propagate(&self, candidates: &BranchSet) -> PropagationOutcome {
        let commit_id = match self.repository.last_commit_id().await {
            Ok(id) => id,
            Err(e) => {
                self.operator
                    .notify(&format!("Could not read the secure fix commit: {e}"));
                return PropagationOutcome::Skipped;
            }
        };
        let targets = candidates.to_vec();

        if !self.settings.cherry_pick {
            self.operator.notify(&format!(
                "Cherry-pick disabled; apply {commit_id} to {} by hand",
                targets.join(" ")
            ));
            return PropagationOutcome::Deferred;
        }

        if self
            .operator
            .confirm_propagation(&commit_id, &targets)
            .await
            .is_cancelled()
        {
            self.operator.notify("Cherry-pick skipped");
            return PropagationOutcome::Skipped;
        }

        let report = CherryPickPropagator::new(self.repository, self.operator)
            .propagate(&targets, &commit_id)
            .await;
        PropagationOutcome::Completed(report)
    }
}
