use crate::operator::{Operator, Prompted};
use crate::workflow::types::{PickOutcome, PropagationReport};
use crate::workspace::{CherryPickResult, Repository};

/// Applies one commit onto a list of sibling branches.
pub struct CherryPickPropagator<'a> {
    repository: &'a dyn Repository,
    operator: &'a dyn Operator,
}

impl<'a> CherryPickPropagator<'a> {
    pub fn new(repository: &'a dyn Repository, operator: &'a dyn Operator) -> Self {
        Self {
            repository,
            operator,
        }
    }

    /// Cherry-pick `commit_id` onto every target in order. A failed target
    /// never stops the remaining ones. Nothing is pushed.
    pub async fn propagate(&self, targets: &[String], commit_id: &str) -> PropagationReport {
        let mut outcomes = Vec::with_capacity(targets.len());

        for branch in targets {
            let outcome = self.pick_onto(branch, commit_id).await;
            match &outcome {
                PickOutcome::Failed { reason } => {
                    tracing::warn!(branch = %branch, reason = %reason, "Cherry-pick failed");
                    self.operator
                        .notify(&format!("Cherry-pick onto \"{branch}\" failed: {reason}"));
                }
                PickOutcome::AlreadyPresent => {
                    tracing::info!(branch = %branch, "Branch already contains the fix");
                }
                PickOutcome::Applied { commit_id, .. } => {
                    tracing::info!(branch = %branch, commit = %commit_id, "Cherry-pick applied");
                }
            }
            outcomes.push((branch.clone(), outcome));
        }

        let report = PropagationReport {
            commit_id: commit_id.to_string(),
            outcomes,
        };
        self.operator.notify(&report.to_string());
        report
    }

    async fn pick_onto(&self, branch: &str, commit_id: &str) -> PickOutcome {
        if let Err(e) = self.repository.checkout(branch).await {
            return PickOutcome::Failed {
                reason: e.to_string(),
            };
        }

        match self.repository.cherry_pick(commit_id).await {
            Ok(CherryPickResult::Applied(new_id)) => PickOutcome::Applied {
                commit_id: new_id,
                resolved_by_operator: false,
            },
            Ok(CherryPickResult::AlreadyApplied) => PickOutcome::AlreadyPresent,
            Ok(CherryPickResult::Conflict(files)) => {
                self.resolve(branch, commit_id, &files).await
            }
            Err(e) => {
                self.abort(branch).await;
                PickOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn resolve(&self, branch: &str, commit_id: &str, files: &[String]) -> PickOutcome {
        if let Prompted::Cancelled = self.operator.resolve_conflict(branch, files).await {
            self.abort(branch).await;
            return PickOutcome::Failed {
                reason: format!("conflicts in {} left unresolved", files.join(", ")),
            };
        }

        match self.repository.complete_cherry_pick(commit_id).await {
            Ok(new_id) => PickOutcome::Applied {
                commit_id: new_id,
                resolved_by_operator: true,
            },
            Err(e) => {
                self.abort(branch).await;
                PickOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn abort(&self, branch: &str) {
        if let Err(e) = self.repository.abort_cherry_pick().await {
            tracing::error!(branch = %branch, error = %e, "Failed to abort cherry-pick");
        }
    }
}
