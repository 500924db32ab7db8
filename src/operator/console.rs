use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::issue::{ChallengeCreationIssue, ChallengeRequestIssue};
use crate::operator::{Operator, Prompted, EMPTY_DESCRIPTION_HINT};
use crate::ticket::types::{IssueId, WorkflowState};
use crate::workflow::types::{fix_description_from_input, BranchSet};
use crate::workspace::Repository;

/// Operator prompts on the terminal. Ctrl+C while a prompt is waiting
/// cancels that prompt instead of killing the process.
pub struct ConsoleOperator {
    secure_branch: String,
    stdin: Mutex<BufReader<Stdin>>,
}

/// Outcome of checking a typed branch name.
#[derive(Debug, PartialEq, Eq)]
enum BranchCheck {
    Valid,
    Invalid { suggestions: Vec<String> },
}

fn check_branch(
    input: &str,
    candidates: &BranchSet,
    secure_branch: &str,
    repository: &dyn Repository,
) -> BranchCheck {
    if candidates.contains(input) {
        return BranchCheck::Valid;
    }
    // Minified apps name their secure branches after the vulnerability.
    let suggestions = if !repository.is_multi_branch_app() && input == secure_branch {
        repository
            .secure_branch_suggestions()
            .into_iter()
            .filter(|b| candidates.contains(b))
            .collect()
    } else {
        Vec::new()
    };
    BranchCheck::Invalid { suggestions }
}

fn check_description(answer: &str) -> Result<String, String> {
    match fix_description_from_input(answer) {
        Some(_) => Ok(answer.to_string()),
        None => Err(EMPTY_DESCRIPTION_HINT.to_string()),
    }
}

impl ConsoleOperator {
    pub fn new(secure_branch: &str) -> Self {
        Self {
            secure_branch: secure_branch.to_string(),
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn ask(&self, prompt: &str) -> Prompted<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let mut stdin = self.stdin.lock().await;
        let mut line = String::new();
        tokio::select! {
            read = stdin.read_line(&mut line) => match read {
                Ok(0) => {
                    println!();
                    Prompted::Cancelled
                }
                Ok(_) => Prompted::Answered(line.trim_end_matches(['\r', '\n']).to_string()),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read operator input");
                    Prompted::Cancelled
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                Prompted::Cancelled
            }
        }
    }

    async fn press_enter(&self, prompt: &str) -> Prompted<()> {
        match self.ask(prompt).await {
            Prompted::Answered(_) => Prompted::Answered(()),
            Prompted::Cancelled => Prompted::Cancelled,
        }
    }

    async fn yes_no(&self, prompt: &str) -> Prompted<bool> {
        match self.ask(prompt).await {
            Prompted::Answered(answer) => {
                Prompted::Answered(answer.trim().eq_ignore_ascii_case("y"))
            }
            Prompted::Cancelled => Prompted::Cancelled,
        }
    }

    /// Re-ask until `parse` accepts the answer.
    async fn ask_valid<T, F>(&self, prompt: &str, parse: F) -> Prompted<T>
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync,
        T: Send,
    {
        loop {
            let answer = match self.ask(prompt).await {
                Prompted::Answered(answer) => answer,
                Prompted::Cancelled => return Prompted::Cancelled,
            };
            match parse(&answer) {
                Ok(value) => return Prompted::Answered(value),
                Err(message) => println!("{message}"),
            }
        }
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    fn notify(&self, message: &str) {
        println!("{message}");
    }

    async fn repository_name(&self) -> Prompted<String> {
        self.ask_valid("Enter repo name: ", |answer| {
            let name = answer.trim();
            if name.is_empty() {
                Err("Repository name cannot be empty".to_string())
            } else {
                Ok(name.to_string())
            }
        })
        .await
    }

    async fn request_issue(&self) -> Prompted<ChallengeRequestIssue> {
        self.ask_valid("Enter CHLRQ ticket number: ", |answer| {
            ChallengeRequestIssue::new(answer.trim()).map_err(|e| e.to_string())
        })
        .await
    }

    async fn creation_issue(&self) -> Prompted<ChallengeCreationIssue> {
        self.ask_valid("Enter CHLC ticket number: ", |answer| {
            ChallengeCreationIssue::new(answer.trim()).map_err(|e| e.to_string())
        })
        .await
    }

    async fn next_branch(
        &self,
        candidates: &BranchSet,
        repository: &dyn Repository,
    ) -> Prompted<Option<String>> {
        println!(
            "\nBranches: {}",
            candidates.iter().cloned().collect::<Vec<_>>().join(" ")
        );
        let mut prompt = "Enter name of branch to fix (empty to continue): ";
        loop {
            let branch = match self.ask(prompt).await {
                Prompted::Answered(answer) => answer.trim().to_string(),
                Prompted::Cancelled => return Prompted::Cancelled,
            };
            if branch.is_empty() {
                return Prompted::Answered(None);
            }

            match check_branch(&branch, candidates, &self.secure_branch, repository) {
                BranchCheck::Valid => return Prompted::Answered(Some(branch)),
                BranchCheck::Invalid { suggestions } => {
                    println!("\"{branch}\" is not a valid branch name");
                    if !suggestions.is_empty() {
                        println!(
                            "This app is Minified, enter the correct secure branch: {}",
                            suggestions.join(" ")
                        );
                    }
                }
            }
            prompt = "Enter name of branch: ";
        }
    }

    async fn confirm_fix_made(&self, branch: &str) -> Prompted<()> {
        println!("\nMake the fix on branch \"{branch}\" in the editor.");
        self.press_enter("Press [ENTER] when changes have been made").await
    }

    async fn fix_description(&self) -> Prompted<String> {
        self.ask_valid("Enter description of fix: ", check_description)
            .await
    }

    async fn confirm_commit_retry(&self, branch: &str, error: &AppError) -> Prompted<()> {
        println!("{error}");
        println!("No fix was committed on \"{branch}\". Make the fix before continuing.");
        self.press_enter("Press [ENTER] after fix").await
    }

    async fn fix_another(&self) -> Prompted<bool> {
        self.yes_no("\nFix another branch? (y/N): ").await
    }

    async fn confirm_propagation(&self, commit_id: &str, targets: &[String]) -> Prompted<()> {
        let short = &commit_id[..commit_id.len().min(8)];
        println!(
            "\nCherry-picking {short} onto {} branch(es): {}",
            targets.len(),
            targets.join(" ")
        );
        self.press_enter("Press [ENTER] to cherry-pick").await
    }

    async fn resolve_conflict(&self, branch: &str, files: &[String]) -> Prompted<()> {
        println!("\nCherry-pick onto \"{branch}\" has conflicts in:");
        for file in files {
            println!("\t{file}");
        }
        self.press_enter("Resolve the conflicts, then press [ENTER] to continue")
            .await
    }

    async fn confirm_push(&self) -> Prompted<()> {
        self.press_enter("\nPress [ENTER] to push to repo").await
    }

    async fn bulk_transition_required(&self) -> Prompted<bool> {
        self.yes_no("Is bulk transition required? (N/y): ").await
    }

    async fn confirm_request_transition(&self, issue: &IssueId) -> Prompted<()> {
        self.press_enter(&format!("\nPress [ENTER] to auto transition {issue}"))
            .await
    }

    async fn confirm_batch(&self, count: usize) -> Prompted<()> {
        self.press_enter(&format!("\nPress [ENTER] to auto transition [{count}] CHLCs"))
            .await
    }

    async fn confirm_issue_transition(
        &self,
        issue: &IssueId,
        target: WorkflowState,
    ) -> Prompted<()> {
        self.press_enter(&format!("Press [ENTER] to transition {issue} to {target}"))
            .await
    }
}
