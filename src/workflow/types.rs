use std::collections::BTreeSet;
use std::fmt;

use crate::issue::ChallengeRequestIssue;

/// Placeholder recorded when the operator deliberately leaves the fix
/// description blank by entering a single space.
pub const BLANK_DESCRIPTION: &str = "-";

/// Branches still open for fixing in this session. Removal is the only
/// mutation: a fixed branch can neither be chosen again nor receive its own
/// commit through a cherry-pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSet {
    branches: BTreeSet<String>,
}

impl BranchSet {
    pub fn contains(&self, branch: &str) -> bool {
        self.branches.contains(branch)
    }

    pub fn remove(&mut self, branch: &str) -> bool {
        self.branches.remove(branch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.branches.iter()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.branches.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for BranchSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            branches: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Map the operator's raw answer to the description that is recorded.
/// A single space is a deliberate blank; anything else that trims to
/// nothing is no description at all.
pub fn fix_description_from_input(input: &str) -> Option<String> {
    if input == " " {
        return Some(BLANK_DESCRIPTION.to_string());
    }
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn commit_message(request: &ChallengeRequestIssue, description: &str) -> String {
    format!("{request}: {description}")
}

/// What happened to one cherry-pick target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Applied {
        commit_id: String,
        resolved_by_operator: bool,
    },
    /// The branch already had the change.
    AlreadyPresent,
    Failed {
        reason: String,
    },
}

impl PickOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PickOutcome::Failed { .. })
    }
}

/// Per-branch results of propagating one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationReport {
    pub commit_id: String,
    pub outcomes: Vec<(String, PickOutcome)>,
}

impl PropagationReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    pub fn failed_branches(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(branch, _)| branch.as_str())
            .collect()
    }

    pub fn targets(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(branch, _)| branch.as_str()).collect()
    }
}

impl fmt::Display for PropagationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cherry-pick complete: {} succeeded, {} failed",
            self.successes(),
            self.failures()
        )?;
        let failed = self.failed_branches();
        if !failed.is_empty() {
            write!(f, " (resolve manually: {})", failed.join(", "))?;
        }
        Ok(())
    }
}

/// Whether the secure-branch fix reached the sibling branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropagationOutcome {
    #[default]
    NotTriggered,
    Completed(PropagationReport),
    /// Cherry-picking is disabled; the operator propagates by hand.
    Deferred,
    /// The operator cancelled the propagation.
    Skipped,
}

/// Everything one fix session produced.
#[derive(Debug, Clone, Default)]
pub struct FixResult {
    pub(crate) fix_messages: Vec<String>,
    pub(crate) fixed_branches: Vec<String>,
    pub(crate) abandoned_branches: Vec<String>,
    pub(crate) propagation: PropagationOutcome,
    pub(crate) chunk_fixing_required: bool,
}

impl FixResult {
    /// One description per fixed branch, in fix order.
    pub fn fix_messages(&self) -> &[String] {
        &self.fix_messages
    }

    pub fn fixed_branches(&self) -> &[String] {
        &self.fixed_branches
    }

    pub fn abandoned_branches(&self) -> &[String] {
        &self.abandoned_branches
    }

    pub fn propagation(&self) -> &PropagationOutcome {
        &self.propagation
    }

    pub fn propagated(&self) -> bool {
        matches!(
            self.propagation,
            PropagationOutcome::Completed(_) | PropagationOutcome::Deferred
        )
    }

    /// Whether CMS code chunks need re-checking because lines moved.
    pub fn chunk_fixing_required(&self) -> bool {
        self.chunk_fixing_required
    }

    pub fn is_empty(&self) -> bool {
        self.fix_messages.is_empty()
    }
}
