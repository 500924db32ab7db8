use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::workspace::git::{self, CherryPickResult};

/// A cloned repository the fix session works in.
#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// Root of the working tree.
    fn path(&self) -> &Path;

    /// Whether this is a full application whose secure branch fix must reach
    /// every other branch.
    fn is_multi_branch_app(&self) -> bool;

    /// Branches an operator probably meant when asking for the secure branch
    /// of a minified application.
    fn secure_branch_suggestions(&self) -> Vec<String>;

    async fn branches(&self) -> Result<Vec<String>>;

    async fn checkout(&self, branch: &str) -> Result<()>;

    async fn stage_all(&self) -> Result<()>;

    /// Commit the staged changes, returning the new commit id.
    async fn commit(&self, message: &str) -> Result<String>;

    async fn last_commit_id(&self) -> Result<String>;

    /// Lines added minus lines removed by the last commit.
    async fn last_commit_line_delta(&self) -> Result<i64>;

    async fn cherry_pick(&self, commit_id: &str) -> Result<CherryPickResult>;

    /// Finish a conflicted cherry-pick after the conflicts were resolved by hand.
    async fn complete_cherry_pick(&self, commit_id: &str) -> Result<String>;

    async fn abort_cherry_pick(&self) -> Result<()>;

    async fn push_all(&self) -> Result<()>;
}

/// [`Repository`] backed by a git2 working copy.
pub struct GitRepository {
    name: String,
    path: PathBuf,
    secure_branch: String,
    branches: Vec<String>,
    token: Option<String>,
}

impl GitRepository {
    pub async fn open(
        name: &str,
        path: PathBuf,
        secure_branch: &str,
        token: Option<String>,
    ) -> Result<Self> {
        let branches = git::list_branches(&path).await?;
        Ok(Self {
            name: name.to_string(),
            path,
            secure_branch: secure_branch.to_string(),
            branches,
            token,
        })
    }
}

#[async_trait]
impl Repository for GitRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_multi_branch_app(&self) -> bool {
        self.branches.iter().any(|b| b == &self.secure_branch)
    }

    fn secure_branch_suggestions(&self) -> Vec<String> {
        self.branches
            .iter()
            .filter(|b| b.contains(&self.secure_branch))
            .cloned()
            .collect()
    }

    async fn branches(&self) -> Result<Vec<String>> {
        Ok(self.branches.clone())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        git::checkout(&self.path, branch).await
    }

    async fn stage_all(&self) -> Result<()> {
        git::add_all(&self.path).await
    }

    async fn commit(&self, message: &str) -> Result<String> {
        git::commit(&self.path, message).await
    }

    async fn last_commit_id(&self) -> Result<String> {
        git::head_commit_id(&self.path).await
    }

    async fn last_commit_line_delta(&self) -> Result<i64> {
        git::head_line_delta(&self.path).await
    }

    async fn cherry_pick(&self, commit_id: &str) -> Result<CherryPickResult> {
        git::cherry_pick(&self.path, commit_id).await
    }

    async fn complete_cherry_pick(&self, commit_id: &str) -> Result<String> {
        git::complete_cherry_pick(&self.path, commit_id).await
    }

    async fn abort_cherry_pick(&self) -> Result<()> {
        git::abort_cherry_pick(&self.path).await
    }

    async fn push_all(&self) -> Result<()> {
        git::push_all(&self.path, self.token.as_deref()).await
    }
}
