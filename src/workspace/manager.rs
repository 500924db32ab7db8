use std::path::{Path, PathBuf};

use crate::config::{GitConfig, WorkspaceConfig};
use crate::error::{AppError, Result};
use crate::workspace::git;

/// Manages the directories repositories are cloned into.
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
        }
    }

    /// Clean up an existing workspace directory and ensure its parent exists.
    async fn prepare_workspace_dir(path: &Path) -> Result<()> {
        if path.exists() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to clean workspace: {e}")))?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create workspace dir: {e}")))?;
        }
        Ok(())
    }

    /// Clone a fresh copy of `repository_name` and return its path.
    pub async fn clone_repository(
        &self,
        repository_name: &str,
        git_config: &GitConfig,
    ) -> Result<PathBuf> {
        let path = self.workspace_path(repository_name)?;
        Self::prepare_workspace_dir(&path).await?;

        let url = git_config.clone_url(repository_name);
        tracing::info!(url = %url, path = %path.display(), "Cloning repository");
        git::clone(&url, &path, git_config.token.as_deref()).await?;

        Ok(path)
    }

    fn workspace_path(&self, repository_name: &str) -> Result<PathBuf> {
        let valid = !repository_name.is_empty()
            && !repository_name.starts_with('.')
            && repository_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AppError::Workspace(format!(
                "Invalid repository name: {repository_name}"
            )));
        }
        Ok(self.base_dir.join(repository_name))
    }
}
