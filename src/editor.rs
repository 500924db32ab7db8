use std::path::Path;

use async_trait::async_trait;

use crate::config::EditorConfig;
use crate::error::{AppError, Result};

/// Opens a working tree for the operator to edit.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn open(&self, path: &Path) -> Result<()>;
}

/// Launches the configured external editor command on the repository path.
///
/// GUI editors such as VS Code return as soon as the window opens; the
/// operator confirms separately when the fix is done.
pub struct ExternalEditor {
    command: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl Editor for ExternalEditor {
    async fn open(&self, path: &Path) -> Result<()> {
        tracing::debug!(command = %self.command, path = %path.display(), "Opening editor");

        let status = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .status()
            .await
            .map_err(|e| AppError::Editor(format!("Failed to launch {}: {e}", self.command)))?;

        if !status.success() {
            return Err(AppError::Editor(format!(
                "{} exited with {status}",
                self.command
            )));
        }
        Ok(())
    }
}
