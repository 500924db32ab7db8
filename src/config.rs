use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub jira: JiraConfig,
    pub git: GitConfig,
    pub workspace: WorkspaceConfig,
    pub editor: EditorConfig,
    pub fix: FixConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub transitions: TransitionIds,
    pub creation_project: String,
    pub creation_issue_type: String,
    /// Account the creation issues are handed to once they reach feedback review.
    pub content_verifier_id: Option<String>,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("transitions", &self.transitions)
            .field("creation_project", &self.creation_project)
            .field("creation_issue_type", &self.creation_issue_type)
            .field("content_verifier_id", &self.content_verifier_id)
            .finish()
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: default_jira_base_url(),
            email: None,
            api_key: None,
            transitions: TransitionIds::default(),
            creation_project: "CHLC".to_string(),
            creation_issue_type: "challenge".to_string(),
            content_verifier_id: None,
        }
    }
}

/// Numeric workflow transition ids as defined by the tracker's workflow scheme.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TransitionIds {
    pub planned: u32,
    pub in_progress: u32,
    pub feedback_open: u32,
    pub feedback_review: u32,
    pub closed: u32,
}

impl Default for TransitionIds {
    fn default() -> Self {
        Self {
            planned: 281,
            in_progress: 291,
            feedback_open: 511,
            feedback_review: 521,
            closed: 191,
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct GitConfig {
    /// Remote prefix; the repository name is appended to build the clone URL.
    pub remote_base: String,
    pub token: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitConfig")
            .field("remote_base", &self.remote_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote_base: "https://github.com/SecureCodeWarrior".to_string(),
            token: None,
        }
    }
}

impl GitConfig {
    pub fn clone_url(&self, repository_name: &str) -> String {
        format!(
            "{}/{}.git",
            self.remote_base.trim_end_matches('/'),
            repository_name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/tmp/branchfix-repos"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EditorConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: "code".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FixConfig {
    /// Branch whose fix is cherry-picked onto every other branch of a full app.
    pub secure_branch: String,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            secure_branch: "secure".to_string(),
        }
    }
}

fn default_jira_base_url() -> String {
    "https://securecodewarrior.atlassian.net".to_string()
}

/// Ticket tracker credentials, resolved once per session and handed to the client.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("branchfix").required(false));
        }

        // Environment variable overrides with BRANCHFIX_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("BRANCHFIX")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// Resolve tracker credentials, naming every missing piece.
    pub fn credentials(&self) -> Result<Credentials> {
        let email = self.jira.email.as_deref().filter(|s| !s.is_empty());
        let api_key = self.jira.api_key.as_deref().filter(|s| !s.is_empty());

        match (email, api_key) {
            (Some(email), Some(api_key)) => Ok(Credentials {
                email: email.to_string(),
                api_key: api_key.to_string(),
            }),
            (email, api_key) => {
                let mut missing = Vec::new();
                if email.is_none() {
                    missing.push("no API email present");
                }
                if api_key.is_none() {
                    missing.push("no API key present");
                }
                Err(AppError::Credentials(format!(
                    "credentials not set up ({}); \
                     set BRANCHFIX__JIRA__EMAIL and BRANCHFIX__JIRA__API_KEY",
                    missing.join(", ")
                )))
            }
        }
    }
}
