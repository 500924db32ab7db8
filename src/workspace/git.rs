use std::collections::BTreeSet;
use std::path::Path;

use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    BranchType, CherrypickOptions, Cred, ErrorCode, FetchOptions, IndexAddOption, Oid,
    PushOptions, RemoteCallbacks, Repository, RepositoryState, Signature,
};

use crate::error::{AppError, Result};

/// Result of applying one commit onto the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickResult {
    /// The commit applied cleanly and a new commit was created.
    Applied(String),
    /// The branch already contains the change; nothing was committed.
    AlreadyApplied,
    /// The pick stopped on conflicts; the repository is left mid cherry-pick.
    Conflict(Vec<String>),
}

/// Branch names come from operator input; reject ones that look like options.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Build remote callbacks that authenticate with the token when one is
/// configured, otherwise with the user's credential helper or SSH agent.
fn make_callbacks(token: Option<&str>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed_types| {
        if let Some(token) = token {
            return Cred::userpass_plaintext("x-access-token", token);
        }
        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        let config = git2::Config::open_default()?;
        Cred::credential_helper(&config, url, username_from_url)
    });
    callbacks
}

fn make_fetch_options(token: Option<&str>) -> FetchOptions<'_> {
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(make_callbacks(token));
    opts
}

fn make_push_options(token: Option<&str>) -> PushOptions<'_> {
    let mut opts = PushOptions::new();
    opts.remote_callbacks(make_callbacks(token));
    opts
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now("branchfix", "branchfix@users.noreply.github.com")?),
    }
}

fn conflicted_paths(repo: &Repository) -> Result<Vec<String>> {
    let index = repo.index()?;
    let mut paths = BTreeSet::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.insert(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Ok(paths.into_iter().collect())
}

/// Clone a repository into the target directory.
///
/// Credentials are supplied through the callback only and never stored in
/// the remote URL.
pub async fn clone(url: &str, target: &Path, token: Option<&str>) -> Result<()> {
    if token.is_some() && !url.starts_with("https://") {
        return Err(AppError::Git(format!(
            "Token authentication requires an HTTPS clone URL, got: {url}"
        )));
    }

    let url = url.to_string();
    let target = target.to_path_buf();
    let token = token.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let fetch_opts = make_fetch_options(token.as_deref());
        RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(&url, &target)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Clone task panicked: {e}")))?
}

/// List local and remote-tracking branch names, deduplicated and sorted.
pub async fn list_branches(dir: &Path) -> Result<Vec<String>> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut names = BTreeSet::new();

        for branch in repo.branches(None)? {
            let (branch, kind) = branch?;
            let Some(name) = branch.name()? else {
                continue;
            };
            let name = match kind {
                BranchType::Local => name,
                BranchType::Remote => match name.split_once('/') {
                    Some((_, "HEAD")) | None => continue,
                    Some((_, short)) => short,
                },
            };
            names.insert(name.to_string());
        }

        Ok(names.into_iter().collect())
    })
    .await
    .map_err(|e| AppError::Git(format!("List-branches task panicked: {e}")))?
}

/// Checkout a branch, creating the local branch from `origin` when it only
/// exists remotely.
pub async fn checkout(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;

        if repo.find_branch(&branch_name, BranchType::Local).is_err() {
            let remote_ref = format!("refs/remotes/origin/{branch_name}");
            let commit = repo.find_reference(&remote_ref)?.peel_to_commit()?;
            let mut local = repo.branch(&branch_name, &commit, false)?;
            local.set_upstream(Some(&format!("origin/{branch_name}")))?;
        }

        let obj = repo.revparse_single(&format!("refs/heads/{branch_name}"))?;
        repo.checkout_tree(&obj, None)?;
        repo.set_head(&format!("refs/heads/{branch_name}"))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Checkout task panicked: {e}")))?
}

/// Stage all changes, including deletions.
pub async fn add_all(dir: &Path) -> Result<()> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Add-all task panicked: {e}")))?
}

/// Commit the index with a message and return the new commit id.
///
/// Fails with [`AppError::NothingToCommit`] when the index matches `HEAD`.
pub async fn commit(dir: &Path, message: &str) -> Result<String> {
    let dir = dir.to_path_buf();
    let message = message.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let sig = signature(&repo)?;
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;
        let head = repo.head()?;
        let parent = head.peel_to_commit()?;

        if parent.tree_id() == tree_oid {
            let branch = head.shorthand().unwrap_or("HEAD").to_string();
            return Err(AppError::NothingToCommit(branch));
        }

        let tree = repo.find_tree(tree_oid)?;
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        Ok(oid.to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Commit task panicked: {e}")))?
}

/// Id of the commit `HEAD` points at.
pub async fn head_commit_id(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Head-commit task panicked: {e}")))?
}

/// Net lines added minus lines removed by the `HEAD` commit.
pub async fn head_line_delta(dir: &Path) -> Result<i64> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let commit = repo.head()?.peel_to_commit()?;
        if commit.parent_count() == 0 {
            return Ok(0);
        }
        let parent_tree = commit.parent(0)?.tree()?;
        let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&commit.tree()?), None)?;
        let stats = diff.stats()?;
        Ok(stats.insertions() as i64 - stats.deletions() as i64)
    })
    .await
    .map_err(|e| AppError::Git(format!("Line-delta task panicked: {e}")))?
}

/// Cherry-pick a commit onto the checked-out branch.
///
/// On conflict the repository is left in the cherry-pick state so the
/// conflicts can be resolved in the working tree.
pub async fn cherry_pick(dir: &Path, commit_id: &str) -> Result<CherryPickResult> {
    let dir = dir.to_path_buf();
    let commit_id = commit_id.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let oid = Oid::from_str(&commit_id)?;
        let commit = repo.find_commit(oid)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        let mut opts = CherrypickOptions::new();
        opts.checkout_builder(checkout);

        if let Err(err) = repo.cherrypick(&commit, Some(&mut opts)) {
            if err.code() != ErrorCode::MergeConflict && err.code() != ErrorCode::Conflict {
                return Err(err.into());
            }
        }

        let mut index = repo.index()?;
        if index.has_conflicts() {
            return Ok(CherryPickResult::Conflict(conflicted_paths(&repo)?));
        }

        let tree_oid = index.write_tree()?;
        let parent = repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_oid {
            repo.cleanup_state()?;
            return Ok(CherryPickResult::AlreadyApplied);
        }

        let tree = repo.find_tree(tree_oid)?;
        let committer = signature(&repo)?;
        let message = commit.message().unwrap_or("Cherry-picked fix");
        let new_oid = repo.commit(
            Some("HEAD"),
            &commit.author(),
            &committer,
            message,
            &tree,
            &[&parent],
        )?;
        repo.cleanup_state()?;

        Ok(CherryPickResult::Applied(new_oid.to_string()))
    })
    .await
    .map_err(|e| AppError::Git(format!("Cherry-pick task panicked: {e}")))?
}

/// Whether a file still carries merge conflict markers.
fn has_conflict_markers(contents: &str) -> bool {
    let mut open = false;
    for line in contents.lines() {
        if line.starts_with("<<<<<<<") {
            open = true;
        } else if open && line.starts_with(">>>>>>>") {
            return true;
        }
    }
    false
}

/// Finish a cherry-pick whose conflicts were resolved in the working tree.
/// Fails while any conflicted file still carries conflict markers.
pub async fn complete_cherry_pick(dir: &Path, commit_id: &str) -> Result<String> {
    let dir = dir.to_path_buf();
    let commit_id = commit_id.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        if repo.state() != RepositoryState::CherryPick
            && repo.state() != RepositoryState::CherryPickSequence
        {
            return Err(AppError::CherryPick(
                "no cherry-pick in progress to complete".to_string(),
            ));
        }

        let workdir = repo
            .workdir()
            .ok_or_else(|| AppError::CherryPick("repository has no working tree".to_string()))?
            .to_path_buf();
        let conflicted = conflicted_paths(&repo)?;
        let unresolved: Vec<&str> = conflicted
            .iter()
            .filter(|path| {
                std::fs::read(workdir.join(path))
                    .map(|bytes| has_conflict_markers(&String::from_utf8_lossy(&bytes)))
                    .unwrap_or(false)
            })
            .map(String::as_str)
            .collect();
        if !unresolved.is_empty() {
            return Err(AppError::CherryPick(format!(
                "unresolved conflicts remain in: {}",
                unresolved.join(", ")
            )));
        }

        let mut index = repo.index()?;
        for path in &conflicted {
            if workdir.join(path).exists() {
                index.add_path(Path::new(path))?;
            } else {
                index.remove_path(Path::new(path))?;
            }
        }
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let original = repo.find_commit(Oid::from_str(&commit_id)?)?;
        let tree_oid = index.write_tree()?;
        let parent = repo.head()?.peel_to_commit()?;
        let tree = repo.find_tree(tree_oid)?;
        let committer = signature(&repo)?;
        let message = original.message().unwrap_or("Cherry-picked fix");
        let oid = repo.commit(
            Some("HEAD"),
            &original.author(),
            &committer,
            message,
            &tree,
            &[&parent],
        )?;
        repo.cleanup_state()?;

        Ok(oid.to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Complete-cherry-pick task panicked: {e}")))?
}

/// Abandon an in-progress cherry-pick and restore the branch head.
pub async fn abort_cherry_pick(dir: &Path) -> Result<()> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let head = repo.head()?.peel_to_commit()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(false);
        repo.reset(head.as_object(), git2::ResetType::Hard, Some(&mut checkout))?;
        repo.cleanup_state()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Abort-cherry-pick task panicked: {e}")))?
}

/// Push every local branch to origin.
pub async fn push_all(dir: &Path, token: Option<&str>) -> Result<()> {
    let dir = dir.to_path_buf();
    let token = token.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut refspecs = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                validate_branch_name(name)?;
                refspecs.push(format!("refs/heads/{name}:refs/heads/{name}"));
            }
        }

        let mut remote = repo.find_remote("origin")?;
        let mut push_opts = make_push_options(token.as_deref());
        remote.push(&refspecs, Some(&mut push_opts))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Push task panicked: {e}")))?
}
