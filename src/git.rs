use crate::error::{Error, Result};
use crate::types::WorkingBranch;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

const REMOTE: &str = "origin";

/// A local clone
#[derive(Debug, Clone)]
pub struct Repository {
    pub root: PathBuf,
}

/// Clones, branches, commits and pushes through the `git` CLI
pub struct RepositoryManager {
    base_branch: String,
    username: String,
    email: String,
    commit_message: String,
}

impl RepositoryManager {
    pub fn new(base_branch: &str, username: &str, email: &str, commit_message: &str) -> Self {
        Self {
            base_branch: base_branch.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            commit_message: commit_message.to_string(),
        }
    }

    /// Clone the base branch into `local_dir` and configure the commit identity
    pub async fn setup(&self, remote_url: &str, local_dir: &Path) -> Result<Repository> {
        info!(
            "Cloning {} ({}) into {}",
            redact_url(remote_url),
            self.base_branch,
            local_dir.display()
        );
        let dir = local_dir.to_string_lossy();
        run_git(
            None,
            &["clone", "--branch", &self.base_branch, remote_url, &dir],
        )
        .await?;

        let repo = Repository {
            root: local_dir.to_path_buf(),
        };
        run_git(Some(&repo.root), &["fetch", "--all"]).await?;
        run_git(Some(&repo.root), &["config", "user.name", &self.username]).await?;
        run_git(Some(&repo.root), &["config", "user.email", &self.email]).await?;
        Ok(repo)
    }

    /// Create and check out `fixes_<timestamp>`, then push it so it exists upstream
    pub async fn create_working_branch(&self, repo: &Repository) -> Result<WorkingBranch> {
        self.create_branch(repo, &branch_name(Local::now())).await
    }

    pub async fn create_branch(&self, repo: &Repository, name: &str) -> Result<WorkingBranch> {
        run_git(Some(&repo.root), &["checkout", "-b", name]).await?;
        run_git(Some(&repo.root), &["push", REMOTE, name]).await?;
        info!("Created working branch {}", name);
        Ok(WorkingBranch {
            name: name.to_string(),
            base: self.base_branch.clone(),
        })
    }

    /// Stage everything and, if anything changed, commit and push it
    ///
    /// Returns `false` without committing or pushing when the tree is clean.
    pub async fn commit_and_push(&self, repo: &Repository, branch: &WorkingBranch) -> Result<bool> {
        run_git(Some(&repo.root), &["add", "-A"]).await?;

        let status = run_git(Some(&repo.root), &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            info!("No changes to commit");
            return Ok(false);
        }
        debug!("Changed paths:\n{}", status);

        run_git(Some(&repo.root), &["commit", "-m", &self.commit_message]).await?;
        run_git(
            Some(&repo.root),
            &["push", "--set-upstream", REMOTE, &branch.name],
        )
        .await?;
        info!("Pushed changes to {}", branch.name);
        Ok(true)
    }
}

/// Working branch name for a point in time, e.g. `fixes_20240131235959`
pub fn branch_name(now: DateTime<Local>) -> String {
    format!("fixes_{}", now.format("%Y%m%d%H%M%S"))
}

/// Hide the user info of every URL in `text`, e.g. a remote URL or git's
/// stderr quoting one
fn redact_url(text: &str) -> String {
    let mut redacted = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("://") {
        let (scheme, after) = rest.split_at(pos + 3);
        redacted.push_str(scheme);
        let authority_end = after
            .find(|c: char| c == '/' || c == '\'' || c == '"' || c.is_whitespace())
            .unwrap_or(after.len());
        rest = match after[..authority_end].rfind('@') {
            Some(at) => {
                redacted.push_str("***");
                &after[at..]
            }
            None => after,
        };
    }
    redacted.push_str(rest);
    redacted
}

async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    debug!("git {}", args[0]);
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| Error::Git(format!("failed to execute git {}: {}", args[0], e)))?;

    if !output.status.success() {
        return Err(Error::Git(format!(
            "git {} failed with {}: {}",
            args[0],
            output.status,
            redact_url(String::from_utf8_lossy(&output.stderr).trim())
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
