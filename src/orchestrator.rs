use crate::config::Settings;
use crate::error::{Error, Result};
use crate::fix::FixApplier;
use crate::git::RepositoryManager;
use crate::github::GithubClient;
use crate::llm;
use crate::sonar::SonarClient;
use crate::types::RunOutcome;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs the remediation cycle: clone, branch, fetch issues, fix, commit,
/// push and open a pull request
pub struct Orchestrator {
    sonar: SonarClient,
    fixer: FixApplier,
    repos: RepositoryManager,
    github: GithubClient,
    remote_url: String,
    analysis_branch: String,
    title: String,
}

impl Orchestrator {
    pub fn new(settings: &Settings) -> Self {
        let config = &settings.config;
        let credentials = &settings.credentials;
        let model = llm::create_client(&config.llm, &credentials.llm_api_key);

        Self {
            sonar: SonarClient::new(&config.sonar, credentials),
            fixer: FixApplier::new(model, config.fix.strategy),
            repos: RepositoryManager::new(
                &config.github.base_branch,
                &credentials.git_username,
                &credentials.git_email,
                &config.fix.commit_message,
            ),
            github: GithubClient::new(&config.github, credentials),
            remote_url: settings.remote_url(),
            analysis_branch: config.sonar.branch.clone(),
            title: config.fix.commit_message.clone(),
        }
    }

    /// Run one cycle
    ///
    /// Fails with [`Error::NoChanges`] when no file was modified, in which
    /// case no pull request is opened. The working branch has already been
    /// pushed by then and is left in place.
    pub async fn run(&self) -> Result<RunOutcome> {
        let workdir = tempfile::tempdir()?;
        debug!("Working directory: {}", workdir.path().display());

        let repo = self.repos.setup(&self.remote_url, workdir.path()).await?;
        let branch = self.repos.create_working_branch(&repo).await?;

        let issues = self
            .sonar
            .fetch_issues(&self.analysis_branch, &repo.root)
            .await?;
        if issues.is_empty() {
            info!("No open issues found");
        }

        self.fixer.apply_all(&issues).await?;

        if !self.repos.commit_and_push(&repo, &branch).await? {
            return Err(Error::NoChanges);
        }

        let pr = self.github.open(&branch.base, &branch.name, &self.title).await?;
        Ok(RunOutcome {
            changed: true,
            pull_request_url: Some(pr.url),
        })
    }

    /// Run up to `max_cycles` cycles until one produces a pull request
    ///
    /// Only [`Error::NoChanges`] starts another cycle; any other error is
    /// returned immediately.
    pub async fn run_cycles(&self, max_cycles: u32, interval: Duration) -> Result<RunOutcome> {
        let max_cycles = max_cycles.max(1);
        let mut cycle = 1;
        loop {
            info!("Starting cycle {}/{}", cycle, max_cycles);
            match self.run().await {
                Err(Error::NoChanges) if cycle < max_cycles => {
                    warn!(
                        "Cycle {} produced no changes, retrying in {}s",
                        cycle,
                        interval.as_secs()
                    );
                    tokio::time::sleep(interval).await;
                    cycle += 1;
                }
                result => return result,
            }
        }
    }
}
