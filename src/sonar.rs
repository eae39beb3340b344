use crate::config::{Credentials, SonarConfig};
use crate::error::{Error, Result};
use crate::types::{FileIssueSet, Finding};
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Issue types requested from the analysis backend
const ISSUE_TYPES: &str = "CODE_SMELL,BUG,VULNERABILITY";
/// Issue statuses that still need fixing
const ISSUE_STATUSES: &str = "OPEN,CONFIRMED,REOPENED";

#[derive(Deserialize, Debug)]
struct IssuesPage {
    issues: Vec<IssueRecord>,
}

#[derive(Deserialize, Debug)]
struct IssueRecord {
    component: String,
    #[serde(default)]
    line: Option<u32>,
    message: String,
}

#[derive(Deserialize, Debug)]
struct TaskEnvelope {
    task: Task,
}

#[derive(Deserialize, Debug)]
struct Task {
    id: String,
    #[serde(default)]
    status: Option<TaskStatus>,
}

/// Status of a background analysis task
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

/// SonarCloud Web API client
pub struct SonarClient {
    client: reqwest::Client,
    base_url: String,
    organization: String,
    project_key: String,
    token: String,
    polling_interval: Duration,
}

impl SonarClient {
    pub fn new(config: &SonarConfig, credentials: &Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization: credentials.organization.clone(),
            project_key: credentials.project_key.clone(),
            token: credentials.sonar_token.clone(),
            polling_interval: Duration::from_secs(config.polling_interval_secs),
        }
    }

    /// Fetch every open finding on `branch`, grouped by absolute path under `root`
    ///
    /// Pages are requested from 1 upwards until a page comes back empty.
    pub async fn fetch_issues(&self, branch: &str, root: &Path) -> Result<FileIssueSet> {
        let mut issues = FileIssueSet::new();
        let mut page = 1u32;

        loop {
            let result = self.fetch_page(branch, page).await?;
            if result.issues.is_empty() {
                debug!("Page {} is empty, stopping", page);
                break;
            }
            debug!("Page {}: {} issues", page, result.issues.len());

            for record in result.issues {
                let path = self.resolve_component(&record.component, root);
                issues.push(
                    path,
                    Finding {
                        line: record.line.unwrap_or(0),
                        message: record.message,
                    },
                );
            }
            page += 1;
        }

        info!(
            "Fetched {} issues in {} files",
            issues.finding_count(),
            issues.len()
        );
        trace!("Issues: {:?}", issues);
        Ok(issues)
    }

    async fn fetch_page(&self, branch: &str, page: u32) -> Result<IssuesPage> {
        let page = page.to_string();
        let url = self.url(
            "issues/search",
            &[
                ("organization", self.organization.as_str()),
                ("projects", self.project_key.as_str()),
                ("types", ISSUE_TYPES),
                ("branch", branch),
                ("statuses", ISSUE_STATUSES),
                ("p", page.as_str()),
            ],
        )?;
        debug!("GET {}", url);
        let response = self.client.get(url).basic_auth(&self.token, Some("")).send().await;
        read_json(response, "fetch issues").await
    }

    /// Map a component key such as `proj:src/a.py` to `<root>/src/a.py`
    pub fn resolve_component(&self, component: &str, root: &Path) -> PathBuf {
        let prefix = format!("{}:", self.project_key);
        let relative = component.strip_prefix(&prefix).unwrap_or(component);
        root.join(relative)
    }

    /// Ask the backend to analyze `branch` and return the background task id
    pub async fn trigger_analysis(&self, branch: &str) -> Result<String> {
        let url = self.url(
            "scanner/scan",
            &[("project", self.project_key.as_str()), ("branch", branch)],
        )?;
        debug!("POST {}", url);
        let response = self.client.post(url).basic_auth(&self.token, Some("")).send().await;
        let envelope: TaskEnvelope = read_json(response, "trigger analysis").await?;
        info!("Started analysis with task ID: {}", envelope.task.id);
        Ok(envelope.task.id)
    }

    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let url = self.url("ce/task", &[("id", task_id)])?;
        let response = self.client.get(url).basic_auth(&self.token, Some("")).send().await;
        let envelope: TaskEnvelope = read_json(response, "get analysis task status").await?;
        Ok(envelope.task.status.unwrap_or(TaskStatus::Unknown))
    }

    /// Poll a task at a fixed interval until it reaches a terminal status
    pub async fn wait_for_task(&self, task_id: &str) -> Result<TaskStatus> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.polling_interval).await;
            let status = self.task_status(task_id).await?;
            let elapsed = started.elapsed().as_secs();
            if status.is_terminal() {
                info!(
                    "Analysis task completed with status: {:?} (elapsed {}s)",
                    status, elapsed
                );
                return Ok(status);
            }
            info!(
                "Analysis task status: {:?}, waiting... (elapsed {}s)",
                status, elapsed
            );
        }
    }

    /// Trigger an analysis of `branch` and block until it finishes
    pub async fn analyze_branch(&self, branch: &str) -> Result<TaskStatus> {
        let task_id = self.trigger_analysis(branch).await?;
        self.wait_for_task(&task_id).await
    }

    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), params)
            .map_err(|e| Error::Backend(format!("invalid URL for {}: {}", endpoint, e)))
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Result<reqwest::Response>,
    action: &str,
) -> Result<T> {
    let response =
        response.map_err(|e| Error::Backend(format!("failed to {}: {}", action, e)))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Backend(format!(
            "failed to {}: {} {}",
            action, status, body
        )));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Backend(format!("failed to {}: invalid response: {}", action, e)))
}
