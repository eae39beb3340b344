use crate::config::{Credentials, GithubConfig};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const USER_AGENT: &str = concat!("sonarfix/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
}

/// An opened pull request
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    #[serde(rename = "html_url")]
    pub url: String,
    #[serde(default)]
    pub number: u64,
}

/// Opens pull requests through the GitHub REST API
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, credentials: &Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: credentials.github_owner.clone(),
            repo: credentials.github_repo.clone(),
            token: credentials.github_token.clone(),
        }
    }

    /// Open a pull request merging `head` into `base`; a single attempt
    pub async fn open(&self, base: &str, head: &str, title: &str) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, self.owner, self.repo);
        debug!("POST {} (head={}, base={})", url, head, base);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .json(&CreatePullRequest { title, head, base })
            .send()
            .await
            .map_err(|e| Error::Hosting(format!("failed to create pull request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Hosting(format!(
                "failed to create pull request: {} {}",
                status, body
            )));
        }

        let pr: PullRequest = response
            .json()
            .await
            .map_err(|e| Error::Hosting(format!("invalid pull request response: {}", e)))?;
        info!("Created pull request #{}: {}", pr.number, pr.url);
        Ok(pr)
    }
}
