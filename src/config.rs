use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default config file written by `sonarfix init`
pub const DEFAULT_CONFIG: &str = r#"[sonar]
base_url = "https://sonarcloud.io/api"
branch = "main"
polling_interval_secs = 15

[llm]
# "chat" for /chat/completions, "completion" for the legacy /completions endpoint
api = "chat"
base_url = "https://api.openai.com/v1"
model = "gpt-3.5-turbo"
max_tokens = 3000

[github]
api_url = "https://api.github.com"
base_branch = "main"
# remote_url = "https://github.com/owner/repo.git"

[fix]
# "full_file" replaces the whole file, "line_range" patches one finding at a time
strategy = "full_file"
commit_message = "Apply automated fixes"
"#;

/// Non-secret settings read from the config file
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sonar: SonarConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub fix: FixConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SonarConfig {
    #[serde(default = "default_sonar_url")]
    pub base_url: String,
    /// Branch whose findings are fetched
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            base_url: default_sonar_url(),
            branch: default_branch(),
            polling_interval_secs: default_polling_interval_secs(),
        }
    }
}

/// Request/response shape of the model endpoint
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelApi {
    #[default]
    Chat,
    Completion,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub api: ModelApi,
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api: ModelApi::default(),
            base_url: default_llm_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GithubConfig {
    #[serde(default = "default_github_url")]
    pub api_url: String,
    /// Branch that is cloned and that pull requests target
    #[serde(default = "default_branch")]
    pub base_branch: String,
    /// Clone URL override (defaults to the token-authenticated github.com URL)
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_url(),
            base_branch: default_branch(),
            remote_url: None,
        }
    }
}

/// How a model reply is applied to a file
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatchStrategy {
    /// Replace the whole file with the reply
    #[default]
    FullFile,
    /// Ask once per finding and splice the reply in at the finding's line
    LineRange,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FixConfig {
    #[serde(default)]
    pub strategy: PatchStrategy,
    /// Used for both the commit and the pull request title
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            strategy: PatchStrategy::default(),
            commit_message: default_commit_message(),
        }
    }
}

fn default_sonar_url() -> String {
    "https://sonarcloud.io/api".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_polling_interval_secs() -> u64 {
    15
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    3000
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_commit_message() -> String {
    "Apply automated fixes".to_string()
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path, e)))?;
        Self::parse(&content).map_err(|e| Error::Config(format!("{}: {}", path, e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Secrets and identities supplied through the environment
#[derive(Clone, Default)]
pub struct Credentials {
    pub organization: String,
    pub project_key: String,
    pub sonar_token: String,
    pub llm_api_key: String,
    pub github_owner: String,
    pub github_repo: String,
    pub github_token: String,
    pub git_username: String,
    pub git_email: String,
}

impl Credentials {
    /// Reject values that are set but empty
    pub fn validate(&self) -> Result<()> {
        self.validate_sonar()?;
        check_non_empty(&[
            ("OPENAI_API_KEY", &self.llm_api_key),
            ("GITHUB_OWNER_ENV", &self.github_owner),
            ("GITHUB_REPO_NAME_ENV", &self.github_repo),
            ("GITHUB_ACCESS_TOKEN_ENV", &self.github_token),
            ("GITHUB_USERNAME_ENV", &self.git_username),
            ("GITHUB_EMAIL_ENV", &self.git_email),
        ])
    }

    /// Reject empty analysis backend values; the other fields are not checked
    pub fn validate_sonar(&self) -> Result<()> {
        check_non_empty(&[
            ("SONAR_ORGANIZATION_KEY", &self.organization),
            ("SONAR_PROJECT_KEY", &self.project_key),
            ("SONAR_TOKEN", &self.sonar_token),
        ])
    }
}

fn check_non_empty(fields: &[(&str, &String)]) -> Result<()> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(Error::Config(format!("{} is empty", name)));
        }
    }
    Ok(())
}

/// Everything a cycle needs, built once at start-up
#[derive(Clone)]
pub struct Settings {
    pub config: Config,
    pub credentials: Credentials,
}

impl Settings {
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        credentials.validate()?;
        Ok(Self {
            config,
            credentials,
        })
    }

    /// URL the repository is cloned from and pushed to
    pub fn remote_url(&self) -> String {
        match &self.config.github.remote_url {
            Some(url) => url.clone(),
            None => format!(
                "https://{}@github.com/{}/{}.git",
                self.credentials.github_token,
                self.credentials.github_owner,
                self.credentials.github_repo
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::credentials;

    #[test]
    fn test_default_config_file_matches_defaults() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            "[llm]\napi = \"completion\"\nmodel = \"text-davinci-003\"\n\n[fix]\nstrategy = \"line_range\"\n",
        )
        .unwrap();
        assert_eq!(config.llm.api, ModelApi::Completion);
        assert_eq!(config.llm.model, "text-davinci-003");
        assert_eq!(config.llm.max_tokens, 3000);
        assert_eq!(config.fix.strategy, PatchStrategy::LineRange);
        assert_eq!(config.sonar.polling_interval_secs, 15);
        assert_eq!(config.github.base_branch, "main");
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!(Config::parse("[fix]\nstrategy = \"diff\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[sonar\n").unwrap();
        let err = Config::load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_credential_rejected() {
        let mut creds = credentials();
        creds.github_token = " ".into();
        let err = Settings::new(Config::default(), creds).err().unwrap();
        assert_eq!(err.to_string(), "Config: GITHUB_ACCESS_TOKEN_ENV is empty");
    }

    #[test]
    fn test_sonar_credentials_checked_alone() {
        let mut creds = Credentials {
            organization: "org".into(),
            project_key: "proj".into(),
            sonar_token: "token".into(),
            ..Credentials::default()
        };
        assert!(creds.validate_sonar().is_ok());
        assert!(creds.validate().is_err());

        creds.sonar_token = String::new();
        let err = creds.validate_sonar().unwrap_err();
        assert_eq!(err.to_string(), "Config: SONAR_TOKEN is empty");
    }

    #[test]
    fn test_remote_url() {
        let settings = Settings::new(Config::default(), credentials()).unwrap();
        assert_eq!(
            settings.remote_url(),
            "https://gh-token@github.com/owner/repo.git"
        );

        let mut config = Config::default();
        config.github.remote_url = Some("/tmp/remote.git".into());
        let settings = Settings::new(config, credentials()).unwrap();
        assert_eq!(settings.remote_url(), "/tmp/remote.git");
    }
}
