use crate::config::Credentials;
use clap::{Args, Parser, Subcommand};

// Display order for credential options (placed at top of help text)
const CREDENTIAL_DISPLAY_ORDER: usize = 0;
// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(
    name = "sonarfix",
    version,
    about = "Fix static-analysis findings with a language model and open a pull request",
    long_about = None
)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: SONARFIX_LOG=] [default: info]
    #[arg(
        long,
        env = "SONARFIX_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default sonarfix.toml config file
    Init(InitArgs),
    /// Fix open findings on a new branch and open a pull request
    Run(RunArgs),
    /// Trigger an analysis of a branch and wait for it to finish
    Analyze(AnalyzeArgs),
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "sonarfix.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Analysis backend credentials
#[derive(Args, Debug, Clone)]
pub struct SonarArgs {
    /// Analysis organization key
    #[arg(long, env = "SONAR_ORGANIZATION_KEY", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub organization: String,

    /// Analysis project key
    #[arg(long, env = "SONAR_PROJECT_KEY", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub project_key: String,

    /// Analysis API token
    #[arg(
        long,
        env = "SONAR_TOKEN",
        hide_env_values = true,
        display_order = CREDENTIAL_DISPLAY_ORDER
    )]
    pub sonar_token: String,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file (initialize with `sonarfix init`)
    #[arg(long, default_value = "sonarfix.toml")]
    pub config: String,

    #[command(flatten)]
    pub sonar: SonarArgs,

    /// LLM API key
    #[arg(
        long,
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        display_order = CREDENTIAL_DISPLAY_ORDER
    )]
    pub api_key: String,

    /// Repository owner (user or organization)
    #[arg(long, env = "GITHUB_OWNER_ENV", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub github_owner: String,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO_NAME_ENV", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub github_repo: String,

    /// Token used to clone, push and open the pull request
    #[arg(
        long,
        env = "GITHUB_ACCESS_TOKEN_ENV",
        hide_env_values = true,
        display_order = CREDENTIAL_DISPLAY_ORDER
    )]
    pub github_token: String,

    /// Commit author name
    #[arg(long, env = "GITHUB_USERNAME_ENV", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub git_username: String,

    /// Commit author email
    #[arg(long, env = "GITHUB_EMAIL_ENV", display_order = CREDENTIAL_DISPLAY_ORDER)]
    pub git_email: String,

    /// Maximum number of cycles to run while a cycle produces no changes
    #[arg(long, default_value_t = 1)]
    pub max_cycles: u32,
}

impl RunArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            llm_api_key: self.api_key.clone(),
            github_owner: self.github_owner.clone(),
            github_repo: self.github_repo.clone(),
            github_token: self.github_token.clone(),
            git_username: self.git_username.clone(),
            git_email: self.git_email.clone(),
            ..self.sonar.credentials()
        }
    }
}

/// Arguments for the analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Path to config file
    #[arg(long, default_value = "sonarfix.toml")]
    pub config: String,

    #[command(flatten)]
    pub sonar: SonarArgs,

    /// Branch to analyze [default: sonar.branch from the config]
    #[arg(long)]
    pub branch: Option<String>,
}

impl SonarArgs {
    /// Credentials carrying only the analysis backend fields
    pub fn credentials(&self) -> Credentials {
        Credentials {
            organization: self.organization.clone(),
            project_key: self.project_key.clone(),
            sonar_token: self.sonar_token.clone(),
            ..Credentials::default()
        }
    }
}
