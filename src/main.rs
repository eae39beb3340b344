mod cli;
mod config;
mod error;
mod fix;
mod git;
mod github;
mod llm;
mod orchestrator;
mod prompt;
mod sonar;
#[cfg(test)]
mod test_support;
mod types;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{AnalyzeArgs, Cli, Commands, InitArgs, RunArgs};
use config::{Config, Settings};
use orchestrator::Orchestrator;
use sonar::SonarClient;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|e| {
        eprintln!("Invalid log level '{}': {}", cli.log_level, e);
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init(args) => init(&args),
        Commands::Run(args) => run(&args).await,
        Commands::Analyze(args) => analyze(&args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(EXIT_FAILURE);
    }
}

/// Write the default config file
fn init(args: &InitArgs) -> anyhow::Result<()> {
    if Path::new(&args.config).exists() && !args.r#override {
        bail!(
            "{} already exists, pass --override to replace it",
            args.config
        );
    }
    std::fs::write(&args.config, config::DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", args.config))?;
    info!("Wrote {}", args.config);
    Ok(())
}

async fn run(args: &RunArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let settings = Settings::new(config, args.credentials())?;
    info!(
        "Starting the automated code fixer for {}/{}",
        settings.credentials.github_owner, settings.credentials.github_repo
    );

    let interval = Duration::from_secs(settings.config.sonar.polling_interval_secs);
    let outcome = Orchestrator::new(&settings)
        .run_cycles(args.max_cycles, interval)
        .await?;

    info!("Cycle finished, changed: {}", outcome.changed);
    if let Some(url) = outcome.pull_request_url {
        println!("Created PR: {}", url);
    }
    Ok(())
}

async fn analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let branch = args.branch.as_deref().unwrap_or(&config.sonar.branch);
    let credentials = args.sonar.credentials();
    credentials.validate_sonar()?;
    let sonar = SonarClient::new(&config.sonar, &credentials);

    let status = sonar
        .analyze_branch(branch)
        .await
        .with_context(|| format!("analysis of {} failed", branch))?;
    println!("Analysis of {} finished: {:?}", branch, status);
    Ok(())
}
