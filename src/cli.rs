use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::output::{export_dry_run, export_report};
use crate::providers::circleci::{
    CircleCiProvider, LogUrlStrategy, LookbackWindow, ProjectSlug, ScanSettings,
};

#[derive(Parser)]
#[command(name = "ciflakes")]
#[command(author, version, about = "Failing & flaky test finder for CircleCI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./ciflakes.{toml,json,yaml,yml} when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// CircleCI personal API token
    #[arg(short, long, global = true, env = "CIRCLECI_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub organization of the project
    #[arg(long, global = true)]
    org: Option<String>,

    /// GitHub repository of the project
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Single-line JSON output
    #[arg(long, global = true, default_value_t = false)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count failing tests scraped from failed job logs
    Failures {
        /// Days of history to scan
        #[arg(short, long)]
        lookback_days: Option<u32>,

        /// Job logs downloaded at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Which step output of a failed job to scan
        #[arg(long, value_enum)]
        log_url_strategy: Option<LogUrlStrategy>,

        /// List branches and failed jobs without downloading logs
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Sum CircleCI's flaky test insights over recently built branches
    Flaky {
        /// Days of history to scan
        #[arg(short, long)]
        lookback_days: Option<u32>,
    },
}

impl Cli {
    fn settings(config: &Config) -> ScanSettings {
        ScanSettings {
            app_url: config.circleci.app_url.clone(),
            workflow: config.circleci.workflow.clone(),
            ignored_jobs: config.analysis.ignored_jobs.iter().cloned().collect::<HashSet<_>>(),
            log_url_strategy: config.analysis.log_url_strategy,
            concurrency: config.analysis.concurrency,
            request_timeout: Duration::from_secs(config.analysis.request_timeout_secs),
        }
    }

    /// Config file values with command-line flags applied on top.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(token) = &self.token {
            config.circleci.token = Some(token.clone());
        }
        if let Some(org) = &self.org {
            config.circleci.org = org.clone();
        }
        if let Some(repo) = &self.repo {
            config.circleci.repo = repo.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.compact {
            config.output.pretty = false;
        }

        if let Commands::Failures {
            lookback_days,
            concurrency,
            log_url_strategy,
            ..
        } = &self.command
        {
            if let Some(days) = lookback_days {
                config.analysis.lookback_days = *days;
            }
            if let Some(concurrency) = concurrency {
                config.analysis.concurrency = *concurrency;
            }
            if let Some(strategy) = log_url_strategy {
                config.analysis.log_url_strategy = *strategy;
            }
        }
        if let Commands::Flaky {
            lookback_days: Some(days),
        } = &self.command
        {
            config.analysis.flaky_lookback_days = *days;
        }

        Ok(config)
    }

    fn provider(config: &Config) -> Result<CircleCiProvider> {
        let token = config.circleci.token.as_deref().map(Token::from);
        if token.is_none() {
            log::warn!("No CircleCI token configured, only public projects can be read");
        }

        let project = ProjectSlug::new(&config.circleci.org, &config.circleci.repo);
        CircleCiProvider::new(&config.circleci.base_url, project, token, Self::settings(config))
            .context("Failed to set up CircleCI client")
    }

    fn write_output(&self, write: impl FnOnce(&mut dyn std::io::Write) -> Result<()>) -> Result<()> {
        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            write(&mut file)?;
            info!("Report written to: {}", output_path.display());
        } else {
            write(&mut std::io::stdout().lock())?;
        }
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;
        let provider = Self::provider(&config)?;
        let format = config.output.format;
        let pretty = config.output.pretty;

        match &self.command {
            Commands::Failures { dry_run: true, .. } => {
                let window =
                    LookbackWindow::trailing_days(Utc::now(), config.analysis.lookback_days)?;
                let report = provider.dry_run(&window).await?;
                self.write_output(|out| export_dry_run(&report, format, pretty, out))
            }
            Commands::Failures { .. } => {
                let window =
                    LookbackWindow::trailing_days(Utc::now(), config.analysis.lookback_days)?;
                let report = provider.collect_failures(&window).await?;
                info!(
                    "{} failing test occurrences across {} jobs",
                    report.total_failures(),
                    report.jobs.len()
                );
                self.write_output(|out| export_report(&report, format, pretty, out))
            }
            Commands::Flaky { .. } => {
                let window =
                    LookbackWindow::trailing_days(Utc::now(), config.analysis.flaky_lookback_days)?;
                let report = provider.collect_flaky(&window).await?;
                self.write_output(|out| export_report(&report, format, pretty, out))
            }
        }
    }
}
