mod auth;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

/// Logger honoring `RUST_LOG`, showing warnings and errors when it is unset.
fn logger(env: env_logger::Env<'_>) -> env_logger::Builder {
    env_logger::Builder::from_env(env.default_filter_or("warn"))
}

#[tokio::main]
async fn main() -> Result<()> {
    logger(env_logger::Env::default()).init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting ciflakes");
    cli.execute().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{LevelFilter, Log};

    #[test]
    fn warnings_are_shown_without_rust_log() {
        let env = env_logger::Env::new().filter("CIFLAKES_TEST_UNSET_FILTER");
        let logger = logger(env).build();

        assert_eq!(logger.filter(), LevelFilter::Warn);
        assert!(logger.enabled(
            &log::Metadata::builder()
                .level(log::Level::Warn)
                .target("ciflakes::providers::circleci::scraper")
                .build()
        ));
    }
}
