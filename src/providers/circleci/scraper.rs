use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::aggregator::Observation;
use super::client::CircleCiClient;
use super::log_parser::{join_messages, strip_ansi, FailureLineMatcher};
use super::types::{FailedJob, LogLine};
use crate::error::{Result, ScanError};

static OUTPUT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#":output_url "([^"]+)""#).unwrap());

/// Every step output URL listed in a job's artifact index, in order.
pub fn output_urls(index: &str) -> Vec<&str> {
    OUTPUT_URL
        .captures_iter(index)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Picks which step's output holds the test results.
pub trait LogUrlSelector: Send + Sync {
    fn select<'a>(&self, urls: &[&'a str]) -> Option<&'a str>;
}

/// The failing step is usually the last one that produced output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastOutputUrl;

impl LogUrlSelector for LastOutputUrl {
    fn select<'a>(&self, urls: &[&'a str]) -> Option<&'a str> {
        urls.last().copied()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOutputUrl;

impl LogUrlSelector for FirstOutputUrl {
    fn select<'a>(&self, urls: &[&'a str]) -> Option<&'a str> {
        urls.first().copied()
    }
}

/// Configurable choice of [`LogUrlSelector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogUrlStrategy {
    #[default]
    Last,
    First,
}

impl LogUrlStrategy {
    pub fn selector(self) -> Box<dyn LogUrlSelector> {
        match self {
            Self::Last => Box::new(LastOutputUrl),
            Self::First => Box::new(FirstOutputUrl),
        }
    }
}

/// What scraping one failed job produced.
#[derive(Debug)]
pub enum ScrapeOutcome {
    /// The artifact index listed no step output
    NoLogUrl,
    /// The log could not be downloaded or decoded
    FetchFailed(ScanError),
    /// Failing tests found in the log, possibly none
    Failures(Vec<Observation>),
}

pub struct LogScraper<'a> {
    client: &'a CircleCiClient,
    selector: Box<dyn LogUrlSelector>,
    matcher: FailureLineMatcher,
}

impl<'a> LogScraper<'a> {
    pub fn new(client: &'a CircleCiClient, selector: Box<dyn LogUrlSelector>) -> Self {
        Self {
            client,
            selector,
            matcher: FailureLineMatcher::default(),
        }
    }

    /// Finds the failing tests reported in a failed job's log.
    ///
    /// # Errors
    ///
    /// Only a transport failure while reading the artifact index is returned as
    /// an error. An index answered with an error status has no step outputs, and
    /// log download problems are reported as [`ScrapeOutcome::FetchFailed`].
    pub async fn scrape(&self, job: &FailedJob) -> Result<ScrapeOutcome> {
        let index = match self.client.artifact_index(job.job_number).await {
            Ok(index) => index,
            Err(ScanError::Api { status, message }) => {
                debug!(
                    "Artifact index of {}/{} (#{}) returned {status}: {message}",
                    job.branch, job.name, job.job_number
                );
                return Ok(ScrapeOutcome::NoLogUrl);
            }
            Err(e) => return Err(e),
        };

        let urls = output_urls(&index);
        let Some(log_url) = self.selector.select(&urls) else {
            debug!("No step output for {}/{} (#{})", job.branch, job.name, job.job_number);
            return Ok(ScrapeOutcome::NoLogUrl);
        };

        let text = match self.fetch_log_text(log_url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to get log file for {}/{}: {e}", job.branch, job.name);
                return Ok(ScrapeOutcome::FetchFailed(e));
            }
        };

        let observations = self
            .matcher
            .failed_tests(&text)
            .into_iter()
            .map(|test_id| Observation {
                job_name: job.name.clone(),
                test_id: test_id.to_string(),
                started_at: job.started_at,
                job_number: Some(job.job_number),
            })
            .collect::<Vec<_>>();

        if observations.is_empty() {
            debug!("No failing tests found in log of {}/{}", job.branch, job.name);
        }

        Ok(ScrapeOutcome::Failures(observations))
    }

    /// Downloads a step log and returns its messages as plain text.
    async fn fetch_log_text(&self, url: &str) -> Result<String> {
        let body = self.client.fetch_log_body(url).await?;
        let lines: Vec<LogLine> = serde_json::from_str(&body)?;
        Ok(strip_ansi(&join_messages(&lines)).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::circleci::types::ProjectSlug;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const INDEX: &str = r#"{:steps [{:actions [{:output_url "https://logs/checkout"}]}
        {:actions [{:output_url "https://logs/test"}]}]}"#;

    #[test]
    fn extracts_all_output_urls() {
        assert_eq!(
            output_urls(INDEX),
            vec!["https://logs/checkout", "https://logs/test"]
        );
        assert!(output_urls("{:steps []}").is_empty());
    }

    #[test]
    fn strategies_pick_ends() {
        let urls = output_urls(INDEX);
        assert_eq!(LogUrlStrategy::Last.selector().select(&urls), Some("https://logs/test"));
        assert_eq!(
            LogUrlStrategy::First.selector().select(&urls),
            Some("https://logs/checkout")
        );
        assert_eq!(LastOutputUrl.select(&[]), None);
    }

    fn failed_job(number: u64) -> FailedJob {
        FailedJob {
            branch: "main".to_string(),
            name: "unit_tests".to_string(),
            job_number: number,
            started_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        }
    }

    fn client(base_url: &str) -> CircleCiClient {
        CircleCiClient::new(
            base_url,
            ProjectSlug::new("org", "repo"),
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scrapes_failures_from_last_step_log() {
        let mut server = mockito::Server::new_async().await;
        let index = format!(
            r#"{{:steps [{{:output_url "{0}/logs/1"}} {{:output_url "{0}/logs/2"}}]}}"#,
            server.url()
        );
        let _mock = server
            .mock("GET", "/api/v1.1/project/github/org/repo/7")
            .with_status(200)
            .with_body(index)
            .create_async()
            .await;
        let log = server
            .mock("GET", "/logs/2")
            .with_status(200)
            .with_body(
                r#"[{"message": "\u001b[31m │ ✖  test/a.spec.js   2 │\u001b[0m"},
                    {"message": " │ ✖  test/b.spec.js   1 │"}]"#,
            )
            .create_async()
            .await;

        let client = client(&server.url());
        let scraper = LogScraper::new(&client, LogUrlStrategy::Last.selector());
        let outcome = scraper.scrape(&failed_job(7)).await.unwrap();

        let observations = match outcome {
            ScrapeOutcome::Failures(observations) => observations,
            other => panic!("expected failures, got {other:?}"),
        };
        let ids: Vec<_> = observations.iter().map(|o| o.test_id.as_str()).collect();
        assert_eq!(ids, vec!["test/a.spec.js", "test/b.spec.js"]);
        assert!(observations.iter().all(|o| o.job_number == Some(7)));
        log.assert_async().await;
    }

    #[tokio::test]
    async fn missing_output_url_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1.1/project/github/org/repo/8")
            .with_status(200)
            .with_body("{:steps []}")
            .create_async()
            .await;

        let client = client(&server.url());
        let scraper = LogScraper::new(&client, Box::new(LastOutputUrl));

        let outcome = scraper.scrape(&failed_job(8)).await.unwrap();
        assert!(matches!(outcome, ScrapeOutcome::NoLogUrl));
    }

    #[tokio::test]
    async fn artifact_index_error_status_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1.1/project/github/org/repo/10")
            .with_status(404)
            .with_body(r#"{"message":"Not found"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let scraper = LogScraper::new(&client, Box::new(LastOutputUrl));

        let outcome = scraper.scrape(&failed_job(10)).await.unwrap();
        assert!(matches!(outcome, ScrapeOutcome::NoLogUrl));
    }

    #[tokio::test]
    async fn artifact_index_transport_error_is_fatal() {
        let client = client("http://127.0.0.1:1");
        let scraper = LogScraper::new(&client, Box::new(LastOutputUrl));

        let result = scraper.scrape(&failed_job(11)).await;
        assert!(matches!(result, Err(ScanError::Network(_))));
    }

    #[tokio::test]
    async fn malformed_log_counts_as_fetch_failure() {
        let mut server = mockito::Server::new_async().await;
        let index = format!(r#":output_url "{}/logs/9""#, server.url());
        let _mock = server
            .mock("GET", "/api/v1.1/project/github/org/repo/9")
            .with_status(200)
            .with_body(index)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/logs/9")
            .with_status(200)
            .with_body("[{\"message\": \"trunc")
            .create_async()
            .await;

        let client = client(&server.url());
        let scraper = LogScraper::new(&client, Box::new(LastOutputUrl));

        let outcome = scraper.scrape(&failed_job(9)).await.unwrap();
        assert!(matches!(outcome, ScrapeOutcome::FetchFailed(ScanError::Json(_))));
    }
}
