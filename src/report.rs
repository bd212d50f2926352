use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::providers::circleci::JobNumber;

/// Which analysis produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Failures scraped from job logs
    Failures,
    /// CircleCI's own flaky test insights
    Flaky,
}

impl ReportKind {
    pub fn count_label(self) -> &'static str {
        match self {
            Self::Failures => "Fail Count",
            Self::Flaky => "Flake Count",
        }
    }
}

/// Counters for one test within one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub count: usize,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_job: Option<JobNumber>,
}

/// A row of the per-job table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub test_name: String,
    #[serde(flatten)]
    pub record: FailureRecord,
    /// Link to the test results of `record.last_job`
    pub last_job_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailures {
    pub job_name: String,
    pub tests: Vec<TestFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ReportKind,
    pub project: String,
    pub collected_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub branches_scanned: usize,
    pub jobs: Vec<JobFailures>,
    /// Log fetch failures per job name; always empty for flaky reports
    pub failed_fetches: IndexMap<String, usize>,
}

impl FailureReport {
    pub fn total_failures(&self) -> usize {
        self.jobs
            .iter()
            .flat_map(|job| job.tests.iter())
            .map(|test| test.record.count)
            .sum()
    }
}

/// Branches and failed jobs found without scraping any logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunReport {
    pub project: String,
    pub lookback_days: u32,
    pub branches: Vec<String>,
    pub failed_jobs: Vec<FailedJobSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJobSummary {
    pub branch: String,
    pub job_name: String,
    pub job_number: JobNumber,
    pub started_at: Option<DateTime<Utc>>,
    pub url: String,
}
