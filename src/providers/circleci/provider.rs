use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};

use super::aggregator::{FailureAggregator, Observation};
use super::client::CircleCiClient;
use super::links::{job_tests_url, job_url};
use super::pagination::{walk_pages, LookbackWindow};
use super::scraper::{LogScraper, LogUrlStrategy, ScrapeOutcome};
use super::types::{FailedJob, FlakyTest, Pipeline, ProjectSlug, Workflow};
use crate::auth::Token;
use crate::error::Result;
use crate::output::PhaseProgress;
use crate::report::{
    DryRunReport, FailedJobSummary, FailureReport, JobFailures, ReportKind, TestFailure,
};

/// Knobs for one scan, resolved from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Web app base URL used for report links
    pub app_url: String,
    /// Workflow whose runs are inspected on every branch
    pub workflow: String,
    /// Jobs excluded from analysis whatever their status
    pub ignored_jobs: HashSet<String>,
    pub log_url_strategy: LogUrlStrategy,
    /// Number of job logs scraped at the same time
    pub concurrency: usize,
    pub request_timeout: Duration,
}

/// CircleCI failing and flaky test provider.
///
/// Discovers branches built in the look-back window, walks their workflows and
/// failed jobs, scrapes the failing step logs and aggregates failing test ids.
pub struct CircleCiProvider {
    pub client: CircleCiClient,
    settings: ScanSettings,
}

impl CircleCiProvider {
    /// Creates a provider for `project` on the CircleCI instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built or `base_url` is invalid.
    pub fn new(
        base_url: &str,
        project: ProjectSlug,
        token: Option<Token>,
        settings: ScanSettings,
    ) -> Result<Self> {
        let client = CircleCiClient::new(base_url, project, token, settings.request_timeout)?;

        Ok(Self { client, settings })
    }

    fn project(&self) -> &ProjectSlug {
        &self.client.project
    }

    /// Names of the branches with a pipeline updated inside the window, sorted.
    pub async fn discover_branches(&self, window: &LookbackWindow) -> Result<Vec<String>> {
        let pipelines: Vec<Pipeline> = walk_pages(
            |page_token| self.client.pipelines_page(page_token),
            |pipeline: &Pipeline| window.pipeline_is_too_old(pipeline.updated_at),
        )
        .try_collect()
        .await?;

        let branches: BTreeSet<String> = pipelines
            .iter()
            .filter_map(Pipeline::branch)
            .map(ToString::to_string)
            .collect();

        info!(
            "Found {} branches across {} recent pipelines",
            branches.len(),
            pipelines.len()
        );

        Ok(branches.into_iter().collect())
    }

    /// Runs of the configured workflow on `branch` created after the window start.
    pub async fn recent_workflows(
        &self,
        branch: &str,
        window: &LookbackWindow,
    ) -> Result<Vec<Workflow>> {
        walk_pages(
            |page_token| {
                self.client
                    .workflow_runs_page(&self.settings.workflow, branch, page_token)
            },
            |workflow: &Workflow| window.workflow_is_too_old(workflow.created_at),
        )
        .try_collect()
        .await
    }

    /// Failed, non-ignored jobs of every recent workflow on `branch`.
    ///
    /// Jobs keep workflow order, then the order the job list returned them in.
    pub async fn failed_jobs(
        &self,
        branch: &str,
        window: &LookbackWindow,
    ) -> Result<Vec<FailedJob>> {
        let workflows = self.recent_workflows(branch, window).await?;
        debug!("Branch {branch}: {} recent workflows", workflows.len());

        let mut failed = Vec::new();
        for workflow in &workflows {
            let jobs = self.client.workflow_jobs(&workflow.id).await?;

            for job in jobs {
                if !job.is_failed() || self.settings.ignored_jobs.contains(&job.name) {
                    continue;
                }
                let Some(job_number) = job.job_number else {
                    debug!("Skipping failed job {} without a job number", job.name);
                    continue;
                };
                failed.push(FailedJob {
                    branch: branch.to_string(),
                    name: job.name,
                    job_number,
                    started_at: job.started_at,
                });
            }
        }

        Ok(failed)
    }

    async fn failed_jobs_for_branches(
        &self,
        branches: &[String],
        window: &LookbackWindow,
        progress: &PhaseProgress,
    ) -> Result<Vec<FailedJob>> {
        let mut failed = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            progress.update(&format!("{branch} ({}/{})", i + 1, branches.len()));
            failed.extend(self.failed_jobs(branch, window).await?);
        }
        Ok(failed)
    }

    /// Scrapes every job's log and folds the results into `aggregator`.
    ///
    /// Up to `concurrency` logs are in flight; results are applied in job order.
    async fn scrape_into(
        &self,
        jobs: &[FailedJob],
        aggregator: &mut FailureAggregator,
        progress: &PhaseProgress,
    ) -> Result<()> {
        let scraper = LogScraper::new(&self.client, self.settings.log_url_strategy.selector());
        let scraper = &scraper;

        let mut outcomes = stream::iter(jobs)
            .map(|job| async move { (job, scraper.scrape(job).await) })
            .buffered(self.settings.concurrency.max(1));

        let mut done = 0;
        while let Some((job, outcome)) = outcomes.next().await {
            match outcome? {
                ScrapeOutcome::NoLogUrl => {}
                ScrapeOutcome::FetchFailed(e) => {
                    debug!("Log of job #{} not counted: {e}", job.job_number);
                    aggregator.record_fetch_failure(&job.name);
                }
                ScrapeOutcome::Failures(observations) => {
                    observations
                        .into_iter()
                        .for_each(|observation| aggregator.observe(observation));
                }
            }
            done += 1;
            progress.update(&format!("{done}/{}", jobs.len()));
        }

        Ok(())
    }

    /// Scrapes the logs of failed jobs and counts failing tests per job name.
    ///
    /// Progress is displayed in three phases:
    /// 1. Discovering branches from recent pipelines
    /// 2. Collecting failed jobs from each branch's workflows
    /// 3. Scraping the failed jobs' logs
    ///
    /// # Errors
    ///
    /// Any failure to read pipelines, workflows or jobs aborts the run, as does a
    /// transport error on an artifact index. Log download failures are only
    /// tallied in the report.
    pub async fn collect_failures(&self, window: &LookbackWindow) -> Result<FailureReport> {
        info!("Collecting failing tests for {}", self.project());

        let progress = PhaseProgress::start(3, "Discovering branches");
        let branches = self.discover_branches(window).await?;

        let progress = progress.next_phase(
            &format!("Found {} branches", branches.len()),
            "Collecting failed jobs",
        );
        let jobs = self
            .failed_jobs_for_branches(&branches, window, &progress)
            .await?;
        info!("Found {} failed jobs", jobs.len());

        let progress = progress.next_phase(
            &format!("Collected {} failed jobs", jobs.len()),
            "Scraping job logs",
        );
        let mut aggregator = FailureAggregator::new();
        self.scrape_into(&jobs, &mut aggregator, &progress).await?;
        progress.finish("Scraped all job logs");

        if aggregator.is_empty() {
            info!("No failing tests found in {} job logs", jobs.len());
        }
        if !aggregator.failed_fetches().is_empty() {
            warn!(
                "{} job logs could not be downloaded",
                aggregator.failed_fetches().values().sum::<usize>()
            );
        }

        Ok(self.build_report(ReportKind::Failures, window, branches.len(), aggregator))
    }

    /// Lists recent branches and their failed jobs without downloading any log.
    pub async fn dry_run(&self, window: &LookbackWindow) -> Result<DryRunReport> {
        let progress = PhaseProgress::start(2, "Discovering branches");
        let branches = self.discover_branches(window).await?;

        let progress = progress.next_phase(
            &format!("Found {} branches", branches.len()),
            "Collecting failed jobs",
        );
        let jobs = self
            .failed_jobs_for_branches(&branches, window, &progress)
            .await?;
        progress.finish(&format!("Collected {} failed jobs", jobs.len()));

        let app_url = &self.settings.app_url;
        let failed_jobs = jobs
            .into_iter()
            .map(|job| FailedJobSummary {
                url: job_url(app_url, self.project(), job.job_number),
                branch: job.branch,
                job_name: job.name,
                job_number: job.job_number,
                started_at: job.started_at,
            })
            .collect();

        Ok(DryRunReport {
            project: self.project().to_string(),
            lookback_days: window.days,
            branches,
            failed_jobs,
        })
    }

    /// Sums CircleCI's flaky test insights over every recently built branch.
    pub async fn collect_flaky(&self, window: &LookbackWindow) -> Result<FailureReport> {
        info!("Collecting flaky tests for {}", self.project());

        let progress = PhaseProgress::start(2, "Discovering branches");
        let branches = self.discover_branches(window).await?;

        let progress = progress.next_phase(
            &format!("Found {} branches", branches.len()),
            "Fetching flaky test insights",
        );
        let mut aggregator = FailureAggregator::new();
        for branch in &branches {
            progress.update(branch);
            let response = self.client.flaky_tests(branch).await?;
            debug!(
                "Branch {branch}: {} flaky tests",
                response.total_flaky_tests.unwrap_or(response.flaky_tests.len())
            );
            aggregator.merge(flaky_aggregate(response.flaky_tests));
        }
        progress.finish("Fetched flaky test insights");

        Ok(self.build_report(ReportKind::Flaky, window, branches.len(), aggregator))
    }

    fn build_report(
        &self,
        kind: ReportKind,
        window: &LookbackWindow,
        branches_scanned: usize,
        aggregator: FailureAggregator,
    ) -> FailureReport {
        let (groups, failed_fetches) = aggregator.into_parts();
        let app_url = &self.settings.app_url;

        let jobs = groups
            .into_iter()
            .map(|(job_name, tests)| JobFailures {
                job_name,
                tests: tests
                    .into_iter()
                    .map(|(test_name, record)| TestFailure {
                        last_job_url: record
                            .last_job
                            .map(|number| job_tests_url(app_url, self.project(), number)),
                        test_name,
                        record,
                    })
                    .collect(),
            })
            .collect();

        FailureReport {
            kind,
            project: self.project().to_string(),
            collected_at: Utc::now(),
            lookback_days: window.days,
            branches_scanned,
            jobs,
            failed_fetches,
        }
    }
}

/// Aggregates one branch's flaky tests, each weighted by how often it flaked.
fn flaky_aggregate(tests: Vec<FlakyTest>) -> FailureAggregator {
    let mut aggregator = FailureAggregator::new();
    for test in tests {
        let times_flaked = test.times_flaked;
        aggregator.observe_weighted(
            Observation {
                job_name: test.job_name,
                test_id: test.test_name,
                started_at: test.workflow_created_at,
                job_number: test.job_number,
            },
            times_flaked,
        );
    }
    aggregator
}
