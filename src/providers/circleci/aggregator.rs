use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::types::JobNumber;
use crate::report::FailureRecord;

/// A single failing (or flaky) test seen in one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub job_name: String,
    pub test_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub job_number: Option<JobNumber>,
}

/// Per-job-name, per-test failure counters plus the log fetch failure tally.
///
/// Job names and test ids keep the order they were first seen in.
#[derive(Debug, Default, Clone)]
pub struct FailureAggregator {
    groups: IndexMap<String, IndexMap<String, FailureRecord>>,
    failed_fetches: IndexMap<String, usize>,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, observation: Observation) {
        self.observe_weighted(observation, 1);
    }

    /// Adds `weight` occurrences at once, as reported by the flaky test insights.
    pub fn observe_weighted(&mut self, observation: Observation, weight: usize) {
        let Observation {
            job_name,
            test_id,
            started_at,
            job_number,
        } = observation;

        let record = self
            .groups
            .entry(job_name)
            .or_default()
            .entry(test_id)
            .or_default();

        record.count += weight;
        // Option ordering puts None below every timestamp; ties keep the first job.
        if started_at > record.last_seen {
            record.last_seen = started_at;
            record.last_job = job_number;
        }
    }

    pub fn record_fetch_failure(&mut self, job_name: &str) {
        *self.failed_fetches.entry(job_name.to_string()).or_insert(0) += 1;
    }

    /// Folds a partial aggregate into this one. On equal timestamps the
    /// receiver's last job wins.
    pub fn merge(&mut self, other: FailureAggregator) {
        for (job_name, tests) in other.groups {
            let group = self.groups.entry(job_name).or_default();
            for (test_id, incoming) in tests {
                let record = group.entry(test_id).or_default();
                record.count += incoming.count;
                if incoming.last_seen > record.last_seen {
                    record.last_seen = incoming.last_seen;
                    record.last_job = incoming.last_job;
                }
            }
        }

        for (job_name, count) in other.failed_fetches {
            *self.failed_fetches.entry(job_name).or_insert(0) += count;
        }
    }

    pub fn failed_fetches(&self) -> &IndexMap<String, usize> {
        &self.failed_fetches
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_parts(
        self,
    ) -> (
        IndexMap<String, IndexMap<String, FailureRecord>>,
        IndexMap<String, usize>,
    ) {
        (self.groups, self.failed_fetches)
    }
}

#[cfg(test)]
impl FailureAggregator {
    pub fn get(&self, job_name: &str, test_id: &str) -> Option<&FailureRecord> {
        self.groups.get(job_name)?.get(test_id)
    }
}
