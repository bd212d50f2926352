use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A GitHub-hosted project as CircleCI addresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSlug {
    pub org: String,
    pub repo: String,
}

impl ProjectSlug {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    /// Path segment used by the v2 API, e.g. `gh/org/repo`.
    pub fn v2_context(&self) -> String {
        format!("gh/{}/{}", self.org, self.repo)
    }

    /// Path segment used by the v1.1 API, e.g. `github/org/repo`.
    pub fn v1_context(&self) -> String {
        format!("github/{}/{}", self.org, self.repo)
    }
}

impl std::fmt::Display for ProjectSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// A CircleCI job number, the reference used for artifact lookups and job links.
pub type JobNumber = u64;

/// One page of a cursor-paginated v2 collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page, `null` on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A CircleCI pipeline, used only to find which branches were built recently.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub vcs: Option<PipelineVcs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineVcs {
    /// Missing for tag builds
    #[serde(default)]
    pub branch: Option<String>,
}

impl Pipeline {
    pub fn branch(&self) -> Option<&str> {
        self.vcs.as_ref().and_then(|vcs| vcs.branch.as_deref())
    }
}

/// A workflow run as returned by the workflow insights endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A job within a workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub name: String,
    /// Absent for approval jobs and jobs that never ran
    #[serde(default)]
    pub job_number: Option<JobNumber>,
    pub status: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// A failed job kept for log scraping, tagged with the branch it was built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub branch: String,
    pub name: String,
    pub job_number: JobNumber,
    pub started_at: Option<DateTime<Utc>>,
}

/// One structured line of a step's output log.
#[derive(Debug, Clone, Deserialize)]
pub struct LogLine {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlakyTestsResponse {
    pub flaky_tests: Vec<FlakyTest>,
    #[serde(default)]
    pub total_flaky_tests: Option<usize>,
}

/// A test flagged as flaky by CircleCI's own insights.
#[derive(Debug, Clone, Deserialize)]
pub struct FlakyTest {
    pub job_name: String,
    pub test_name: String,
    pub times_flaked: usize,
    #[serde(default)]
    pub workflow_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_number: Option<JobNumber>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_slug_contexts() {
        let slug = ProjectSlug::new("gatsbyjs", "gatsby");
        assert_eq!(slug.v2_context(), "gh/gatsbyjs/gatsby");
        assert_eq!(slug.v1_context(), "github/gatsbyjs/gatsby");
        assert_eq!(slug.to_string(), "gatsbyjs/gatsby");
    }

    #[test]
    fn pipeline_without_branch_deserializes() {
        let pipeline: Pipeline = serde_json::from_str(
            r#"{"updated_at": "2024-05-01T10:00:00Z", "vcs": {"tag": "v1.0.0"}}"#,
        )
        .unwrap();
        assert_eq!(pipeline.branch(), None);
    }

    #[test]
    fn page_with_null_cursor_deserializes() {
        let page: Page<Workflow> = serde_json::from_str(
            r#"{"items": [{"id": "abc", "created_at": "2024-05-01T10:00:00Z"}], "next_page_token": null}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn approval_job_has_no_number() {
        let job: Job = serde_json::from_str(
            r#"{"name": "hold", "status": "on_hold", "job_number": null}"#,
        )
        .unwrap();
        assert!(job.job_number.is_none());
        assert!(!job.is_failed());
    }
}
