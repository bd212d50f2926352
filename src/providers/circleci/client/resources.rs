use super::core::{CircleCiClient, RequestOptions};
use crate::error::Result;
use crate::providers::circleci::types::{
    FlakyTestsResponse, Job, JobNumber, Page, Pipeline, Workflow,
};

fn page_query(page_token: Option<String>) -> Vec<(&'static str, String)> {
    page_token
        .map(|token| vec![("page-token", token)])
        .unwrap_or_default()
}

impl CircleCiClient {
    /// One page of the project's pipelines, newest first.
    pub async fn pipelines_page(&self, page_token: Option<String>) -> Result<Page<Pipeline>> {
        self.get_json(
            "project",
            "pipeline",
            &page_query(page_token),
            RequestOptions::default(),
        )
        .await
    }

    /// One page of runs of `workflow` on `branch`, newest first.
    pub async fn workflow_runs_page(
        &self,
        workflow: &str,
        branch: &str,
        page_token: Option<String>,
    ) -> Result<Page<Workflow>> {
        let mut query = vec![("branch", branch.to_string())];
        query.extend(page_query(page_token));

        self.get_json(
            "insights",
            &format!("workflows/{workflow}"),
            &query,
            RequestOptions::default(),
        )
        .await
    }

    /// Every job of a workflow. The endpoint is small enough that one page is read.
    pub async fn workflow_jobs(&self, workflow_id: &str) -> Result<Vec<Job>> {
        let page: Page<Job> = self
            .get_json(
                "workflow",
                &format!("{workflow_id}/job"),
                &[],
                RequestOptions::without_context(),
            )
            .await?;

        Ok(page.items)
    }

    /// Raw v1.1 job details, which list the output URL of every step.
    ///
    /// Read as text: the legacy API's default rendering is not JSON.
    pub async fn artifact_index(&self, job_number: JobNumber) -> Result<String> {
        self.get_text(
            "project",
            &job_number.to_string(),
            &[],
            RequestOptions::legacy(),
        )
        .await
    }

    pub async fn flaky_tests(&self, branch: &str) -> Result<FlakyTestsResponse> {
        self.get_json(
            "insights",
            "flaky-tests",
            &[("branch", branch.to_string())],
            RequestOptions::default(),
        )
        .await
    }
}
