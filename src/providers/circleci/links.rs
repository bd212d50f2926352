use super::types::{JobNumber, ProjectSlug};

/// Builds the link to a job's test results in the CircleCI web app.
///
/// # Arguments
///
/// * `app_url` - Web app base URL (e.g., <https://app.circleci.com>)
/// * `project` - Project the job belongs to
/// * `job_number` - Job number within the project
///
/// # Returns
///
/// URL such as <https://app.circleci.com/pipelines/github/org/repo/jobs/123/tests>
pub fn job_tests_url(app_url: &str, project: &ProjectSlug, job_number: JobNumber) -> String {
    format!(
        "{}/pipelines/github/{}/{}/jobs/{job_number}/tests",
        app_url.trim_end_matches('/'),
        project.org,
        project.repo
    )
}

/// Builds the link to a job's overview page.
pub fn job_url(app_url: &str, project: &ProjectSlug, job_number: JobNumber) -> String {
    format!(
        "{}/pipelines/github/{}/{}/jobs/{job_number}",
        app_url.trim_end_matches('/'),
        project.org,
        project.repo
    )
}
