use std::fmt::Write;

use crate::report::{DryRunReport, FailureReport, ReportKind, TestFailure};

/// Renders a report as markdown, one table per job name.
///
/// Failure reports end with a pretty-printed JSON object of log download
/// failures per job name.
pub fn render_markdown(report: &FailureReport) -> serde_json::Result<String> {
    let mut output = String::new();

    for job in &report.jobs {
        let _ = writeln!(output, "# {}\n", job.job_name);
        let _ = writeln!(output, "*(last {} days)*\n", report.lookback_days);
        let _ = writeln!(output, "Test Name | {} | Last Job", report.kind.count_label());
        let _ = writeln!(output, "--- | --- | ---");

        let rows: Vec<String> = job.tests.iter().map(render_row).collect();
        let _ = writeln!(output, "{}", rows.join("\n"));
        let _ = writeln!(output, "\n");
    }

    if report.kind == ReportKind::Failures {
        let _ = writeln!(output, "{}", serde_json::to_string_pretty(&report.failed_fetches)?);
    }

    Ok(output)
}

fn render_row(test: &TestFailure) -> String {
    let last_job = match (test.record.last_job, &test.last_job_url) {
        (Some(number), Some(url)) => format!("[{number}]({url})"),
        (Some(number), None) => number.to_string(),
        (None, _) => "-".to_string(),
    };
    format!("{} | {} | {last_job}", test.test_name, test.record.count)
}

/// Renders the branches and failed jobs found by a dry run.
pub fn render_dry_run(report: &DryRunReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# Branches built in the last {} days ({})\n",
        report.lookback_days,
        report.branches.len()
    );
    for branch in &report.branches {
        let _ = writeln!(output, "- {branch}");
    }

    let _ = writeln!(output, "\n# Failed jobs ({})\n", report.failed_jobs.len());
    for job in &report.failed_jobs {
        let started = job
            .started_at
            .map_or_else(|| "not started".to_string(), |at| at.to_rfc3339());
        let _ = writeln!(
            output,
            "- {} / {}: [{}]({}) ({started})",
            job.branch, job.job_name, job.job_number, job.url
        );
    }

    output
}
