use std::fmt::Write;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::styling::{alert, heading, muted};
use crate::report::FailureReport;

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Red from 5 failures, yellow from 2.
fn color_coded_count_cell(count: usize) -> Cell {
    let cell = Cell::new(count);
    if count >= 5 {
        cell.fg(TableColor::Red)
    } else if count >= 2 {
        cell.fg(TableColor::Yellow)
    } else {
        cell.fg(TableColor::Green)
    }
}

/// Renders a report as terminal tables, most frequent failures first.
pub fn render_tables(report: &FailureReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} {}\n",
        heading(&report.project),
        muted(format!(
            "(last {} days, {} branches)",
            report.lookback_days, report.branches_scanned
        ))
    );

    if report.jobs.is_empty() {
        let _ = writeln!(output, "{}\n", muted("No failing tests found"));
    }

    for job in &report.jobs {
        let mut tests: Vec<_> = job.tests.iter().collect();
        tests.sort_by(|a, b| b.record.count.cmp(&a.record.count));

        let mut table = create_table();
        table.set_header(cyan_header(&[
            "Test Name",
            report.kind.count_label(),
            "Last Job",
        ]));
        for test in tests {
            let last_job = match (&test.last_job_url, test.record.last_job) {
                (Some(url), _) => url.clone(),
                (None, Some(number)) => number.to_string(),
                (None, None) => "-".to_string(),
            };
            table.add_row(vec![
                Cell::new(&test.test_name),
                color_coded_count_cell(test.record.count),
                Cell::new(last_job),
            ]);
        }

        let _ = writeln!(output, "{}\n{table}\n", heading(&job.job_name));
    }

    if !report.failed_fetches.is_empty() {
        let mut table = create_table();
        table.set_header(cyan_header(&["Job", "Failed Log Downloads"]));
        for (job_name, count) in &report.failed_fetches {
            table.add_row(vec![Cell::new(job_name), Cell::new(count).fg(TableColor::Red)]);
        }
        let _ = writeln!(output, "{}\n{table}", alert("Log download failures"));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FailureRecord, JobFailures, ReportKind, TestFailure};
    use chrono::Utc;
    use indexmap::IndexMap;

    fn test_failure(name: &str, count: usize) -> TestFailure {
        TestFailure {
            test_name: name.to_string(),
            record: FailureRecord {
                count,
                last_seen: None,
                last_job: Some(9),
            },
            last_job_url: Some(format!("https://example.test/jobs/9/{name}")),
        }
    }

    #[test]
    fn sorts_tests_by_count() {
        let report = FailureReport {
            kind: ReportKind::Failures,
            project: "o/r".to_string(),
            collected_at: Utc::now(),
            lookback_days: 1,
            branches_scanned: 1,
            jobs: vec![JobFailures {
                job_name: "unit_tests".to_string(),
                tests: vec![test_failure("rare.js", 1), test_failure("common.js", 7)],
            }],
            failed_fetches: IndexMap::from([("e2e_tests".to_string(), 3)]),
        };

        let output = render_tables(&report);

        let common = output.find("common.js").unwrap();
        let rare = output.find("rare.js").unwrap();
        assert!(common < rare);
        assert!(output.contains("Fail Count"));
        assert!(output.contains("e2e_tests"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = FailureReport {
            kind: ReportKind::Flaky,
            project: "o/r".to_string(),
            collected_at: Utc::now(),
            lookback_days: 30,
            branches_scanned: 0,
            jobs: vec![],
            failed_fetches: IndexMap::new(),
        };

        assert!(render_tables(&report).contains("No failing tests found"));
    }
}
