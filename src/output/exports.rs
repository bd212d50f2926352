use anyhow::Result;
use std::io::Write;

use super::markdown::{render_dry_run, render_markdown};
use super::tables::render_tables;
use crate::config::OutputFormat;
use crate::report::{DryRunReport, FailureReport};

/// Writes a report in the requested format.
///
/// - Markdown: tables ready to paste into an issue, plus the log download tally
/// - JSON: the full report for programmatic use
/// - Table: colored terminal tables
pub fn export_report(
    report: &FailureReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Markdown => write!(output, "{}", render_markdown(report)?)?,
        OutputFormat::Json => export_json(report, pretty, output)?,
        OutputFormat::Table => write!(output, "{}", render_tables(report))?,
    }
    Ok(())
}

/// Writes a dry run listing. Tables have nothing to add here, so they fall back to markdown.
pub fn export_dry_run(
    report: &DryRunReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Markdown | OutputFormat::Table => {
            write!(output, "{}", render_dry_run(report))?;
            Ok(())
        }
    }
}

fn export_json(report: &impl serde::Serialize, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}
