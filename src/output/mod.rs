mod exports;
mod markdown;
mod progress;
mod styling;
mod tables;

pub use exports::{export_dry_run, export_report};
pub use progress::PhaseProgress;
use styling::{muted, title};

/// Prints the `ciflakes` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("🧪 ciflakes"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Failing & flaky test finder for CircleCI")
    );
}
