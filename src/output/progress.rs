use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{heading, muted, phase_active, phase_done};

/// Progress tracking for multi-phase operations
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: usize,
    total: usize,
    message: String,
}

impl PhaseProgress {
    pub fn start(total: usize, message: &str) -> Self {
        eprintln!("⚙️  {}", heading("Phases"));
        Self::phase(1, total, message)
    }

    pub fn next_phase(self, done: &str, message: &str) -> Self {
        self.finish_current(done);
        Self::phase(self.phase + 1, self.total, message)
    }

    /// Shows what the current phase is working on.
    pub fn update(&self, detail: &str) {
        self.pb.set_message(format!(
            "{} {}",
            phase_active(self.label(&self.message)),
            muted(detail)
        ));
    }

    pub fn finish(self, done: &str) {
        self.finish_current(done);
        eprintln!("\n");
    }

    fn phase(phase: usize, total: usize, message: &str) -> Self {
        let progress = Self {
            pb: create_spinner(),
            phase,
            total,
            message: message.to_string(),
        };
        progress
            .pb
            .set_message(phase_active(progress.label(message)).to_string());
        progress
    }

    fn label(&self, message: &str) -> String {
        format!("Phase {}/{}: {message}", self.phase, self.total)
    }

    fn finish_current(&self, done: &str) {
        self.pb
            .finish_with_message(phase_done(format!("{} ✓", self.label(done))).to_string());
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
