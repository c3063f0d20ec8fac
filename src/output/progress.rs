use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{failure, figure, heading, success};

/// Spinner for an operation made of a fixed number of sequential phases.
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: usize,
    phases: usize,
}

impl PhaseProgress {
    pub fn start(phases: usize, message: &str) -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases").underlined());
        let pb = create_spinner(figure(phase_label(1, phases, message)).to_string());
        Self {
            pb,
            phase: 1,
            phases,
        }
    }

    /// Marks the current phase done and starts the next one.
    pub fn advance(self, done: &str, next: &str) -> Self {
        let done = phase_label(self.phase, self.phases, &format!("{done} ✓"));
        self.pb.finish_with_message(success(done).to_string());

        let phase = self.phase + 1;
        let pb = create_spinner(figure(phase_label(phase, self.phases, next)).to_string());
        Self {
            pb,
            phase,
            phases: self.phases,
        }
    }

    pub fn finish(self, done: &str) {
        let done = phase_label(self.phase, self.phases, &format!("{done} ✓"));
        self.pb.finish_with_message(success(done).to_string());
        eprintln!();
    }

    pub fn fail(self, reason: &str) {
        let reason = phase_label(self.phase, self.phases, &format!("{reason} ✗"));
        self.pb.abandon_with_message(failure(reason).to_string());
        eprintln!();
    }
}

fn phase_label(phase: usize, phases: usize, message: &str) -> String {
    format!("Phase {phase}/{phases}: {message}")
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
