use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::progress;

/// Status line shown on stderr while a system is being fetched.
///
/// Must be finished before anything is written to stdout so the animation
/// never interleaves with the rendered hierarchy.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl std::fmt::Display) -> Self {
        Self {
            pb: create_spinner(progress(message).to_string()),
        }
    }

    /// A spinner that draws nothing, for non-interactive runs.
    pub fn hidden() -> Self {
        let pb = ProgressBar::hidden();
        Self { pb }
    }

    pub fn set_message(&self, message: impl std::fmt::Display) {
        self.pb.set_message(progress(message).to_string());
    }

    /// Stops the tick thread and erases the status line.
    pub fn finish_and_clear(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
