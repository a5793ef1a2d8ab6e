//! Spinner for build passes.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use super::{colors_enabled, is_ci, is_quiet};

/// Spinner shown while a pass runs. Hidden in CI, with `--quiet` and when
/// stderr is not a terminal.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if is_quiet() || is_ci() || !console::user_attended_stderr() {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["◐", "◓", "◑", "◒"]);
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        };
        pb.set_message(message.to_string());
        Self { pb }
    }

    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    /// Finish with a green checkmark.
    pub fn finish(&self, message: &str) {
        if self.pb.is_hidden() {
            super::success(message);
        } else if colors_enabled() {
            self.pb.finish_with_message(format!("{} {}", "✓".green(), message));
        } else {
            self.pb.finish_with_message(format!("✓ {message}"));
        }
    }

    /// Stop the spinner and clear its line; the caller reports the error.
    pub fn fail(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_lifecycle() {
        let spinner = Spinner::new("Building...");
        spinner.set_message("Emitting...");
        spinner.finish("Done");

        let spinner = Spinner::new("Building...");
        spinner.fail();
    }
}
