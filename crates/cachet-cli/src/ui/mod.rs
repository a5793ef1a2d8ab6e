//! Terminal output: status lines, a spinner and build summaries.
//!
//! Everything goes to stderr. Colors follow `--no-color`, `NO_COLOR` and
//! `FORCE_COLOR`, then terminal detection.
//!
//! # Examples
//!
//! ```no_run
//! use cachet_cli::ui;
//!
//! ui::init(false, false);
//! let spinner = ui::Spinner::new("Building...");
//! spinner.finish("Built 3 chunks");
//! ui::success("Build successful");
//! ```

mod format;
mod messages;
mod spinner;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_build_summary, print_diagnostics};
pub use messages::{error, info, success, warning};
pub use spinner::Spinner;

static COLOR: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicBool = AtomicBool::new(false);

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|name| std::env::var_os(name).is_some())
}

/// Whether the environment allows colors. `NO_COLOR` wins over
/// `FORCE_COLOR`.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Set up output once, early in `main`.
pub fn init(no_color: bool, quiet: bool) {
    COLOR.store(!no_color && should_use_color(), Ordering::Relaxed);
    QUIET.store(quiet, Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLOR.load(Ordering::Relaxed)
}

pub(crate) fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}
