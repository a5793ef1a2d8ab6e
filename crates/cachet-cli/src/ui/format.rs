//! Formatting for sizes, durations, build summaries and checker output.

use std::path::Path;
use std::time::Duration;

use cachet_bundler::{BuildReport, Diagnostic, Severity};
use console::Term;
use owo_colors::OwoColorize;

use super::{colors_enabled, is_quiet};

/// Format a byte count with the largest fitting unit.
///
/// # Examples
///
/// ```
/// use cachet_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Format a duration as `ms`, seconds, or `Xm Ys`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cachet_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print the emitted files, their sizes and the manifest location.
pub fn print_build_summary(report: &BuildReport) {
    if is_quiet() {
        return;
    }
    let width = (Term::stderr().size().1 as usize).clamp(20, 80);
    let color = colors_enabled();

    if color {
        eprintln!("\n{}", "Build Summary".bold().underline());
    } else {
        eprintln!("\nBuild Summary");
    }
    eprintln!("{}", "─".repeat(width));

    let name_width = report
        .assets
        .iter()
        .map(|asset| asset.path.len())
        .max()
        .unwrap_or(0);
    for asset in &report.assets {
        let size = format_size(asset.size());
        if color {
            eprintln!(
                "  {} {:<name_width$} {}",
                "▸".blue(),
                asset.path.bright_white().bold(),
                size.dimmed()
            );
        } else {
            eprintln!("  ▸ {:<name_width$} {size}", asset.path);
        }
    }

    eprintln!("{}", "─".repeat(width));
    let total = format!(
        "{} in {} files, {} modules ({} cached), {} chunks",
        format_size(report.total_size()),
        report.assets.len(),
        report.modules,
        report.cache_hits,
        report.chunks.len()
    );
    if color {
        eprintln!("  {} {}", "Total:".bold(), total.green());
    } else {
        eprintln!("  Total: {total}");
    }
    eprintln!("  Manifest: {}", report.manifest_path.display());
    if report.inlined_runtime {
        eprintln!("  Runtime inlined into the HTML shell");
    }
    for path in &report.pruned {
        eprintln!("  Removed stale {}", path.display());
    }
}

/// Print checker diagnostics, paths relative to `root`. Returns the number
/// of error-severity entries.
pub fn print_diagnostics(diagnostics: &[Diagnostic], root: &Path) -> usize {
    let mut errors = 0;
    for diagnostic in diagnostics {
        let mut shown = diagnostic.clone();
        if let Ok(relative) = diagnostic.file.strip_prefix(root) {
            shown.file = relative.to_path_buf();
        }
        let line = shown.to_string();
        match (diagnostic.severity, colors_enabled()) {
            (Severity::Error, true) => eprintln!("{}", line.red()),
            (Severity::Warning, true) => eprintln!("{}", line.yellow()),
            _ => eprintln!("{line}"),
        }
        if diagnostic.severity == Severity::Error {
            errors += 1;
        }
    }
    errors
}
