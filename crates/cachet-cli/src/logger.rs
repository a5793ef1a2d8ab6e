//! Logging setup for the `cachet` binary.
//!
//! Bundler crates only emit `tracing` events; this module installs the
//! subscriber. Log lines go to stderr so stdout stays free for
//! `--print-manifest`.
//!
//! # Verbosity Levels
//!
//! The filter is picked in this order:
//! 1. `--verbose`: debug for the cachet crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. `settings.log_level` from the config file
//! 5. info for the cachet crates

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["cachet_cli", "cachet_bundler", "cachet_config"];

/// Flags and settings that decide the log filter.
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
    /// Level from the config file, used when `RUST_LOG` is unset
    pub fallback: Option<&'a str>,
}

/// Build the filter for `options`. Split out so it can be tested without
/// touching the global subscriber.
pub fn build_filter(options: &LogOptions<'_>) -> EnvFilter {
    if options.verbose {
        return EnvFilter::new(crate_directives("debug"));
    }
    if options.quiet {
        return EnvFilter::new("error");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = options.fallback.unwrap_or("info");
        EnvFilter::try_new(crate_directives(level))
            .unwrap_or_else(|_| EnvFilter::new(crate_directives("info")))
    })
}

fn crate_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|name| format!("{name}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logger(options: &LogOptions<'_>) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!options.no_color)
        .with_writer(std::io::stderr)
        .without_time()
        .compact();

    let _ = tracing_subscriber::registry()
        .with(build_filter(options))
        .with(fmt_layer)
        .try_init();
}
