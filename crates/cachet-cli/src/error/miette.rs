//! Miette report conversion for CLI errors.

use cachet_bundler::BuildFailure;
use miette::Report;

use crate::error::CliError;

/// Convert a CliError to a miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(failure) => Report::new(failure),
        CliError::Bundler(err) => Report::new(err),
        CliError::Config(err) => {
            miette::miette!(
                code = "cachet::config",
                help = "see `cachet check` for a full validation run",
                "{}",
                err
            )
        }
        CliError::CheckFailed { errors } => {
            miette::miette!(
                code = "cachet::check::failed",
                "static check found {} error(s)",
                errors
            )
        }
        other => miette::miette!("{}", other),
    }
}

/// Print a failed pass without ending the process (watch mode).
pub fn print_failure(failure: BuildFailure) {
    eprintln!("{:?}", Report::new(failure));
}
