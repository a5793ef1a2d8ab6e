//! Error handling for the `cachet` binary.
//!
//! Library errors convert into [`CliError`] through `#[from]`; `main` turns
//! the final error into a miette report (see [`cli_error_to_miette`]).

mod miette;

use std::path::PathBuf;

use cachet_bundler::BuildFailure;
use thiserror::Error;

pub use self::miette::{cli_error_to_miette, print_failure};

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading, merging or validating configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] cachet_config::ConfigError),

    /// A build pass failed; carries every collected error
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// Setting up the pipeline or checker failed
    #[error(transparent)]
    Bundler(#[from] cachet_bundler::Error),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The watch session task ended abnormally
    #[error("Watch session failed: {0}")]
    Session(String),

    /// The static checker reported errors
    #[error("Static check found {errors} error(s)")]
    CheckFailed { errors: usize },

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
