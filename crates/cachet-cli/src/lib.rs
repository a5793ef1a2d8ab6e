//! Cachet CLI - cache-friendly builds for browser applications.
//!
//! This crate wraps `cachet-bundler` in the `cachet` binary:
//!
//! - [`cli`] - Argument definitions (`build`, `watch`, `check`)
//! - [`config`] - Layered configuration loading with CLI overrides
//! - [`commands`] - Command implementations
//! - [`watcher`] - Debounced file watching feeding watch mode
//! - [`error`] - CLI error types and miette conversion
//! - [`logger`] - `tracing` subscriber setup
//! - [`ui`] - Status lines, spinner and build summaries
//!
//! # Example
//!
//! ```rust,no_run
//! use cachet_cli::{cli::Cli, commands};
//! use clap::Parser;
//!
//! # async fn run() -> cachet_cli::Result<()> {
//! let args = Cli::parse_from(["cachet", "build", "--mode", "production"]);
//! commands::run(args).await
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod ui;
pub mod watcher;

pub use error::{CliError, Result};
