//! Command-line interface definition.
//!
//! # Command Structure
//!
//! - `cachet build` - One build pass, written to the output directory
//! - `cachet watch` - Initial build, then coalesced rebuilds on change
//! - `cachet check` - Validate configuration and run the static checker

mod commands;
pub mod enums;
mod tests;
mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use commands::{BuildArgs, BuildOverrides, CheckArgs, Command, WatchArgs};
pub use enums::ModeArg;
pub use validation::parse_entry;

/// Cachet - cache-friendly asset builds for browser applications
#[derive(Parser, Debug)]
#[command(
    name = "cachet",
    version,
    about = "Cache-friendly asset builds for browser applications",
    long_about = "Cachet resolves, transforms and groups a web application's modules into\n\
                  content-addressed chunks, then writes them with a manifest and an HTML\n\
                  shell. File names only change when their bytes change."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Config file to use instead of searching the project root
    ///
    /// Relative paths are resolved against the project root.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to merge over the base sections
    ///
    /// Defaults to the profile named after the build mode, when defined.
    #[arg(short, long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
