//! Command implementations.
//!
//! - [`build`] - One pass, written to disk
//! - [`watch`] - Coalesced rebuilds driven by file changes
//! - [`check`] - Configuration validation and static checking
//!
//! [`run`] loads configuration, sets up logging and dispatches.

pub mod build;
pub mod check;
pub mod watch;

use crate::cli::{Cli, Command};
use crate::config::{ConfigSource, load_config};
use crate::error::Result;
use crate::logger::{self, LogOptions};
use crate::ui;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
pub use watch::execute as watch_execute;

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    ui::init(cli.no_color, cli.quiet);

    let overrides = match &cli.command {
        Command::Build(args) => &args.overrides,
        Command::Watch(args) => &args.overrides,
        Command::Check(args) => &args.overrides,
    };
    let loaded = load_config(&ConfigSource::from_cli(&cli), overrides)?;

    let settings = &loaded.config.settings;
    let no_color = cli.no_color || settings.no_color;
    logger::init_logger(&LogOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        no_color,
        fallback: settings.log_level.as_deref(),
    });
    ui::init(no_color, cli.quiet);

    match cli.command {
        Command::Build(args) => build::execute(args, loaded).await,
        Command::Watch(args) => watch::execute(args, loaded).await,
        Command::Check(args) => check::execute(args, loaded).await,
    }
}
