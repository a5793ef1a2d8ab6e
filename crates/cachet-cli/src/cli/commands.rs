use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::enums::ModeArg;
use crate::cli::validation::parse_entry;

/// Available Cachet subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one build pass
    ///
    /// Resolves every entry point, transforms and groups the module graph,
    /// then writes the chunks, media, HTML shell and asset manifest.
    Build(BuildArgs),

    /// Build, then rebuild whenever project files change
    ///
    /// Changes that arrive during a pass are merged into a single follow-up
    /// pass. The static checker runs alongside and never blocks a build.
    Watch(WatchArgs),

    /// Validate configuration and run the static checker
    ///
    /// Plans a full build without writing anything, so resolution and
    /// grouping errors are reported too.
    Check(CheckArgs),
}

/// Configuration overrides shared by every command.
///
/// Flags win over environment variables and the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct BuildOverrides {
    /// Build mode
    #[arg(short, long, value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,

    /// Entry point as NAME=SPECIFIER, repeatable
    ///
    /// Examples:
    ///   cachet build --entry app=src/index
    ///   cachet build -e app=src/index -e admin=src/admin
    #[arg(short, long = "entry", value_name = "NAME=SPECIFIER", value_parser = parse_entry)]
    pub entries: Vec<(String, String)>,

    /// Output directory, relative to the project root
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// URL prefix for emitted assets
    #[arg(long, value_name = "PREFIX")]
    pub public_path: Option<String>,

    /// Assets smaller than this many bytes are inlined as data URIs
    #[arg(long, value_name = "BYTES")]
    pub inline_threshold: Option<u64>,

    /// Do not emit the HTML shell
    #[arg(long)]
    pub no_html: bool,

    /// Keep files from the previous manifest that this build no longer produces
    #[arg(long)]
    pub keep_stale: bool,
}

/// Arguments for the build command
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub overrides: BuildOverrides,

    /// Print the asset manifest as JSON on stdout after a successful build
    #[arg(long)]
    pub print_manifest: bool,
}

/// Arguments for the watch command
#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub overrides: BuildOverrides,

    /// Do not run the static checker after each pass
    #[arg(long)]
    pub no_check: bool,

    /// Batch file events for this many milliseconds before rebuilding
    #[arg(long, value_name = "MS")]
    pub debounce: Option<u64>,
}

/// Arguments for the check command
#[derive(Args, Debug, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: BuildOverrides,

    /// Only validate configuration and plan the build
    #[arg(long)]
    pub no_static: bool,
}
