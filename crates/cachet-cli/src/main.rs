//! `cachet` binary entry point.

use cachet_cli::{cli, commands, error};
use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    commands::run(args).await.map_err(error::cli_error_to_miette)
}
