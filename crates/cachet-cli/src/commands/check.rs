//! `cachet check`: validate and plan without writing, then run the
//! static checker once.

use std::sync::Arc;

use cachet_bundler::{BuildPipeline, CheckOutcome, DelimiterCheck, IncrementalChecker};
use cachet_config::validate_fs;

use crate::cli::CheckArgs;
use crate::config::LoadedConfig;
use crate::error::{CliError, Result};
use crate::ui;

/// Execute the check command.
///
/// # Validation Steps
///
/// 1. Schema and filesystem validation of the configuration
/// 2. A planned build (resolution, transforms, grouping, naming) with no
///    output written
/// 3. The static checker over every loaded source, unless disabled
///
/// A checker that fails to run only produces a warning.
pub async fn execute(args: CheckArgs, loaded: LoadedConfig) -> Result<()> {
    let LoadedConfig { root, config, .. } = loaded;
    let build = config.build;

    ui::info("Checking configuration...");
    validate_fs(&build, &root)?;
    ui::success("Configuration is valid");

    let static_check = build.check.enabled && !args.no_static;
    let exclude = build.check.exclude.clone();
    let mut pipeline = BuildPipeline::new(root.clone(), build)?;
    let planned = pipeline.plan_outputs().await?;
    ui::success(&format!(
        "Planned {} chunks and {} files from {} modules",
        planned.chunks.chunks.len(),
        planned.emit.assets.len(),
        planned.graph.len()
    ));

    if !static_check {
        return Ok(());
    }
    let Some(sources) = pipeline.last_sources() else {
        return Ok(());
    };

    ui::info(&format!("Checking {} source files...", sources.len()));
    let (checker, mut reports) = IncrementalChecker::new(Arc::new(DelimiterCheck), &exclude)?;
    let ticket = checker.start(sources.clone());
    tracing::debug!(generation = ticket.generation, "static check started");

    match reports.recv().await.map(|report| report.outcome) {
        Some(CheckOutcome::Completed(diagnostics)) => {
            let errors = ui::print_diagnostics(&diagnostics, &root);
            if errors > 0 {
                return Err(CliError::CheckFailed { errors });
            }
            ui::success("No problems found");
        }
        Some(CheckOutcome::Unavailable { reason }) => {
            ui::warning(&format!("Static check unavailable: {reason}"));
        }
        None => ui::warning("Static check produced no report"),
    }
    Ok(())
}
