//! `cachet watch`: initial build, then coalesced rebuilds.
//!
//! The bundler's `WatchSession` owns the pipeline; this command feeds it
//! batched file changes and prints what it reports. Ctrl+C stops the
//! watcher, lets the running pass finish, then exits.

use std::path::Path;
use std::sync::Arc;

use cachet_bundler::{
    BuildFailure, BuildPipeline, BuildReport, CheckOutcome, CheckReport, DelimiterCheck,
    IncrementalChecker, PipelineRunner, WatchEvent, WatchSession,
};
use cachet_config::validate_fs;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::WatchArgs;
use crate::commands::build::building_message;
use crate::config::LoadedConfig;
use crate::error::{CliError, Result, print_failure};
use crate::ui;
use crate::watcher::{FileWatcher, IgnoreRules};

type PassOutput = std::result::Result<BuildReport, BuildFailure>;

/// Execute the watch command.
///
/// Build failures are printed and watching continues; only setup errors
/// end the command.
pub async fn execute(args: WatchArgs, loaded: LoadedConfig) -> Result<()> {
    let LoadedConfig { root, config, .. } = loaded;
    let build = config.build;
    validate_fs(&build, &root)?;

    let (checker, mut reports) = if build.check.enabled && !args.no_check {
        let (checker, reports) = IncrementalChecker::new(Arc::new(DelimiterCheck), &build.check.exclude)?;
        (Some(checker), Some(reports))
    } else {
        (None, None)
    };

    let rules = IgnoreRules::new(&root, config.watch.ignore.clone(), &build.output_dir);
    let debounce = args.debounce.unwrap_or(config.watch.debounce_ms);
    let message = building_message(&build);
    let pipeline = BuildPipeline::new(root.clone(), build)?;

    let (watcher, changes) = FileWatcher::new(rules, debounce)?;
    let (session, mut events) = WatchSession::new(PipelineRunner::new(pipeline, checker), changes);
    let session = tokio::spawn(session.run());
    ui::info(&format!(
        "Watching {} for changes (Ctrl+C to stop)",
        watcher.root().display()
    ));

    let mut watcher = Some(watcher);
    let mut spinner: Option<ui::Spinner> = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => on_event(event, &mut spinner, &message),
                None => break,
            },
            report = next_report(&mut reports) => match report {
                Some(report) => on_report(report, &root),
                None => reports = None,
            },
            _ = tokio::signal::ctrl_c(), if watcher.is_some() => {
                ui::info("Stopping after the current pass...");
                watcher = None;
            }
        }
    }

    session
        .await
        .map_err(|err| CliError::Session(err.to_string()))??;
    ui::success("Watch stopped");
    Ok(())
}

fn on_event(event: WatchEvent<PassOutput>, spinner: &mut Option<ui::Spinner>, message: &str) {
    match event {
        WatchEvent::PassStarted(request) => {
            let text = if request.changed.is_empty() {
                message.to_string()
            } else {
                format!("Rebuilding ({} changed)...", request.changed.len())
            };
            *spinner = Some(ui::Spinner::new(&text));
        }
        WatchEvent::Queued { pending } => {
            tracing::info!(pending, "changes queued until the current pass finishes");
        }
        WatchEvent::PassFinished { request, output } => {
            let current = spinner.take();
            match output {
                Ok(report) => {
                    let text = format!(
                        "Pass {} wrote {} files in {}",
                        request.pass,
                        report.assets.len(),
                        ui::format_duration(report.duration)
                    );
                    match current {
                        Some(spinner) => spinner.finish(&text),
                        None => ui::success(&text),
                    }
                    if request.pass == 1 {
                        ui::print_build_summary(&report);
                    }
                }
                Err(failure) => {
                    if let Some(spinner) = current {
                        spinner.fail();
                    }
                    ui::error(&format!("Pass {} failed", request.pass));
                    print_failure(failure);
                }
            }
        }
    }
}

fn on_report(report: CheckReport, root: &Path) {
    match report.outcome {
        CheckOutcome::Completed(diagnostics) if diagnostics.is_empty() => {
            ui::success("Static check passed");
        }
        CheckOutcome::Completed(diagnostics) => {
            let errors = ui::print_diagnostics(&diagnostics, root);
            ui::warning(&format!(
                "Static check found {errors} error(s) in {} file(s)",
                distinct_files(&diagnostics)
            ));
        }
        CheckOutcome::Unavailable { reason } => {
            ui::warning(&format!("Static check unavailable: {reason}"));
        }
    }
}

fn distinct_files(diagnostics: &[cachet_bundler::Diagnostic]) -> usize {
    let mut files: Vec<_> = diagnostics.iter().map(|d| d.file.as_path()).collect();
    files.sort();
    files.dedup();
    files.len()
}

async fn next_report(reports: &mut Option<UnboundedReceiver<CheckReport>>) -> Option<CheckReport> {
    match reports {
        Some(reports) => reports.recv().await,
        None => std::future::pending().await,
    }
}
