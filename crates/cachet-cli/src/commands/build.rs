//! `cachet build`: one pass, written to the output directory.

use cachet_bundler::BuildPipeline;
use cachet_config::{BuildConfig, validate_fs};

use crate::cli::BuildArgs;
use crate::config::LoadedConfig;
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// # Build Process
///
/// 1. Validate the configuration against the project directory
/// 2. Run resolve, transform, group and emit
/// 3. Write outputs with the manifest replaced last
/// 4. Print the summary (and the manifest with `--print-manifest`)
///
/// # Errors
///
/// Returns configuration errors, or the pass's [`cachet_bundler::BuildFailure`]
/// with every error it collected.
pub async fn execute(args: BuildArgs, loaded: LoadedConfig) -> Result<()> {
    let LoadedConfig { root, file, config } = loaded;
    match &file {
        Some(path) => ui::info(&format!("Using {}", path.display())),
        None => ui::info("No config file found, using defaults and flags"),
    }
    validate_fs(&config.build, &root)?;

    let message = building_message(&config.build);
    let mut pipeline = BuildPipeline::new(root, config.build)?;

    let spinner = ui::Spinner::new(&message);
    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(failure) => {
            spinner.fail();
            return Err(failure.into());
        }
    };
    spinner.finish(&format!(
        "Built {} files in {}",
        report.assets.len(),
        ui::format_duration(report.duration)
    ));
    ui::print_build_summary(&report);

    if args.print_manifest {
        print!("{}", report.manifest.to_json()?);
    }
    Ok(())
}

pub(crate) fn building_message(config: &BuildConfig) -> String {
    match config.entry_points.len() {
        1 => format!("Building 1 entry ({})...", config.mode),
        n => format!("Building {n} entries ({})...", config.mode),
    }
}
