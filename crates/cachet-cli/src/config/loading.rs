use std::path::{Path, PathBuf};

use cachet_config::{BuildMode, CachetConfig, ConfigDiscovery, extract};
use figment::Figment;
use figment::providers::Serialized;
use serde::Serialize;

use crate::cli::{BuildOverrides, Cli};
use crate::error::{CliError, Result};

/// Where to look for configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Project root; the current directory when `None`
    pub cwd: Option<PathBuf>,
    /// Explicit config file
    pub file: Option<PathBuf>,
    pub profile: Option<String>,
}

impl ConfigSource {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            cwd: cli.cwd.clone(),
            file: cli.config.clone(),
            profile: cli.profile.clone(),
        }
    }
}

/// Resolved configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Absolute project root
    pub root: PathBuf,
    /// The config file that was read, if any
    pub file: Option<PathBuf>,
    pub config: CachetConfig,
}

/// Flag values layered over the profile-merged configuration.
#[derive(Debug, Default, Serialize)]
struct FlagLayer {
    build: BuildFlags,
}

#[derive(Debug, Default, Serialize)]
struct BuildFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_threshold_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clean_stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<HtmlFlags>,
}

#[derive(Debug, Serialize)]
struct HtmlFlags {
    enabled: bool,
}

impl From<&BuildOverrides> for FlagLayer {
    fn from(overrides: &BuildOverrides) -> Self {
        Self {
            build: BuildFlags {
                output_dir: overrides.out_dir.clone(),
                public_path: overrides.public_path.clone(),
                inline_threshold_bytes: overrides.inline_threshold,
                clean_stale: overrides.keep_stale.then_some(false),
                html: overrides.no_html.then_some(HtmlFlags { enabled: false }),
            },
        }
    }
}

/// Load configuration for one command.
///
/// The mode flag is applied before profile selection so `--mode production`
/// picks the `production` profile. The remaining flags win over the profile.
/// Entries given on the command line replace the configured ones.
pub fn load_config(source: &ConfigSource, overrides: &BuildOverrides) -> Result<LoadedConfig> {
    let root = project_root(source.cwd.as_deref())?;

    let mut discovery = ConfigDiscovery::new(&root);
    if let Some(file) = &source.file {
        discovery = discovery.with_file(file);
    }
    let file = discovery.find();

    let mut figment = discovery.figment()?;
    if let Some(mode) = overrides.mode {
        figment = figment.merge(Serialized::default("build.mode", BuildMode::from(mode)));
    }
    let config = extract(figment)?.materialize_profile(source.profile.as_deref())?;

    let mut config = extract(
        Figment::from(Serialized::defaults(config)).merge(Serialized::defaults(FlagLayer::from(overrides))),
    )?;
    if !overrides.entries.is_empty() {
        config.build.entry_points = overrides.entries.iter().cloned().collect();
    }

    tracing::debug!(
        root = %root.display(),
        file = ?file,
        mode = %config.build.mode,
        entries = config.build.entry_points.len(),
        "configuration loaded"
    );
    Ok(LoadedConfig { root, file, config })
}

fn project_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => current.join(dir),
        None => current,
    };
    if !root.is_dir() {
        return Err(CliError::FileNotFound(root));
    }
    Ok(root)
}
