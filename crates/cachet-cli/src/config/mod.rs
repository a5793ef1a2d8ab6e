//! Configuration loading for CLI commands.
//!
//! Sources are layered as defaults < config file < `CACHET_*` environment
//! < profile < command-line flags.

mod loading;

pub use loading::{ConfigSource, LoadedConfig, load_config};
