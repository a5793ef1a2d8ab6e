#![cfg_attr(docsrs, feature(doc_cfg))]

//! # cachet-bundler
//!
//! Deterministic build pipeline for browser applications: modules are
//! resolved, classified by ordered rules, transformed per chain, grouped
//! into runtime/vendor/shared/entry chunks and emitted under content-hashed
//! names together with an `asset-manifest.json` and an HTML shell.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cachet_bundler::BuildPipeline;
//! use cachet_config::{BuildConfig, BuildMode};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuildConfig {
//!     mode: BuildMode::Release,
//!     ..BuildConfig::default()
//! }
//! .with_entry("app", "src/index");
//!
//! let mut pipeline = BuildPipeline::new(".", config)?;
//! let report = pipeline.run().await?;
//! for asset in &report.assets {
//!     println!("{} -> {}", asset.logical_name, asset.path);
//! }
//! # Ok(()) }
//! ```
//!
//! The bundler only emits `tracing` events. Install a subscriber yourself or
//! enable the `logging` feature for [`logging::init_logging`].

pub mod checker;
pub mod chunk;
pub mod diagnostics;
pub mod emit;
pub mod graph;
pub mod lower;
pub mod module;
pub mod module_id;
pub mod naming;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod rules;
pub mod runtime;
pub mod scan;
pub mod transform;
pub mod watch;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use checker::{
    CheckOutcome, CheckReport, CheckTicket, DelimiterCheck, Diagnostic, IncrementalChecker,
    Severity, SourceSet, StaticCheck,
};
pub use chunk::{Chunk, ChunkKind, ChunkSet, EntryPlan};
pub use diagnostics::BuildFailure;
pub use emit::{EmitPlan, Manifest, OutputAsset};
pub use graph::{GraphBuilder, ModuleGraph};
pub use module::{ModuleCategory, ModuleId, ModuleOutput, ModuleRequest, SourceModule};
pub use module_id::{ModuleIdStrategy, ModuleIds};
pub use naming::NamingMode;
pub use pipeline::{BuildPipeline, BuildPlan, BuildReport, PipelineRunner, Stage};
pub use resolver::{ResolutionError, Resolver};
pub use rules::{Classification, RuleSet};
pub use runtime::{FileMetadata, NativeRuntime, Runtime, RuntimeError};
pub use transform::{PassThrough, TransformError, TransformPipeline, Transpiler};
pub use watch::{
    PassRequest, PassRunner, PipelineState, RebuildCoordinator, WatchEvent, WatchSession,
};

#[cfg(any(test, feature = "test-utils"))]
pub use runtime::MemoryRuntime;

use std::path::PathBuf;

/// Error types for cachet-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A module ended up in zero or several chunks.
    #[error("module {} is assigned to {} chunks ({})", module.display(), chunks.len(), chunks.join(", "))]
    GroupingInvariant { module: PathBuf, chunks: Vec<String> },

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] cachet_config::ConfigError),

    #[error("html template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Template(err.to_string())
    }
}

/// Result type alias for cachet-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;
