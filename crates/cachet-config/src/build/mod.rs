//! Build configuration shared by the bundler and the CLI.

mod check;
mod helpers;
mod html;
mod mode;
mod output;
mod rules;
mod splitting;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use check::CheckOptions;
pub use html::HtmlOptions;
pub use mode::BuildMode;
pub use output::{FilenameTemplates, UnresolvedPolicy};
pub use rules::{BUILTIN_CHAINS, RuleConfig, StageConfig};
pub use splitting::{SplittingPolicy, VendorPolicy};

use helpers::{
    default_extension_priority, default_inline_threshold, default_manifest_filename,
    default_module_roots, default_output_dir, default_public_path, default_true,
};

/// Main build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub mode: BuildMode,

    /// Logical name → specifier, in declared order
    #[serde(default)]
    pub entry_points: IndexMap<String, String>,

    /// Extensions tried, in order, for specifiers without one
    #[serde(default = "default_extension_priority")]
    pub extension_priority: Vec<String>,

    /// Directory names searched in every ancestor for bare specifiers
    #[serde(default = "default_module_roots")]
    pub module_roots: Vec<String>,

    #[serde(default)]
    pub unresolved: UnresolvedPolicy,

    #[serde(default = "rules::default_rules")]
    pub rules: Vec<RuleConfig>,

    /// User chains; a chain with a built-in id replaces the built-in one
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub chains: IndexMap<String, Vec<StageConfig>>,

    #[serde(default)]
    pub splitting: SplittingPolicy,

    /// `size < threshold` inlines, `size >= threshold` emits a file
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold_bytes: u64,

    #[serde(default)]
    pub html: HtmlOptions,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Prefix joined onto every manifest value and injected tag
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Overrides the mode's filename templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filenames: Option<FilenameTemplates>,

    #[serde(default)]
    pub check: CheckOptions,

    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,

    /// Remove files left over from earlier release builds
    #[serde(default = "default_true")]
    pub clean_stale: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            entry_points: IndexMap::new(),
            extension_priority: default_extension_priority(),
            module_roots: default_module_roots(),
            unresolved: UnresolvedPolicy::default(),
            rules: rules::default_rules(),
            chains: IndexMap::new(),
            splitting: SplittingPolicy::default(),
            inline_threshold_bytes: default_inline_threshold(),
            html: HtmlOptions::default(),
            output_dir: default_output_dir(),
            public_path: default_public_path(),
            filenames: None,
            check: CheckOptions::default(),
            manifest_filename: default_manifest_filename(),
            clean_stale: true,
        }
    }
}

impl BuildConfig {
    /// Extensions without leading dots, in declared order, duplicates dropped
    pub fn normalized_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.extension_priority.len());
        for ext in &self.extension_priority {
            let ext = ext.trim().trim_start_matches('.');
            if !ext.is_empty() && !out.iter().any(|seen| seen == ext) {
                out.push(ext.to_string());
            }
        }
        out
    }

    pub fn filename_templates(&self) -> FilenameTemplates {
        self.filenames
            .clone()
            .unwrap_or_else(|| FilenameTemplates::for_mode(self.mode))
    }

    pub fn inline_runtime(&self) -> bool {
        self.html
            .inline_runtime
            .unwrap_or_else(|| self.mode.is_release())
    }

    pub fn with_entry(mut self, name: impl Into<String>, specifier: impl Into<String>) -> Self {
        self.entry_points.insert(name.into(), specifier.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dotted_extensions() {
        let config = BuildConfig {
            extension_priority: vec![".ts".into(), "js".into(), "ts".into(), " ".into()],
            ..Default::default()
        };
        assert_eq!(config.normalized_extensions(), vec!["ts", "js"]);
    }

    #[test]
    fn inline_runtime_follows_mode() {
        let mut config = BuildConfig::default();
        assert!(!config.inline_runtime());
        config.mode = BuildMode::Release;
        assert!(config.inline_runtime());
        config.html.inline_runtime = Some(false);
        assert!(!config.inline_runtime());
    }

    #[test]
    fn explicit_filenames_override_mode() {
        let mut config = BuildConfig {
            mode: BuildMode::Release,
            ..Default::default()
        };
        assert_eq!(config.filename_templates().script, "[name].[contenthash:8].js");

        config.filenames = Some(FilenameTemplates {
            script: "js/[name].[chunkhash:10].js".into(),
            style: "css/[name].css".into(),
            media: "[name].[ext]".into(),
        });
        assert_eq!(config.filename_templates().script, "js/[name].[chunkhash:10].js");
    }
}
