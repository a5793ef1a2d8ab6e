use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::helpers::{default_html_filename, default_true};

/// HTML shell generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Jinja template; a built-in shell is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    /// Output file name, also the manifest key
    #[serde(default = "default_html_filename")]
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Inline the runtime chunk below the threshold. Defaults to on in release builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_runtime: Option<bool>,

    /// Extra template variables
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            template: None,
            filename: default_html_filename(),
            title: None,
            inline_runtime: None,
            variables: IndexMap::new(),
        }
    }
}
