use serde::{Deserialize, Serialize};

use super::helpers::{default_check_exclude, default_true};

/// Incremental checker options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Regexes over project-relative paths whose diagnostics are not reported
    #[serde(default = "default_check_exclude")]
    pub exclude: Vec<String>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude: default_check_exclude(),
        }
    }
}
