//! Watch-mode configuration.

use serde::{Deserialize, Serialize};

fn default_debounce_ms() -> u64 {
    100
}

fn default_ignore() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "*.log".to_string(),
        "*.tmp".to_string(),
    ]
}

/// File watching options used by `cachet watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Events for the same path inside this window are dropped
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Ignore patterns relative to the project root.
    ///
    /// `*.ext` matches by suffix, anything else matches a leading path
    /// segment. The output directory is always ignored.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
        }
    }
}
