//! Global configuration settings shared across profiles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Fallback log filter when neither `--verbose`/`--quiet` nor `RUST_LOG` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Disable ANSI colors in terminal output
    #[serde(default)]
    pub no_color: bool,
}
