use serde::{Deserialize, Serialize};

/// Build mode, selected once per invocation.
///
/// Everything that differs between development and release builds is derived
/// from this value instead of being toggled by scattered boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildMode {
    /// Stable file names, readable module ids, injected styles
    #[default]
    #[serde(rename = "development", alias = "dev")]
    Development,
    /// Content-hashed file names, hashed module ids, extracted styles
    #[serde(rename = "production", alias = "release", alias = "prod")]
    Release,
}

impl BuildMode {
    /// Name used for profile selection and `process.env.NODE_ENV`
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Release => "production",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, BuildMode::Release)
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" | "release" => Ok(BuildMode::Release),
            other => Err(format!("unknown build mode: {other}")),
        }
    }
}
