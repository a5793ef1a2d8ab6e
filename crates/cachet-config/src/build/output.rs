use serde::{Deserialize, Serialize};

use super::BuildMode;

/// Output filename templates.
///
/// Placeholders: `[name]`, `[ext]`, `[hash]`, `[contenthash]`, `[chunkhash]`,
/// each hash optionally truncated with `:N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenameTemplates {
    pub script: String,
    pub style: String,
    pub media: String,
}

const MEDIA_TEMPLATE: &str = "assets/media/[name].[hash:8].[ext]";

impl FilenameTemplates {
    pub fn for_mode(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Release => Self {
                script: "[name].[contenthash:8].js".to_string(),
                style: "[name].[contenthash:8].css".to_string(),
                media: MEDIA_TEMPLATE.to_string(),
            },
            BuildMode::Development => Self {
                script: "[name].js".to_string(),
                style: "[name].css".to_string(),
                media: MEDIA_TEMPLATE.to_string(),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("script", self.script.as_str()),
            ("style", self.style.as_str()),
            ("media", self.media.as_str()),
        ]
        .into_iter()
    }
}

/// What the resolver does once every candidate path is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Fail the build with every searched path listed
    #[default]
    Error,
    /// Warn and continue with an empty module at `<candidate>.<ext>`
    Fallback(String),
}
