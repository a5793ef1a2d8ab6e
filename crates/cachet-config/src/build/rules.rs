use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single classification rule.
///
/// Rules at the top level of `build.rules` form a non-exclusive group: every
/// matching rule contributes its chain in declared order. A rule carrying
/// `one_of` children is a first-match-wins group instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regexes tested against the module path (forward slashes). Empty matches all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<String>,

    /// Path prefixes (relative to the project root) the module must live under
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    /// Regexes that suppress the match even when `test` and `include` pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Chain id applied when this rule matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    /// First-match-wins children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<RuleConfig>,
}

impl RuleConfig {
    pub fn new(test: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            test: vec![test.into()],
            chain: Some(chain.into()),
            ..Default::default()
        }
    }

    pub fn one_of(children: Vec<RuleConfig>) -> Self {
        Self {
            one_of: children,
            ..Default::default()
        }
    }

    pub fn with_include(mut self, path: impl Into<PathBuf>) -> Self {
        self.include.push(path.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Catch-all rule: matches everything not excluded
    pub fn fallback(chain: impl Into<String>) -> Self {
        Self {
            chain: Some(chain.into()),
            ..Default::default()
        }
    }

    pub fn is_group(&self) -> bool {
        !self.one_of.is_empty()
    }
}

/// One stage of a transform chain, as written in `[chains]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum StageConfig {
    /// Hand the source to the configured transpiler
    Transpile,
    /// Replace `process.env.NODE_ENV` with the build mode
    Define,
    /// Regex substitution over script or style text
    Replace {
        pattern: String,
        replacement: String,
    },
    /// Hand the script to the configured minifier
    Minify,
    /// Stylesheet resolution
    Css,
    /// Compact the stylesheet with lightningcss
    MinifyCss,
    /// Emit the stylesheet into the chunk's CSS file
    ExtractCss,
    /// Wrap the stylesheet in a script that appends a `<style>` element
    InjectCss,
    /// Inline below the threshold, otherwise a hashed file
    Url {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },
    /// Always a separate hashed file
    File,
}

impl StageConfig {
    pub fn id(&self) -> &'static str {
        match self {
            StageConfig::Transpile => "transpile",
            StageConfig::Define => "define",
            StageConfig::Replace { .. } => "replace",
            StageConfig::Minify => "minify",
            StageConfig::Css => "css",
            StageConfig::MinifyCss => "minify-css",
            StageConfig::ExtractCss => "extract-css",
            StageConfig::InjectCss => "inject-css",
            StageConfig::Url { .. } => "url",
            StageConfig::File => "file",
        }
    }
}

/// Chain ids every build plan provides without configuration.
pub const BUILTIN_CHAINS: &[&str] = &["script", "style", "media", "file"];

const SCRIPT_TEST: &str = r"\.(m?js|jsx|tsx?)$";

pub(crate) fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::new(SCRIPT_TEST, "script").with_include("src"),
        RuleConfig::new(r"\.css$", "style"),
        RuleConfig::one_of(vec![
            RuleConfig {
                test: vec![
                    r"\.bmp$".into(),
                    r"\.gif$".into(),
                    r"\.jpe?g$".into(),
                    r"\.png$".into(),
                ],
                chain: Some("media".into()),
                ..Default::default()
            },
            RuleConfig::fallback("file")
                .with_exclude(SCRIPT_TEST)
                .with_exclude(r"\.html$")
                .with_exclude(r"\.json$")
                .with_exclude(r"\.css$"),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_config_uses_stage_tag() {
        let stages: Vec<StageConfig> = serde_json::from_str(
            r#"[{"stage":"transpile"},{"stage":"url","limit":512},{"stage":"minify-css"},{"stage":"extract-css"}]"#,
        )
        .unwrap();
        assert_eq!(
            stages,
            vec![
                StageConfig::Transpile,
                StageConfig::Url { limit: Some(512) },
                StageConfig::MinifyCss,
                StageConfig::ExtractCss
            ]
        );
    }

    #[test]
    fn default_rules_end_with_one_of_group() {
        let rules = default_rules();
        assert_eq!(rules.len(), 3);
        assert!(rules[2].is_group());
        assert_eq!(rules[2].one_of[1].exclude.len(), 4);
    }
}
