//! Pluggable config validation strategies
//!
//! Schema validation is pure; filesystem validation is for the CLI.

use std::path::{Component, Path, PathBuf};

use regex::Regex;

use crate::build::{BUILTIN_CHAINS, BuildConfig, RuleConfig};
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use cachet_config::{BuildConfig, ConfigValidator, SchemaValidator};
///
/// let config = BuildConfig::default().with_entry("app", "src/index");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        if config.entry_points.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        let splitting = &config.splitting;
        for (name, specifier) in &config.entry_points {
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(ConfigError::schema(
                    format!("entry name '{name}' is not a valid file name"),
                    "use a plain name such as 'app'",
                ));
            }
            if specifier.trim().is_empty() {
                return Err(ConfigError::schema(
                    format!("entry '{name}' has an empty specifier"),
                    "point it at a module, e.g. 'src/index'",
                ));
            }
            let reserved = (splitting.runtime_isolation && name == &splitting.runtime_name)
                || (splitting.vendor.enabled && name == &splitting.vendor.name);
            if reserved {
                return Err(ConfigError::schema(
                    format!("entry name '{name}' collides with a generated chunk"),
                    "rename the entry or change splitting.runtime_name / splitting.vendor.name",
                ));
            }
        }

        if config.normalized_extensions().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "build.extension_priority".to_string(),
                hint: Some("list at least one extension, e.g. [\"ts\", \"js\"]".to_string()),
            });
        }

        if splitting.shared_threshold < 2 {
            return Err(ConfigError::InvalidValue {
                field: "build.splitting.shared_threshold".to_string(),
                hint: Some("a module is shared once at least 2 entries reach it".to_string()),
            });
        }
        if splitting.vendor.enabled {
            compile(&splitting.vendor.test)?;
        }

        for rule in &config.rules {
            validate_rule(config, rule)?;
        }
        for pattern in &config.check.exclude {
            compile(pattern)?;
        }

        for (kind, template) in config.filename_templates().iter() {
            if !template.contains("[name]") {
                return Err(ConfigError::InvalidValue {
                    field: format!("build.filenames.{kind}"),
                    hint: Some("templates must contain [name]".to_string()),
                });
            }
        }

        if config.manifest_filename.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "build.manifest_filename".to_string(),
                hint: None,
            });
        }

        Ok(())
    }
}

fn validate_rule(config: &BuildConfig, rule: &RuleConfig) -> Result<()> {
    for pattern in rule.test.iter().chain(&rule.exclude) {
        compile(pattern)?;
    }

    if rule.is_group() {
        for child in &rule.one_of {
            validate_rule(config, child)?;
        }
        return Ok(());
    }

    let Some(chain) = &rule.chain else {
        return Err(ConfigError::schema(
            "rule without one_of must name a chain",
            "add chain = \"script\" (or style, media, file)",
        ));
    };

    if !BUILTIN_CHAINS.contains(&chain.as_str()) && !config.chains.contains_key(chain) {
        return Err(ConfigError::schema(
            format!("unknown chain '{chain}'"),
            "define it under [build.chains] or use a built-in chain",
        ));
    }
    Ok(())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Filesystem validator (for CLI use)
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        if let Some(template) = config.html.template.as_ref().filter(|_| config.html.enabled) {
            let path = self.root.join(template);
            if !path.is_file() {
                return Err(ConfigError::TemplateNotFound { path });
            }
        }

        let output = &config.output_dir;
        let normalized: Vec<Component<'_>> = output
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if normalized.is_empty() || self.root.join(output) == self.root {
            return Err(ConfigError::OutputDirConflict {
                path: output.clone(),
                what: "the project root",
            });
        }
        if normalized.first() == Some(&Component::Normal("src".as_ref())) {
            return Err(ConfigError::OutputDirConflict {
                path: output.clone(),
                what: "the source directory",
            });
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &BuildConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for filesystem validation
pub fn validate_fs(config: &BuildConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
