//! File-based config discovery for CLI use
//!
//! Finds a Cachet configuration file and layers it between the built-in
//! defaults and `CACHET_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use serde_json::Value;

use crate::config::CachetConfig;
use crate::error::{ConfigError, Result};

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "CACHET_";

const CONFIG_FILES: &[&str] = &["cachet.toml", "cachet.json"];

/// File-based configuration discovery
///
/// Library users should prefer `CachetConfig::from_value()`.
///
/// # Example
///
/// ```no_run
/// use cachet_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
    explicit: Option<PathBuf>,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            explicit: None,
        }
    }

    /// Use this file instead of searching the root
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.explicit = Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        });
        self
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. `cachet.toml`
    /// 2. `cachet.json`
    /// 3. `package.json` with a `cachet` field
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return path.exists().then(|| path.clone());
        }

        for name in CONFIG_FILES {
            let path = self.root.join(name);
            if path.exists() {
                return Some(path);
            }
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed = serde_json::from_str::<Value>(&content).ok()?;
        match parsed.get("cachet") {
            Some(value) if !value.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Layered sources: defaults < config file < environment.
    ///
    /// A missing config file is not an error here; callers that require one
    /// use [`ConfigDiscovery::load`].
    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(CachetConfig::default()));

        match self.find() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                figment = match path.extension().and_then(|ext| ext.to_str()) {
                    _ if is_package_json(&path) => {
                        figment.merge(Serialized::defaults(read_package_field(&path)?))
                    }
                    Some("json") => figment.merge(Json::file(&path)),
                    _ => figment.merge(Toml::file(&path)),
                };
            }
            None => {
                if let Some(path) = &self.explicit {
                    return Err(ConfigError::InvalidValue {
                        field: "config".to_string(),
                        hint: Some(format!("{} does not exist", path.display())),
                    });
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load config from the discovered file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<CachetConfig> {
        if self.find().is_none() {
            return Err(ConfigError::NotFound);
        }
        extract(self.figment()?)
    }

    /// Load config and merge the named profile (or the mode's profile)
    pub fn load_with_profile(&self, profile: Option<&str>) -> Result<CachetConfig> {
        self.load()?.materialize_profile(profile)
    }
}

/// Extract a `CachetConfig` from a layered figment
pub fn extract(figment: Figment) -> Result<CachetConfig> {
    figment.extract().map_err(|e| ConfigError::InvalidValue {
        field: "configuration".to_string(),
        hint: Some(e.to_string()),
    })
}

fn is_package_json(path: &Path) -> bool {
    path.file_name() == Some(std::ffi::OsStr::new("package.json"))
}

fn read_package_field(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: "package.json".to_string(),
        hint: Some(format!("invalid JSON: {e}")),
    })?;

    match parsed.get("cachet") {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(ConfigError::InvalidValue {
            field: "cachet".to_string(),
            hint: Some("add a 'cachet' field to your package.json".to_string()),
        }),
    }
}

/// Discover and load config from `root` (convenience function)
pub fn discover(root: impl AsRef<Path>) -> Result<CachetConfig> {
    ConfigDiscovery::new(root).load()
}

/// Discover and load config from `root`, then apply a profile
pub fn discover_with_profile(root: impl AsRef<Path>, profile: Option<&str>) -> Result<CachetConfig> {
    ConfigDiscovery::new(root).load_with_profile(profile)
}
