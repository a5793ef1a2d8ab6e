//! Top-level configuration and profile merging.
//!
//! File discovery lives in the `discovery` module.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::BuildConfig;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::settings::GlobalSettings;
use crate::watch::WatchOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CachetConfig {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub watch: WatchOptions,

    #[serde(default)]
    pub settings: GlobalSettings,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// Partial overrides keyed like the top-level sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub build: Value,

    #[serde(default)]
    pub watch: Value,

    #[serde(default)]
    pub settings: Value,
}

impl CachetConfig {
    /// Create from a JSON value (programmatic configuration)
    ///
    /// # Example
    ///
    /// ```
    /// use cachet_config::CachetConfig;
    /// use serde_json::json;
    ///
    /// let config = CachetConfig::from_value(json!({
    ///     "build": { "entry_points": { "app": "src/index" } }
    /// }))
    /// .unwrap();
    /// assert_eq!(config.build.entry_points["app"], "src/index");
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Merge the named profile over the base sections.
    ///
    /// With no explicit name the profile matching the build mode is used, if
    /// one is defined. An explicit name that does not exist is an error.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let name = match profile {
            Some(name) => {
                if !self.profiles.contains_key(name) {
                    return Err(ConfigError::InvalidProfileOverride {
                        message: format!("profile '{name}' is not defined"),
                    });
                }
                name.to_string()
            }
            None => self.build.mode.as_str().to_string(),
        };

        let Some(overrides) = self.profiles.get(&name).cloned() else {
            return Ok(self);
        };

        tracing::debug!(profile = %name, "applying configuration profile");
        self.build = apply_override(&self.build, &overrides.build)?;
        self.watch = apply_override(&self.watch, &overrides.watch)?;
        self.settings = apply_override(&self.settings, &overrides.settings)?;
        Ok(self)
    }
}

fn apply_override<T>(base: &T, update: &Value) -> ConfigResult<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    if update.is_null() {
        return Ok(base.clone());
    }

    let mut merged = serde_json::to_value(base).map_err(|err| {
        ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        }
    })?;
    merge_values(&mut merged, update);
    serde_json::from_value(merged).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

/// Objects merge key by key; arrays and scalars replace.
pub(crate) fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}
