use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// `asset-manifest.json`: logical name to public URL, keys sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, logical: impl Into<String>, url: impl Into<String>) -> Option<String> {
        self.entries.insert(logical.into(), url.into())
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.entries.get(logical).map(String::as_str)
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.entries.contains_key(logical)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::WriteFailure(format!("cannot serialize manifest: {e}")))?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("malformed asset manifest: {e}")))
    }

    /// The manifest at `path`, `None` when there is none or it is unreadable.
    pub fn read(path: &Path) -> Option<Self> {
        let json = fs::read_to_string(path).ok()?;
        match Self::from_json(&json) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring previous manifest");
                None
            }
        }
    }

    /// Output-relative paths of every entry served under `public_path`.
    pub fn output_paths<'a>(&'a self, public_path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .values()
            .filter_map(move |url| url.strip_prefix(public_path))
            .map(|path| path.trim_start_matches('/'))
            .filter(|path| !path.is_empty())
    }
}
