use serde::{Deserialize, Serialize};

use super::helpers::{
    default_name_delimiter, default_runtime_name, default_shared_threshold, default_true,
    default_vendor_name, default_vendor_test,
};

/// How the module graph is partitioned into chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplittingPolicy {
    /// Put the bootstrap glue into its own chunk
    #[serde(default = "default_true")]
    pub runtime_isolation: bool,

    #[serde(default = "default_runtime_name")]
    pub runtime_name: String,

    #[serde(default)]
    pub vendor: VendorPolicy,

    /// Minimum number of entries that must reach a module before it is hoisted
    #[serde(default = "default_shared_threshold")]
    pub shared_threshold: usize,

    /// Joins entry names when naming shared chunks
    #[serde(default = "default_name_delimiter")]
    pub name_delimiter: String,
}

impl Default for SplittingPolicy {
    fn default() -> Self {
        Self {
            runtime_isolation: true,
            runtime_name: default_runtime_name(),
            vendor: VendorPolicy::default(),
            shared_threshold: default_shared_threshold(),
            name_delimiter: default_name_delimiter(),
        }
    }
}

/// Dependency-origin predicate for the vendor chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_vendor_name")]
    pub name: String,

    /// Regex tested against the module's absolute path
    #[serde(default = "default_vendor_test")]
    pub test: String,
}

impl Default for VendorPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_vendor_name(),
            test: default_vendor_test(),
        }
    }
}
