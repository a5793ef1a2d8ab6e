use std::path::PathBuf;

// Helper defaults
pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_public_path() -> String {
    "/".to_string()
}

pub(crate) fn default_inline_threshold() -> u64 {
    10_000
}

pub(crate) fn default_extension_priority() -> Vec<String> {
    ["mjs", "js", "ts", "tsx", "json", "jsx"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_module_roots() -> Vec<String> {
    vec!["node_modules".to_string()]
}

pub(crate) fn default_manifest_filename() -> String {
    "asset-manifest.json".to_string()
}

pub(crate) fn default_runtime_name() -> String {
    "runtime".to_string()
}

pub(crate) fn default_vendor_name() -> String {
    "vendors".to_string()
}

pub(crate) fn default_vendor_test() -> String {
    r"[\\/]node_modules[\\/]".to_string()
}

pub(crate) fn default_shared_threshold() -> usize {
    2
}

pub(crate) fn default_name_delimiter() -> String {
    ".".to_string()
}

pub(crate) fn default_html_filename() -> String {
    "index.html".to_string()
}

pub(crate) fn default_check_exclude() -> Vec<String> {
    [
        r"\.json$",
        r"(^|/)__tests__/",
        r"\.(spec|test)\.[^/]+$",
        r"(^|/)src/setupProxy\.",
        r"(^|/)src/setupTests\.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
