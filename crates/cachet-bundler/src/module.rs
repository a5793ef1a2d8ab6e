//! Module-level data passed between pipeline stages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

/// A logical import and the directory it is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    pub specifier: String,
    pub from_dir: PathBuf,
}

impl ModuleRequest {
    pub fn new(specifier: impl Into<String>, from_dir: impl Into<PathBuf>) -> Self {
        Self {
            specifier: specifier.into(),
            from_dir: from_dir.into(),
        }
    }

    /// `./`, `../` or an absolute path
    pub fn is_relative(&self) -> bool {
        let spec = self.specifier.as_str();
        spec.starts_with("./")
            || spec.starts_with("../")
            || spec == "."
            || spec == ".."
            || Path::new(spec).is_absolute()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Script,
    Style,
    Media,
    Font,
    Json,
    Html,
    Opaque,
}

impl ModuleCategory {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => ModuleCategory::Script,
            "css" => ModuleCategory::Style,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" | "ico" => {
                ModuleCategory::Media
            }
            "woff" | "woff2" | "eot" | "ttf" | "otf" => ModuleCategory::Font,
            "json" => ModuleCategory::Json,
            "html" | "htm" => ModuleCategory::Html,
            _ => ModuleCategory::Opaque,
        }
    }

    /// Categories whose source is read as text by the scanner and checker
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ModuleCategory::Script | ModuleCategory::Style | ModuleCategory::Json
        )
    }
}

/// A resolved source file. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    pub path: PathBuf,
    pub content: Arc<[u8]>,
    pub category: ModuleCategory,
}

impl SourceModule {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Arc<[u8]>>) -> Self {
        let path = path.into();
        let category = ModuleCategory::from_path(&path);
        Self {
            path,
            content: content.into(),
            category,
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    pub fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset")
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// Stable module identifier used in rendered chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final form of a module after its chains ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutput {
    Script(String),
    /// Extracted into the owning chunk's stylesheet
    Stylesheet(String),
    /// Below the inlining threshold
    InlineAsset { data_uri: String },
    /// Separate hashed file, path relative to the output directory
    FileAsset { path: String, bytes: Arc<[u8]> },
}

impl ModuleOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            ModuleOutput::Script(_) => "script",
            ModuleOutput::Stylesheet(_) => "stylesheet",
            ModuleOutput::InlineAsset { .. } => "inline-asset",
            ModuleOutput::FileAsset { .. } => "file-asset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedModule {
    pub source: SourceModule,
    pub output: ModuleOutput,
}

/// MIME type for data URIs and nothing else.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "json" => "application/json",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        _ => "application/octet-stream",
    }
}

/// Project-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_extension() {
        assert_eq!(
            ModuleCategory::from_path(Path::new("a/b.TSX")),
            ModuleCategory::Script
        );
        assert_eq!(
            ModuleCategory::from_path(Path::new("logo.png")),
            ModuleCategory::Media
        );
        assert_eq!(
            ModuleCategory::from_path(Path::new("font.woff2")),
            ModuleCategory::Font
        );
        assert_eq!(
            ModuleCategory::from_path(Path::new("README")),
            ModuleCategory::Opaque
        );
    }

    #[test]
    fn relative_specifiers() {
        assert!(ModuleRequest::new("./a", "/p").is_relative());
        assert!(ModuleRequest::new("../a", "/p").is_relative());
        assert!(ModuleRequest::new("/abs/a", "/p").is_relative());
        assert!(!ModuleRequest::new("lodash", "/p").is_relative());
        assert!(!ModuleRequest::new("@scope/pkg", "/p").is_relative());
    }

    #[test]
    fn relative_path_uses_forward_slashes() {
        let root = Path::new("/p");
        assert_eq!(relative_path(root, Path::new("/p/src/a.ts")), "src/a.ts");
    }
}
