//! Specifier resolution.
//!
//! Relative and absolute specifiers resolve against the requesting
//! directory. Bare specifiers walk up from the requesting directory and try
//! every configured module root in each ancestor, nearest first.
//!
//! For each candidate path the order is: the file itself, then (unless the
//! specifier already ends in one of the configured extensions)
//! `<candidate>.<ext>` for every extension in priority order, then a directory's `package.json` `main` and
//! `index.<ext>`. Exhaustion is an error unless a fallback extension is
//! configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cachet_config::{BuildConfig, UnresolvedPolicy};
use path_clean::PathClean;

use crate::module::{ModuleRequest, SourceModule};
use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot resolve '{specifier}' from {} ({} paths searched)", from.display(), searched.len())]
pub struct ResolutionError {
    pub specifier: String,
    pub from: PathBuf,
    /// Every path probed, in probe order
    pub searched: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    runtime: Arc<dyn Runtime>,
    extensions: Vec<String>,
    module_roots: Vec<String>,
    unresolved: UnresolvedPolicy,
}

impl Resolver {
    pub fn new(runtime: Arc<dyn Runtime>, extensions: Vec<String>) -> Self {
        Self {
            runtime,
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect(),
            module_roots: vec!["node_modules".to_string()],
            unresolved: UnresolvedPolicy::Error,
        }
    }

    pub fn from_config(runtime: Arc<dyn Runtime>, config: &BuildConfig) -> Self {
        Self::new(runtime, config.normalized_extensions())
            .with_module_roots(config.module_roots.clone())
            .with_unresolved(config.unresolved.clone())
    }

    pub fn with_module_roots(mut self, roots: Vec<String>) -> Self {
        self.module_roots = roots;
        self
    }

    pub fn with_unresolved(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Resolve and read a module.
    pub async fn resolve(&self, request: &ModuleRequest) -> Result<SourceModule, ResolutionError> {
        let mut searched = Vec::new();
        let candidates = self.candidates(request);

        for candidate in &candidates {
            if let Some(path) = self.probe(candidate, &request.specifier, &mut searched).await {
                return self.read(request, path, searched).await;
            }
        }

        if let (UnresolvedPolicy::Fallback(ext), Some(first)) = (&self.unresolved, candidates.first()) {
            let path = append_extension(first, ext.trim_start_matches('.'));
            tracing::warn!(
                specifier = %request.specifier,
                from = %request.from_dir.display(),
                fallback = %path.display(),
                "unresolved specifier, continuing with an empty module"
            );
            return Ok(SourceModule::new(path, Vec::new()));
        }

        Err(ResolutionError {
            specifier: request.specifier.clone(),
            from: request.from_dir.clone(),
            searched,
        })
    }

    fn candidates(&self, request: &ModuleRequest) -> Vec<PathBuf> {
        if request.is_relative() {
            return vec![request.from_dir.join(&request.specifier).clean()];
        }

        let mut out = Vec::new();
        for ancestor in request.from_dir.ancestors() {
            for root in &self.module_roots {
                out.push(ancestor.join(root).join(&request.specifier).clean());
            }
        }
        out
    }

    async fn probe(
        &self,
        candidate: &Path,
        specifier: &str,
        searched: &mut Vec<PathBuf>,
    ) -> Option<PathBuf> {
        if let Some(found) = self.probe_file(candidate, specifier, searched).await {
            return Some(found);
        }

        if !self.runtime.is_dir(candidate).await {
            return None;
        }

        if let Some(main) = self.package_main(candidate, searched).await {
            let target = candidate.join(&main).clean();
            if let Some(found) = self.probe_file(&target, &main, searched).await {
                return Some(found);
            }
            if let Some(found) = self.probe_index(&target, searched).await {
                return Some(found);
            }
        }

        self.probe_index(candidate, searched).await
    }

    async fn probe_file(
        &self,
        candidate: &Path,
        specifier: &str,
        searched: &mut Vec<PathBuf>,
    ) -> Option<PathBuf> {
        searched.push(candidate.to_path_buf());
        if self.runtime.is_file(candidate).await {
            return Some(candidate.to_path_buf());
        }

        // `./app.config` still gets `.js` appended, `./app.js` does not
        if self.has_known_extension(specifier) {
            return None;
        }

        for ext in &self.extensions {
            let path = append_extension(candidate, ext);
            searched.push(path.clone());
            if self.runtime.is_file(&path).await {
                return Some(path);
            }
        }
        None
    }

    fn has_known_extension(&self, specifier: &str) -> bool {
        let last = specifier.rsplit(['/', '\\']).next().unwrap_or(specifier);
        Path::new(last)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    async fn probe_index(&self, dir: &Path, searched: &mut Vec<PathBuf>) -> Option<PathBuf> {
        for ext in &self.extensions {
            let path = dir.join(format!("index.{ext}"));
            searched.push(path.clone());
            if self.runtime.is_file(&path).await {
                return Some(path);
            }
        }
        None
    }

    async fn package_main(&self, dir: &Path, searched: &mut Vec<PathBuf>) -> Option<String> {
        let manifest = dir.join("package.json");
        searched.push(manifest.clone());
        let bytes = self.runtime.read_file(&manifest).await.ok()?;
        let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        value
            .get("main")
            .and_then(|main| main.as_str())
            .filter(|main| !main.is_empty())
            .map(String::from)
    }

    async fn read(
        &self,
        request: &ModuleRequest,
        path: PathBuf,
        searched: Vec<PathBuf>,
    ) -> Result<SourceModule, ResolutionError> {
        match self.runtime.read_file(&path).await {
            Ok(content) => {
                tracing::trace!(specifier = %request.specifier, path = %path.display(), "resolved");
                Ok(SourceModule::new(path, content))
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "resolved path unreadable");
                Err(ResolutionError {
                    specifier: request.specifier.clone(),
                    from: request.from_dir.clone(),
                    searched,
                })
            }
        }
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
