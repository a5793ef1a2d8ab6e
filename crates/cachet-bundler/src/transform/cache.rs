use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::module::{SourceModule, TransformedModule};
use crate::naming::fingerprint;
use crate::rules::ChainId;

#[derive(Debug, Clone)]
struct Entry {
    content_hash: String,
    chains: Vec<ChainId>,
    module: TransformedModule,
}

/// Transform results reused across watch passes.
///
/// Keyed by path; a hit also requires the same content fingerprint and
/// chain list, so a stale entry can never be served.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: Mutex<FxHashMap<PathBuf, Entry>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &SourceModule, chains: &[ChainId]) -> Option<TransformedModule> {
        let entries = self.entries.lock();
        let entry = entries.get(&module.path)?;
        (entry.chains == chains && entry.content_hash == fingerprint(&module.content))
            .then(|| entry.module.clone())
    }

    pub fn insert(&self, chains: &[ChainId], module: TransformedModule) {
        let content_hash = fingerprint(&module.source.content);
        self.entries.lock().insert(
            module.source.path.clone(),
            Entry {
                content_hash,
                chains: chains.to_vec(),
                module,
            },
        );
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.lock().remove(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleOutput;

    fn transformed(content: &str) -> TransformedModule {
        TransformedModule {
            source: SourceModule::new("/p/a.js", content.as_bytes().to_vec()),
            output: ModuleOutput::Script(content.to_string()),
        }
    }

    #[test]
    fn hit_requires_same_content_and_chains() {
        let cache = ModuleCache::new();
        let chains = vec!["script".to_string()];
        cache.insert(&chains, transformed("a"));

        assert!(cache.get(&transformed("a").source, &chains).is_some());
        assert!(cache.get(&transformed("b").source, &chains).is_none());
        assert!(cache.get(&transformed("a").source, &[]).is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ModuleCache::new();
        cache.insert(&[], transformed("a"));
        assert!(cache.invalidate(Path::new("/p/a.js")));
        assert!(cache.is_empty());
    }
}
