//! Module id assignment.
//!
//! Ids never depend on discovery order. Hashed ids are a prefix of the
//! BLAKE3 digest of the project-relative path, so adding a module leaves every
//! other id untouched. On a prefix collision the path that sorts later gets a
//! longer prefix; when the ids of an earlier pass are passed in, modules keep
//! the id they had and only newcomers are widened.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::graph::ModuleGraph;
use crate::module::{ModuleId, relative_path};

const HASHED_ID_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleIdStrategy {
    /// Short path digests (release)
    Hashed,
    /// Project-relative paths (development)
    Named,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleIds {
    ids: BTreeMap<PathBuf, ModuleId>,
}

impl ModuleIds {
    pub fn assign(graph: &ModuleGraph, strategy: ModuleIdStrategy) -> Self {
        let paths = graph.modules().map(|m| m.source.path.clone());
        Self::assign_paths(graph.root(), paths, strategy, None)
    }

    /// Like [`ModuleIds::assign`], keeping every id from `previous` that is
    /// still valid.
    pub fn assign_after(graph: &ModuleGraph, strategy: ModuleIdStrategy, previous: &ModuleIds) -> Self {
        let paths = graph.modules().map(|m| m.source.path.clone());
        Self::assign_paths(graph.root(), paths, strategy, Some(previous))
    }

    pub fn assign_paths(
        root: &Path,
        paths: impl IntoIterator<Item = PathBuf>,
        strategy: ModuleIdStrategy,
        previous: Option<&ModuleIds>,
    ) -> Self {
        let by_relative: BTreeMap<String, PathBuf> = paths
            .into_iter()
            .map(|path| (relative_path(root, &path), path))
            .collect();

        let mut ids = BTreeMap::new();
        match strategy {
            ModuleIdStrategy::Named => {
                for (relative, path) in by_relative {
                    ids.insert(path, ModuleId::new(relative));
                }
            }
            ModuleIdStrategy::Hashed => {
                let mut taken: BTreeSet<String> = BTreeSet::new();
                let mut fresh = Vec::new();
                for (relative, path) in by_relative {
                    let digest = blake3::hash(relative.as_bytes()).to_hex().to_string();
                    let kept = previous.and_then(|previous| previous.get(&path)).filter(|id| {
                        id.as_str().len() >= HASHED_ID_LENGTH
                            && digest.starts_with(id.as_str())
                            && !taken.contains(id.as_str())
                    });
                    match kept {
                        Some(id) => {
                            taken.insert(id.as_str().to_string());
                            ids.insert(path, id.clone());
                        }
                        None => fresh.push((relative, path, digest)),
                    }
                }

                for (relative, path, digest) in fresh {
                    let mut length = HASHED_ID_LENGTH;
                    while taken.contains(&digest[..length]) && length < digest.len() {
                        length += 1;
                    }
                    let id = digest[..length].to_string();
                    if length > HASHED_ID_LENGTH {
                        tracing::debug!(module = %relative, id = %id, "module id prefix collision");
                    }
                    taken.insert(id.clone());
                    ids.insert(path, ModuleId::new(id));
                }
            }
        }
        Self { ids }
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleId> {
        self.ids.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &ModuleId)> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
