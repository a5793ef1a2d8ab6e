//! Chunk grouping.
//!
//! Membership and order are pure functions of the graph, the module ids and
//! the splitting policy:
//!
//! * the runtime chunk carries only the bootstrap glue;
//! * the vendor chunk takes every module matching the vendor test, whichever
//!   entry reached it;
//! * non-vendor modules reached by at least `shared_threshold` entries go to a
//!   shared chunk per exact entry set, named by the sorted entry names;
//! * modules reached by several entries but fewer than the threshold are
//!   pooled into one `common` chunk, since a module is never duplicated;
//! * everything else belongs to its single entry's chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use cachet_config::SplittingPolicy;
use regex::Regex;
use serde::Serialize;

use crate::graph::ModuleGraph;
use crate::module::ModuleId;
use crate::module_id::ModuleIds;
use crate::{Error, Result};

/// Name of the pool for modules shared below the threshold
pub const COMMON_CHUNK: &str = "common";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Runtime,
    Vendor,
    Shared,
    Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Sorted by module id
    pub modules: Vec<PathBuf>,
    /// Modules executed once this chunk is registered
    pub entry_modules: Vec<PathBuf>,
}

/// Chunks one entry needs, in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPlan {
    pub entry: String,
    pub chunks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSet {
    pub chunks: Vec<Chunk>,
    pub plans: Vec<EntryPlan>,
}

impl ChunkSet {
    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    pub fn runtime(&self) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.kind == ChunkKind::Runtime)
    }
}

pub fn group(graph: &ModuleGraph, ids: &ModuleIds, policy: &SplittingPolicy) -> Result<ChunkSet> {
    let vendor_test = if policy.vendor.enabled {
        Some(Regex::new(&policy.vendor.test).map_err(|e| {
            Error::InvalidConfig(format!(
                "invalid vendor test '{}': {e}",
                policy.vendor.test
            ))
        })?)
    } else {
        None
    };

    let entries = graph.entries();
    let reach: Vec<BTreeSet<PathBuf>> = entries
        .iter()
        .map(|entry| graph.reachable_from(&entry.path))
        .collect();

    let mut vendor: Vec<PathBuf> = Vec::new();
    let mut common: Vec<PathBuf> = Vec::new();
    let mut shared: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut own: Vec<Vec<PathBuf>> = vec![Vec::new(); entries.len()];

    for module in graph.modules() {
        let path = &module.source.path;
        let subject = path.to_string_lossy().replace('\\', "/");
        if vendor_test.as_ref().is_some_and(|re| re.is_match(&subject)) {
            vendor.push(path.clone());
            continue;
        }

        let reached_by: Vec<usize> = (0..entries.len())
            .filter(|&index| reach[index].contains(path))
            .collect();

        match reached_by.as_slice() {
            [] => {}
            [only] => own[*only].push(path.clone()),
            many if many.len() >= policy.shared_threshold => {
                let mut names: Vec<&str> = many.iter().map(|&i| entries[i].name.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                shared
                    .entry(names.join(&policy.name_delimiter))
                    .or_default()
                    .push(path.clone());
            }
            _ => common.push(path.clone()),
        }
    }

    let mut chunks = Vec::new();
    if policy.runtime_isolation {
        chunks.push(Chunk {
            name: policy.runtime_name.clone(),
            kind: ChunkKind::Runtime,
            modules: Vec::new(),
            entry_modules: Vec::new(),
        });
    }
    if !vendor.is_empty() {
        chunks.push(make_chunk(&policy.vendor.name, ChunkKind::Vendor, vendor, ids));
    }
    if !common.is_empty() {
        shared
            .entry(COMMON_CHUNK.to_string())
            .or_default()
            .extend(common);
    }
    for (name, modules) in shared {
        chunks.push(make_chunk(&name, ChunkKind::Shared, modules, ids));
    }
    for (entry, modules) in entries.iter().zip(own) {
        let mut chunk = make_chunk(&entry.name, ChunkKind::Entry, modules, ids);
        chunk.entry_modules = vec![entry.path.clone()];
        chunks.push(chunk);
    }

    check_names(&chunks)?;
    check_membership(graph, &chunks)?;

    let plans = entries
        .iter()
        .zip(&reach)
        .map(|(entry, reached)| EntryPlan {
            entry: entry.name.clone(),
            chunks: chunks
                .iter()
                .filter(|chunk| match chunk.kind {
                    ChunkKind::Runtime => true,
                    ChunkKind::Vendor | ChunkKind::Shared => {
                        chunk.modules.iter().any(|m| reached.contains(m))
                    }
                    ChunkKind::Entry => chunk.name == entry.name,
                })
                .map(|chunk| chunk.name.clone())
                .collect(),
        })
        .collect();

    Ok(ChunkSet { chunks, plans })
}

fn make_chunk(name: &str, kind: ChunkKind, mut modules: Vec<PathBuf>, ids: &ModuleIds) -> Chunk {
    modules.sort_by(|a, b| sort_key(ids, a).cmp(&sort_key(ids, b)));
    Chunk {
        name: name.to_string(),
        kind,
        modules,
        entry_modules: Vec::new(),
    }
}

fn sort_key<'a>(ids: &'a ModuleIds, path: &'a PathBuf) -> (Option<&'a ModuleId>, &'a PathBuf) {
    (ids.get(path), path)
}

fn check_names(chunks: &[Chunk]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for chunk in chunks {
        if !seen.insert(chunk.name.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "two chunks are named '{}'; rename an entry or change the splitting names",
                chunk.name
            )));
        }
    }
    Ok(())
}

fn check_membership(graph: &ModuleGraph, chunks: &[Chunk]) -> Result<()> {
    let mut owners: BTreeMap<&PathBuf, Vec<&str>> = BTreeMap::new();
    for chunk in chunks {
        for module in &chunk.modules {
            owners.entry(module).or_default().push(&chunk.name);
        }
    }

    for module in graph.modules() {
        let chunks = owners.remove(&module.source.path).unwrap_or_default();
        if chunks.len() != 1 {
            return Err(Error::GroupingInvariant {
                module: module.source.path.clone(),
                chunks: chunks.into_iter().map(String::from).collect(),
            });
        }
    }
    if let Some((module, chunks)) = owners.into_iter().next() {
        return Err(Error::GroupingInvariant {
            module: module.clone(),
            chunks: chunks.into_iter().map(String::from).collect(),
        });
    }
    Ok(())
}
