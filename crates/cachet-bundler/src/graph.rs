//! Module graph discovery.
//!
//! Breadth-first from the entry points in declared order. Every dependency is
//! resolved from its importer's directory; all resolution failures are
//! collected before the build gives up.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::module::{ModuleCategory, ModuleRequest, SourceModule};
use crate::resolver::{ResolutionError, Resolver};
use crate::scan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// As written (normalized for stylesheets)
    pub specifier: String,
    pub target: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GraphModule {
    pub source: SourceModule,
    pub dependencies: Vec<Dependency>,
}

impl GraphModule {
    pub fn target_of(&self, specifier: &str) -> Option<&Path> {
        self.dependencies
            .iter()
            .find(|dep| dep.specifier == specifier)
            .map(|dep| dep.target.as_path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModuleGraph {
    root: PathBuf,
    modules: BTreeMap<PathBuf, GraphModule>,
    entries: Vec<EntryPoint>,
    import_order: Vec<PathBuf>,
}

impl ModuleGraph {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    /// Modules in path order
    pub fn modules(&self) -> impl Iterator<Item = &GraphModule> {
        self.modules.values()
    }

    /// Every module, dependencies before their importers. Entries are walked
    /// in declared order and each module's dependencies in source order, so
    /// this is the order a browser would evaluate them in.
    pub fn import_order(&self) -> &[PathBuf] {
        &self.import_order
    }

    pub fn get(&self, path: &Path) -> Option<&GraphModule> {
        self.modules.get(path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Every module reachable from `start`, `start` included.
    pub fn reachable_from(&self, start: &Path) -> BTreeSet<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start.to_path_buf()]);
        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(module) = self.modules.get(&path) {
                for dep in &module.dependencies {
                    if !seen.contains(&dep.target) {
                        queue.push_back(dep.target.clone());
                    }
                }
            }
        }
        seen
    }
}

/// Specifiers a module depends on, by category.
pub fn dependency_specifiers(module: &SourceModule) -> Vec<String> {
    let Some(text) = module.text() else {
        return Vec::new();
    };
    match module.category {
        ModuleCategory::Script => scan::script_specifiers(text),
        ModuleCategory::Style => scan::style_references(text)
            .into_iter()
            .map(|reference| reference.specifier)
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    resolver: Resolver,
    root: PathBuf,
}

impl GraphBuilder {
    pub fn new(resolver: Resolver, root: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            root: root.into(),
        }
    }

    /// Discover the graph. Entry specifiers are project-relative.
    pub async fn build(
        &self,
        entries: &IndexMap<String, String>,
    ) -> Result<ModuleGraph, Vec<ResolutionError>> {
        let mut errors = Vec::new();
        let mut modules: BTreeMap<PathBuf, GraphModule> = BTreeMap::new();
        let mut queue: VecDeque<SourceModule> = VecDeque::new();
        let mut entry_points = Vec::with_capacity(entries.len());

        for (name, specifier) in entries {
            let request = ModuleRequest::new(entry_specifier(specifier), self.root.clone());
            match self.resolver.resolve(&request).await {
                Ok(source) => {
                    entry_points.push(EntryPoint {
                        name: name.clone(),
                        path: source.path.clone(),
                    });
                    queue.push_back(source);
                }
                Err(err) => errors.push(err),
            }
        }

        let mut queued: BTreeSet<PathBuf> = queue.iter().map(|m| m.path.clone()).collect();
        while let Some(source) = queue.pop_front() {
            if modules.contains_key(&source.path) {
                continue;
            }

            let from_dir = source
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone());

            let mut dependencies = Vec::new();
            for specifier in dependency_specifiers(&source) {
                let request = ModuleRequest::new(specifier.clone(), from_dir.clone());
                match self.resolver.resolve(&request).await {
                    Ok(dep) => {
                        dependencies.push(Dependency {
                            specifier,
                            target: dep.path.clone(),
                        });
                        if queued.insert(dep.path.clone()) {
                            queue.push_back(dep);
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }

            tracing::debug!(
                module = %source.path.display(),
                dependencies = dependencies.len(),
                "discovered module"
            );
            modules.insert(
                source.path.clone(),
                GraphModule {
                    source,
                    dependencies,
                },
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let import_order = dependency_first(&modules, &entry_points);
        Ok(ModuleGraph {
            root: self.root.clone(),
            modules,
            entries: entry_points,
            import_order,
        })
    }
}

/// Post-order walk from each entry. Cycles are cut at the first revisit.
fn dependency_first(modules: &BTreeMap<PathBuf, GraphModule>, entries: &[EntryPoint]) -> Vec<PathBuf> {
    let mut order = Vec::with_capacity(modules.len());
    let mut seen: BTreeSet<&Path> = BTreeSet::new();

    for entry in entries {
        if !seen.insert(entry.path.as_path()) {
            continue;
        }
        let mut stack: Vec<(&Path, usize)> = vec![(entry.path.as_path(), 0)];
        while let Some(&(path, next)) = stack.last() {
            let dependencies = modules
                .get(path)
                .map(|module| module.dependencies.as_slice())
                .unwrap_or_default();
            match dependencies.get(next) {
                Some(dep) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    if seen.insert(dep.target.as_path()) {
                        stack.push((dep.target.as_path(), 0));
                    }
                }
                None => {
                    order.push(path.to_path_buf());
                    stack.pop();
                }
            }
        }
    }
    order
}

fn entry_specifier(specifier: &str) -> String {
    if specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
    {
        specifier.to_string()
    } else {
        format!("./{specifier}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;
    use std::sync::Arc;

    fn builder(runtime: MemoryRuntime) -> GraphBuilder {
        let resolver = Resolver::new(Arc::new(runtime), vec!["ts".into(), "js".into()]);
        GraphBuilder::new(resolver, "/p")
    }

    fn entries(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn discovers_scripts_styles_and_assets() {
        let runtime = MemoryRuntime::new()
            .with_file("/p/src/index.ts", "import './style.css';\nimport { add } from './math';")
            .with_file("/p/src/math.ts", "export const add = (a, b) => a + b;")
            .with_file("/p/src/style.css", "body { background: url(bg.png); }")
            .with_file("/p/src/bg.png", [1u8, 2, 3]);

        let graph = builder(runtime)
            .build(&entries(&[("app", "src/index")]))
            .await
            .unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.entries()[0].path, PathBuf::from("/p/src/index.ts"));
        let css = graph.get(Path::new("/p/src/style.css")).unwrap();
        assert_eq!(css.target_of("./bg.png"), Some(Path::new("/p/src/bg.png")));
        assert_eq!(graph.reachable_from(Path::new("/p/src/index.ts")).len(), 4);
    }

    #[tokio::test]
    async fn collects_every_resolution_error() {
        let runtime = MemoryRuntime::new()
            .with_file("/p/src/index.ts", "import './a';\nimport './b';");

        let errors = builder(runtime)
            .build(&entries(&[("app", "src/index"), ("admin", "src/admin")]))
            .await
            .unwrap_err();

        let specs: Vec<_> = errors.iter().map(|e| e.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./src/admin", "./a", "./b"]);
    }

    #[tokio::test]
    async fn import_order_puts_dependencies_first() {
        let runtime = MemoryRuntime::new()
            .with_file("/p/src/index.ts", "import './z.css';\nimport './a.css';\nimport './b';")
            .with_file("/p/src/z.css", "@import './vars.css';\n.z {}")
            .with_file("/p/src/vars.css", ":root {}")
            .with_file("/p/src/a.css", ".a {}")
            .with_file("/p/src/b.ts", "import './a.css';");

        let graph = builder(runtime)
            .build(&entries(&[("app", "src/index")]))
            .await
            .unwrap();

        let order: Vec<_> = graph
            .import_order()
            .iter()
            .map(|p| p.strip_prefix("/p/src").unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, vec!["vars.css", "z.css", "a.css", "b.ts", "index.ts"]);
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let runtime = MemoryRuntime::new()
            .with_file("/p/src/a.ts", "import './b';")
            .with_file("/p/src/b.ts", "import './a';");

        let graph = builder(runtime)
            .build(&entries(&[("app", "src/a")]))
            .await
            .unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.import_order(),
            &[PathBuf::from("/p/src/b.ts"), PathBuf::from("/p/src/a.ts")]
        );
    }
}
