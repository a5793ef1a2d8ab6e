//! Chunk rendering and linking.
//!
//! Every chunk registers itself on a global queue:
//!
//! ```text
//! (self.cachetChunks = self.cachetChunks || []).push([["app"], {
//! "1f2e3d4c": function (module, exports, require) { ... },
//! }, ["1f2e3d4c"]]);
//! ```
//!
//! The runtime glue drains the queue, keeps the module factories and runs
//! each chunk's entry modules. Linking lowers `import`/`export` statements
//! to `require` (see [`crate::lower`]) and rewrites the dependency
//! specifiers found during discovery to module ids.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chunk::{Chunk, ChunkKind};
use crate::graph::ModuleGraph;
use crate::lower;
use crate::module::{ModuleOutput, TransformedModule};
use crate::module_id::ModuleIds;
use crate::scan;
use crate::transform::stages::json_string;

/// Global the chunks push themselves onto
pub const CHUNK_QUEUE: &str = "cachetChunks";

const RUNTIME_GLUE: &str = r#"(function () {
  var queue = (self.cachetChunks = self.cachetChunks || []);
  if (queue.cachetReady) return;
  queue.cachetReady = true;
  var factories = {};
  var cache = {};
  function require(id) {
    if (cache[id]) return cache[id].exports;
    if (!factories[id]) throw new Error("cachet: unknown module " + id);
    var module = (cache[id] = { exports: {} });
    factories[id].call(module.exports, module, module.exports, require);
    return module.exports;
  }
  function register(chunk) {
    var modules = chunk[1];
    for (var id in modules) {
      if (Object.prototype.hasOwnProperty.call(modules, id)) factories[id] = modules[id];
    }
    for (var i = 0; i < chunk[2].length; i++) require(chunk[2][i]);
  }
  var pending = queue.slice();
  queue.push = function (chunk) {
    register(chunk);
    return Array.prototype.push.call(queue, chunk);
  };
  for (var i = 0; i < pending.length; i++) register(pending[i]);
})();
"#;

/// Bootstrap code, identical for every build.
pub fn runtime_glue() -> &'static str {
    RUNTIME_GLUE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChunk {
    pub name: String,
    pub kind: ChunkKind,
    pub script: String,
    /// Extracted stylesheets of the chunk's modules, dependencies first
    pub style: Option<String>,
}

/// Everything linking needs to look up.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub graph: &'a ModuleGraph,
    pub ids: &'a ModuleIds,
    pub modules: &'a BTreeMap<PathBuf, TransformedModule>,
    pub public_path: &'a str,
}

impl LinkContext<'_> {
    fn id_of(&self, importer: &Path, specifier: &str) -> Option<String> {
        let target = self.graph.get(importer)?.target_of(specifier)?;
        self.ids.get(target).map(|id| id.as_str().to_string())
    }

    /// URL of an asset module, `None` for non-assets.
    fn asset_url(&self, importer: &Path, specifier: &str) -> Option<String> {
        let target = self.graph.get(importer)?.target_of(specifier)?;
        match &self.modules.get(target)?.output {
            ModuleOutput::InlineAsset { data_uri } => Some(data_uri.clone()),
            ModuleOutput::FileAsset { path, .. } => Some(public_url(self.public_path, path)),
            _ => None,
        }
    }
}

/// `public_path` joined with an output-relative path.
pub fn public_url(public_path: &str, path: &str) -> String {
    if public_path.is_empty() || public_path.ends_with('/') {
        format!("{public_path}{path}")
    } else {
        format!("{public_path}/{path}")
    }
}

/// Render one chunk. `with_runtime` prepends the glue (no isolated runtime chunk).
pub fn render_chunk(chunk: &Chunk, ctx: LinkContext<'_>, with_runtime: bool) -> RenderedChunk {
    if chunk.kind == ChunkKind::Runtime {
        return RenderedChunk {
            name: chunk.name.clone(),
            kind: chunk.kind,
            script: RUNTIME_GLUE.to_string(),
            style: None,
        };
    }

    let mut script = String::new();
    if with_runtime {
        script.push_str(RUNTIME_GLUE);
    }
    script.push_str(&format!(
        "(self.{CHUNK_QUEUE} = self.{CHUNK_QUEUE} || []).push([[{}], {{\n",
        json_string(&chunk.name)
    ));

    let mut styles: BTreeMap<&Path, String> = BTreeMap::new();
    for path in &chunk.modules {
        let Some(module) = ctx.modules.get(path) else {
            continue;
        };
        let Some(id) = ctx.ids.get(path) else {
            continue;
        };

        let body = match &module.output {
            ModuleOutput::Script(code) => {
                let code = lower::lower_esm(code);
                scan::rewrite_script_specifiers(&code, |spec| ctx.id_of(path, spec))
            }
            ModuleOutput::Stylesheet(css) => {
                styles.insert(path.as_path(), link_stylesheet(css, path, ctx));
                String::new()
            }
            ModuleOutput::InlineAsset { data_uri } => {
                format!("module.exports = {};", json_string(data_uri))
            }
            ModuleOutput::FileAsset { path: file, .. } => format!(
                "module.exports = {};",
                json_string(&public_url(ctx.public_path, file))
            ),
        };

        script.push_str(&format!(
            "{}: function (module, exports, require) {{\n{}\n}},\n",
            json_string(id.as_str()),
            body.trim_end()
        ));
    }

    let entries: Vec<String> = chunk
        .entry_modules
        .iter()
        .filter_map(|path| ctx.ids.get(path))
        .map(|id| json_string(id.as_str()))
        .collect();
    script.push_str(&format!("}}, [{}]]);\n", entries.join(", ")));

    // the factory table is keyed by id; the cascade needs import order
    let mut ordered = Vec::with_capacity(styles.len());
    for path in ctx.graph.import_order() {
        if let Some(css) = styles.remove(path.as_path()) {
            ordered.push(css);
        }
    }
    ordered.extend(styles.into_values());

    RenderedChunk {
        name: chunk.name.clone(),
        kind: chunk.kind,
        script,
        style: (!ordered.is_empty()).then(|| ordered.join("\n")),
    }
}

/// Bundled `@import`s are dropped (their content is extracted separately) and
/// `url()` references point at the emitted assets.
fn link_stylesheet(css: &str, path: &Path, ctx: LinkContext<'_>) -> String {
    let css = scan::strip_style_imports(css, |spec| {
        ctx.graph
            .get(path)
            .and_then(|module| module.target_of(spec))
            .is_some()
    });
    scan::rewrite_style_urls(&css, |spec| ctx.asset_url(path, spec))
}
