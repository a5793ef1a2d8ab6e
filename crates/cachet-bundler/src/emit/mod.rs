//! Output assembly: names, manifest and HTML shell.
//!
//! [`assemble`] is pure; it turns rendered chunks and transformed media into
//! named [`OutputAsset`]s. Writing happens separately in [`writer`].

pub mod html;
pub mod manifest;
pub mod writer;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use cachet_config::{FilenameTemplates, HtmlOptions};
use serde::Serialize;

pub use html::HtmlAssets;
pub use manifest::Manifest;
pub use writer::{WriteSummary, write_outputs};

use crate::Result;
use crate::chunk::{ChunkKind, ChunkSet};
use crate::module::{ModuleOutput, TransformedModule};
use crate::naming::{NameParts, NamingMode, fingerprint, render_template};
use crate::render::{RenderedChunk, public_url};

/// One emitted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputAsset {
    /// Manifest key, e.g. `app.js`
    pub logical_name: String,
    /// Relative to the output directory
    pub path: String,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    pub fingerprint: String,
}

impl OutputAsset {
    pub fn new(logical_name: impl Into<String>, path: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        let fingerprint = fingerprint(&bytes);
        Self {
            logical_name: logical_name.into(),
            path: path.into(),
            bytes,
            fingerprint,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub templates: FilenameTemplates,
    pub naming: NamingMode,
    pub public_path: String,
    pub inline_threshold: u64,
    pub inline_runtime: bool,
    pub html: HtmlOptions,
}

/// Everything a pass writes, minus the manifest file itself.
#[derive(Debug, Clone, Default)]
pub struct EmitPlan {
    pub assets: Vec<OutputAsset>,
    pub manifest: Manifest,
    /// Set when the runtime chunk went into the HTML instead of a file
    pub inlined_runtime: bool,
}

impl EmitPlan {
    pub fn asset(&self, logical_name: &str) -> Option<&OutputAsset> {
        self.assets.iter().find(|a| a.logical_name == logical_name)
    }
}

/// Name every output and build the manifest and HTML document.
///
/// `template` is the HTML template source, read by the caller.
pub fn assemble(
    chunks: &ChunkSet,
    rendered: &[RenderedChunk],
    modules: &BTreeMap<PathBuf, TransformedModule>,
    template: Option<&str>,
    options: &EmitOptions,
) -> Result<EmitPlan> {
    let mut plan = EmitPlan::default();
    let mut scripts: BTreeMap<&str, String> = BTreeMap::new();
    let mut styles: BTreeMap<&str, String> = BTreeMap::new();
    let mut inline_runtime = None;

    for chunk in rendered {
        let script = chunk.script.as_bytes();
        if chunk.kind == ChunkKind::Runtime
            && options.inline_runtime
            && options.html.enabled
            && (script.len() as u64) < options.inline_threshold
        {
            inline_runtime = Some(chunk.script.clone());
            plan.inlined_runtime = true;
        } else {
            let asset = named_asset(&chunk.name, "js", &options.templates.script, script, options.naming);
            scripts.insert(&chunk.name, public_url(&options.public_path, &asset.path));
            plan.assets.push(asset);
        }

        if let Some(style) = &chunk.style {
            let asset = named_asset(&chunk.name, "css", &options.templates.style, style.as_bytes(), options.naming);
            styles.insert(&chunk.name, public_url(&options.public_path, &asset.path));
            plan.assets.push(asset);
        }
    }

    let mut media_paths = Vec::new();
    for module in modules.values() {
        let ModuleOutput::FileAsset { path, bytes } = &module.output else {
            continue;
        };
        if media_paths.contains(path) {
            continue;
        }
        media_paths.push(path.clone());

        let logical = render_template(
            &options.templates.media,
            NameParts {
                name: module.source.file_stem(),
                ext: module.source.extension(),
                hash: "",
            },
            NamingMode::Stable,
        );
        if plan.asset(&logical).is_some() {
            tracing::debug!(logical = %logical, path = %path, "media logical name already taken");
        }
        plan.assets
            .push(OutputAsset::new(logical, path.clone(), Arc::clone(bytes)));
    }

    if options.html.enabled {
        let mut tags = HtmlAssets {
            inline_runtime,
            ..Default::default()
        };
        for entry in &chunks.plans {
            for name in &entry.chunks {
                if let Some(url) = styles.get(name.as_str()) {
                    tags.push_style(url.clone());
                }
                if let Some(url) = scripts.get(name.as_str()) {
                    tags.push_script(url.clone());
                }
            }
        }
        let document = html::render_document(&options.html, template, &options.public_path, &tags)?;
        plan.assets.push(OutputAsset::new(
            options.html.filename.clone(),
            options.html.filename.clone(),
            Arc::from(document.into_bytes()),
        ));
    }

    for asset in &plan.assets {
        if !plan.manifest.contains(&asset.logical_name) {
            plan.manifest.insert(
                asset.logical_name.clone(),
                public_url(&options.public_path, &asset.path),
            );
        }
    }

    Ok(plan)
}

fn named_asset(name: &str, ext: &str, template: &str, bytes: &[u8], naming: NamingMode) -> OutputAsset {
    let hash = fingerprint(bytes);
    let path = render_template(template, NameParts { name, ext, hash: &hash }, naming);
    OutputAsset {
        logical_name: format!("{name}.{ext}"),
        path,
        bytes: Arc::from(bytes),
        fingerprint: hash,
    }
}
