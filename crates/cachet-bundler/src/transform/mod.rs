//! Per-module transform chains.
//!
//! A chain is an ordered list of stages; each stage consumes the previous
//! stage's [`Payload`]. A failing stage aborts only its own module: the
//! pipeline keeps transforming siblings and reports every failure together.

mod cache;
pub mod stages;
mod transpiler;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use cachet_config::{BuildMode, StageConfig};
use indexmap::IndexMap;

pub use cache::ModuleCache;
pub use transpiler::{PassThrough, Transpiler};

use crate::module::{ModuleCategory, ModuleOutput, SourceModule, TransformedModule};
use crate::naming::{NameParts, NamingMode, fingerprint, render_template};
use crate::rules::ChainId;
use crate::Result;

/// Intermediate value flowing through a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary(Arc<[u8]>),
    Script(String),
    Style(String),
    Stylesheet(String),
    InlineAsset(String),
    FileAsset { path: String, bytes: Arc<[u8]> },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Binary(_) => "binary",
            Payload::Script(_) => "script",
            Payload::Style(_) => "style",
            Payload::Stylesheet(_) => "stylesheet",
            Payload::InlineAsset(_) => "inline-asset",
            Payload::FileAsset { .. } => "file-asset",
        }
    }

    pub fn into_text(self) -> std::result::Result<String, String> {
        match self {
            Payload::Binary(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|e| format!("source is not valid UTF-8: {e}")),
            Payload::Script(text) | Payload::Style(text) | Payload::Stylesheet(text) => Ok(text),
            other => Err(format!("expected text, got {}", other.kind())),
        }
    }

    pub fn into_bytes(self) -> std::result::Result<Arc<[u8]>, String> {
        match self {
            Payload::Binary(bytes) => Ok(bytes),
            Payload::Script(text) | Payload::Style(text) | Payload::Stylesheet(text) => {
                Ok(Arc::from(text.into_bytes()))
            }
            other => Err(format!("expected raw content, got {}", other.kind())),
        }
    }
}

/// Values every stage may read.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub mode: BuildMode,
    /// `size < inline_threshold` inlines
    pub inline_threshold: u64,
    pub media_template: String,
}

pub trait Transform: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        ctx: &TransformContext,
    ) -> std::result::Result<Payload, String>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage '{stage}' failed for {}: {cause}", module.display())]
pub struct TransformError {
    pub module: PathBuf,
    pub stage: String,
    pub cause: String,
}

/// Separate media file named by the media template.
pub(crate) fn file_asset(module: &SourceModule, bytes: Arc<[u8]>, ctx: &TransformContext) -> Payload {
    let hash = fingerprint(&bytes);
    let path = render_template(
        &ctx.media_template,
        NameParts {
            name: module.file_stem(),
            ext: module.extension(),
            hash: &hash,
        },
        NamingMode::ContentHash,
    );
    Payload::FileAsset { path, bytes }
}

/// Resolved chains, ready to run.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    chains: IndexMap<ChainId, Vec<Arc<dyn Transform>>>,
    ctx: TransformContext,
}

impl TransformPipeline {
    pub fn new(
        chains: &IndexMap<ChainId, Vec<StageConfig>>,
        transpiler: Arc<dyn Transpiler>,
        ctx: TransformContext,
    ) -> Result<Self> {
        let mut built = IndexMap::with_capacity(chains.len());
        for (id, stage_configs) in chains {
            let chain = stage_configs
                .iter()
                .map(|config| stages::from_config(config, &transpiler))
                .collect::<Result<Vec<_>>>()?;
            built.insert(id.clone(), chain);
        }
        Ok(Self { chains: built, ctx })
    }

    pub fn context(&self) -> &TransformContext {
        &self.ctx
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Run `chains` over `module`, in order.
    pub fn apply(
        &self,
        module: &SourceModule,
        chains: &[ChainId],
    ) -> std::result::Result<TransformedModule, TransformError> {
        let mut payload = Payload::Binary(Arc::clone(&module.content));

        for chain_id in chains {
            let stages = self.chains.get(chain_id).ok_or_else(|| TransformError {
                module: module.path.clone(),
                stage: chain_id.clone(),
                cause: "unknown chain".to_string(),
            })?;

            for stage in stages {
                payload = stage
                    .apply(module, payload, &self.ctx)
                    .map_err(|cause| TransformError {
                        module: module.path.clone(),
                        stage: stage.id().to_string(),
                        cause,
                    })?;
            }
        }

        let output = self.finish(module, payload)?;
        tracing::trace!(
            module = %module.path.display(),
            output = output.kind(),
            "transformed"
        );
        Ok(TransformedModule {
            source: module.clone(),
            output,
        })
    }

    /// Convert the last payload into the module's output.
    ///
    /// Untouched content passes through: scripts stay scripts, JSON becomes a
    /// module exporting the parsed value, everything else is a hashed file.
    fn finish(
        &self,
        module: &SourceModule,
        payload: Payload,
    ) -> std::result::Result<ModuleOutput, TransformError> {
        let fail = |cause: String| TransformError {
            module: module.path.clone(),
            stage: "passthrough".to_string(),
            cause,
        };

        Ok(match payload {
            Payload::Script(code) => ModuleOutput::Script(code),
            Payload::Style(css) | Payload::Stylesheet(css) => ModuleOutput::Stylesheet(css),
            Payload::InlineAsset(data_uri) => ModuleOutput::InlineAsset { data_uri },
            Payload::FileAsset { path, bytes } => ModuleOutput::FileAsset { path, bytes },
            Payload::Binary(bytes) => match module.category {
                ModuleCategory::Script => {
                    ModuleOutput::Script(Payload::Binary(bytes).into_text().map_err(fail)?)
                }
                ModuleCategory::Style => {
                    ModuleOutput::Stylesheet(Payload::Binary(bytes).into_text().map_err(fail)?)
                }
                ModuleCategory::Json => {
                    let value: serde_json::Value = serde_json::from_slice(&bytes)
                        .map_err(|e| fail(format!("invalid JSON: {e}")))?;
                    ModuleOutput::Script(format!("module.exports = {value};"))
                }
                _ => match file_asset(module, bytes, &self.ctx) {
                    Payload::FileAsset { path, bytes } => ModuleOutput::FileAsset { path, bytes },
                    other => return Err(fail(format!("unexpected {} payload", other.kind()))),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(mode: BuildMode) -> TransformPipeline {
        let mut chains = IndexMap::new();
        for id in ["script", "style", "media", "file"] {
            chains.insert(id.to_string(), stages::builtin_chain(id, mode).unwrap());
        }
        chains.insert(
            "banner".to_string(),
            vec![StageConfig::Replace {
                pattern: "^".to_string(),
                replacement: "/* banner */".to_string(),
            }],
        );
        TransformPipeline::new(
            &chains,
            Arc::new(PassThrough),
            TransformContext {
                mode,
                inline_threshold: 16,
                media_template: "assets/media/[name].[hash:8].[ext]".to_string(),
            },
        )
        .unwrap()
    }

    #[derive(Debug)]
    struct Failing;

    impl Transpiler for Failing {
        fn transpile(
            &self,
            path: &std::path::Path,
            _source: &str,
            _mode: BuildMode,
        ) -> std::result::Result<String, String> {
            if path.ends_with("bad.ts") {
                Err("unexpected token".to_string())
            } else {
                Ok("ok".to_string())
            }
        }
    }

    #[test]
    fn chains_apply_in_order() {
        let module = SourceModule::new("/p/src/a.js", b"x = 1".to_vec());
        let out = pipeline(BuildMode::Release)
            .apply(&module, &["script".to_string(), "banner".to_string()])
            .unwrap();
        assert_eq!(out.output, ModuleOutput::Script("/* banner */x = 1".to_string()));
    }

    #[test]
    fn style_chain_follows_mode() {
        let module = SourceModule::new("/p/src/a.css", b"a{}".to_vec());
        let release = pipeline(BuildMode::Release)
            .apply(&module, &["style".to_string()])
            .unwrap();
        assert!(matches!(release.output, ModuleOutput::Stylesheet(_)));

        let dev = pipeline(BuildMode::Development)
            .apply(&module, &["style".to_string()])
            .unwrap();
        assert!(matches!(dev.output, ModuleOutput::Script(_)));
    }

    #[test]
    fn passthrough_handles_each_category() {
        let p = pipeline(BuildMode::Release);
        let json = SourceModule::new("/p/data.json", br#"{"a": 1}"#.to_vec());
        assert_eq!(
            p.apply(&json, &[]).unwrap().output,
            ModuleOutput::Script("module.exports = {\"a\":1};".to_string())
        );

        let font = SourceModule::new("/p/f.woff", vec![0u8; 4]);
        assert!(matches!(
            p.apply(&font, &[]).unwrap().output,
            ModuleOutput::FileAsset { .. }
        ));
    }

    #[test]
    fn failures_are_isolated_per_module() {
        let mut chains = IndexMap::new();
        chains.insert("script".to_string(), vec![StageConfig::Transpile]);
        let p = TransformPipeline::new(
            &chains,
            Arc::new(Failing),
            pipeline(BuildMode::Release).context().clone(),
        )
        .unwrap();

        let good = SourceModule::new("/p/good.ts", b"1".to_vec());
        let bad = SourceModule::new("/p/bad.ts", b"1".to_vec());
        let bad2 = SourceModule::new("/p/x/bad.ts", b"1".to_vec());
        let script = vec!["script".to_string()];

        let results: Vec<_> = [&bad, &good, &bad2]
            .into_iter()
            .map(|module| p.apply(module, &script))
            .collect();
        assert!(results[1].is_ok());
        let failed: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].stage, "transpile");
        assert_eq!(failed[0].cause, "unexpected token");
        assert_eq!(failed[1].module, PathBuf::from("/p/x/bad.ts"));
    }

    #[test]
    fn unknown_chain_is_reported() {
        let module = SourceModule::new("/p/a.js", b"1".to_vec());
        let err = pipeline(BuildMode::Release)
            .apply(&module, &["nope".to_string()])
            .unwrap_err();
        assert_eq!(err.stage, "nope");
    }
}
