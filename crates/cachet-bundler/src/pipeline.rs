//! The build pass.
//!
//! A pass runs its stages strictly in [`BuildPlan::stages`] order. Every
//! stage returns new data; the only state kept between passes is the
//! transform cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cachet_config::{BuildConfig, BuildMode, StageConfig};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::Instrument;

use crate::checker::{IncrementalChecker, SourceSet};
use crate::chunk::{self, ChunkKind, ChunkSet};
use crate::diagnostics::BuildFailure;
use crate::emit::{self, EmitOptions, EmitPlan, Manifest, OutputAsset};
use crate::graph::{GraphBuilder, ModuleGraph};
use crate::module::TransformedModule;
use crate::module_id::{ModuleIdStrategy, ModuleIds};
use crate::naming::NamingMode;
use crate::render::{self, LinkContext};
use crate::resolver::Resolver;
use crate::rules::{ChainId, RuleSet};
use crate::runtime::{NativeRuntime, Runtime};
use crate::transform::{
    ModuleCache, PassThrough, TransformContext, TransformPipeline, Transpiler, stages,
};
use crate::watch::{PassRequest, PassRunner, PipelineState};
use crate::{Error, Result};

/// Pass stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Transform,
    Group,
    Emit,
}

impl Stage {
    pub fn state(self) -> PipelineState {
        match self {
            Stage::Resolve => PipelineState::Resolving,
            Stage::Transform => PipelineState::Transforming,
            Stage::Group => PipelineState::Grouping,
            Stage::Emit => PipelineState::Emitting,
        }
    }
}

/// Everything that differs between development and release builds.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    pub mode: BuildMode,
    pub module_ids: ModuleIdStrategy,
    pub naming: NamingMode,
    pub chains: IndexMap<ChainId, Vec<StageConfig>>,
    pub inline_runtime: bool,
    pub prune_stale: bool,
    pub stages: Vec<Stage>,
}

impl BuildPlan {
    pub fn for_mode(mode: BuildMode) -> Self {
        let chains = cachet_config::BUILTIN_CHAINS
            .iter()
            .filter_map(|id| Some((id.to_string(), stages::builtin_chain(id, mode)?)))
            .collect();

        match mode {
            BuildMode::Release => Self {
                mode,
                module_ids: ModuleIdStrategy::Hashed,
                naming: NamingMode::ContentHash,
                chains,
                inline_runtime: true,
                prune_stale: true,
                stages: vec![Stage::Resolve, Stage::Transform, Stage::Group, Stage::Emit],
            },
            BuildMode::Development => Self {
                mode,
                module_ids: ModuleIdStrategy::Named,
                naming: NamingMode::Stable,
                chains,
                inline_runtime: false,
                prune_stale: false,
                stages: vec![Stage::Resolve, Stage::Transform, Stage::Group, Stage::Emit],
            },
        }
    }

    /// The mode's plan with the user's chains and output switches applied.
    pub fn for_config(config: &BuildConfig) -> Self {
        let mut plan = Self::for_mode(config.mode);
        for (id, stages) in &config.chains {
            plan.chains.insert(id.clone(), stages.clone());
        }
        plan.inline_runtime = config.inline_runtime();
        plan.prune_stale = plan.prune_stale && config.clean_stale;
        plan
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub name: String,
    pub kind: ChunkKind,
    pub modules: usize,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub assets: Vec<OutputAsset>,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub chunks: Vec<ChunkSummary>,
    pub modules: usize,
    pub cache_hits: usize,
    pub pruned: Vec<PathBuf>,
    /// The runtime chunk went into the HTML shell instead of a file
    pub inlined_runtime: bool,
    pub duration: Duration,
}

impl BuildReport {
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(OutputAsset::size).sum()
    }
}

/// Everything a pass produces before anything touches the disk.
#[derive(Debug, Clone)]
pub struct PlannedBuild {
    pub graph: ModuleGraph,
    pub ids: ModuleIds,
    pub chunks: ChunkSet,
    pub emit: EmitPlan,
    pub cache_hits: usize,
}

/// Resets the shared state to idle when a pass ends, however it ends.
struct StateGuard(Arc<Mutex<PipelineState>>);

impl StateGuard {
    fn enter(&self, stage: Stage) {
        *self.0.lock() = stage.state();
        tracing::debug!(stage = ?stage, "entering stage");
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        *self.0.lock() = PipelineState::Idle;
    }
}

#[derive(Debug)]
pub struct BuildPipeline {
    root: PathBuf,
    config: Arc<BuildConfig>,
    plan: BuildPlan,
    runtime: Arc<dyn Runtime>,
    transpiler: Arc<dyn Transpiler>,
    rules: RuleSet,
    transforms: TransformPipeline,
    cache: ModuleCache,
    state: Arc<Mutex<PipelineState>>,
    last_sources: Option<SourceSet>,
    last_ids: Option<ModuleIds>,
}

impl BuildPipeline {
    /// Validates the configuration and compiles rules and chains.
    pub fn new(root: impl Into<PathBuf>, config: BuildConfig) -> Result<Self> {
        cachet_config::validate_schema(&config)?;

        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        let plan = BuildPlan::for_config(&config);
        let rules = RuleSet::compile(&config.rules, &root)?;
        let transpiler: Arc<dyn Transpiler> = Arc::new(PassThrough);
        let transforms = Self::compile_chains(&config, &plan, &transpiler)?;

        Ok(Self {
            root,
            config: Arc::new(config),
            plan,
            runtime: Arc::new(NativeRuntime),
            transpiler,
            rules,
            transforms,
            cache: ModuleCache::new(),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
            last_sources: None,
            last_ids: None,
        })
    }

    fn compile_chains(
        config: &BuildConfig,
        plan: &BuildPlan,
        transpiler: &Arc<dyn Transpiler>,
    ) -> Result<TransformPipeline> {
        TransformPipeline::new(
            &plan.chains,
            Arc::clone(transpiler),
            TransformContext {
                mode: config.mode,
                inline_threshold: config.inline_threshold_bytes,
                media_template: config.filename_templates().media,
            },
        )
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_transpiler(mut self, transpiler: Arc<dyn Transpiler>) -> Result<Self> {
        self.transforms = Self::compile_chains(&self.config, &self.plan, &transpiler)?;
        self.transpiler = transpiler;
        self.cache.clear();
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Handle for observing the state from another task.
    pub fn state_handle(&self) -> Arc<Mutex<PipelineState>> {
        Arc::clone(&self.state)
    }

    pub fn output_dir(&self) -> PathBuf {
        if self.config.output_dir.is_absolute() {
            self.config.output_dir.clone()
        } else {
            self.root.join(&self.config.output_dir)
        }
    }

    /// Sources of the last pass that got past resolution.
    pub fn last_sources(&self) -> Option<&SourceSet> {
        self.last_sources.as_ref()
    }

    /// Drop cached transforms for changed paths.
    pub fn invalidate<'a>(&self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            if self.cache.invalidate(path) {
                tracing::trace!(path = %path.display(), "invalidated cached transform");
            }
        }
    }

    /// Run every stage except writing.
    pub async fn plan_outputs(&mut self) -> std::result::Result<PlannedBuild, BuildFailure> {
        let guard = StateGuard(Arc::clone(&self.state));
        self.plan_with(&guard).await
    }

    async fn plan_with(&mut self, guard: &StateGuard) -> std::result::Result<PlannedBuild, BuildFailure> {
        guard.enter(Stage::Resolve);
        let resolver = Resolver::from_config(Arc::clone(&self.runtime), &self.config);
        let graph = GraphBuilder::new(resolver, self.root.clone())
            .build(&self.config.entry_points)
            .instrument(tracing::debug_span!("resolve"))
            .await
            .map_err(|errors| {
                BuildFailure::new(errors.into_iter().map(Error::Resolution).collect())
            })?;
        self.last_sources = Some(SourceSet::from_modules(
            self.root.clone(),
            graph.modules().map(|m| &m.source),
        ));
        tracing::debug!(modules = graph.len(), "module graph resolved");

        guard.enter(Stage::Transform);
        let (modules, cache_hits) = self.transform_all(&graph)?;

        guard.enter(Stage::Group);
        let ids = match &self.last_ids {
            Some(previous) => ModuleIds::assign_after(&graph, self.plan.module_ids, previous),
            None => ModuleIds::assign(&graph, self.plan.module_ids),
        };
        self.last_ids = Some(ids.clone());
        let chunks = chunk::group(&graph, &ids, &self.config.splitting)?;

        guard.enter(Stage::Emit);
        let link = LinkContext {
            graph: &graph,
            ids: &ids,
            modules: &modules,
            public_path: &self.config.public_path,
        };
        let inline_glue = !self.config.splitting.runtime_isolation;
        let rendered: Vec<_> = chunks
            .chunks
            .iter()
            .map(|chunk| render::render_chunk(chunk, link, inline_glue && chunk.kind == ChunkKind::Entry))
            .collect();

        let template = self.read_template().await?;
        let emit = emit::assemble(
            &chunks,
            &rendered,
            &modules,
            template.as_deref(),
            &EmitOptions {
                templates: self.config.filename_templates(),
                naming: self.plan.naming,
                public_path: self.config.public_path.clone(),
                inline_threshold: self.config.inline_threshold_bytes,
                inline_runtime: self.plan.inline_runtime,
                html: self.config.html.clone(),
            },
        )?;

        Ok(PlannedBuild {
            graph,
            ids,
            chunks,
            emit,
            cache_hits,
        })
    }

    fn transform_all(
        &self,
        graph: &ModuleGraph,
    ) -> std::result::Result<(BTreeMap<PathBuf, TransformedModule>, usize), BuildFailure> {
        let mut done = BTreeMap::new();
        let mut errors = Vec::new();
        let mut hits = 0;

        for module in graph.modules() {
            let source = &module.source;
            let chains = self.rules.classify(source).chains;
            if let Some(cached) = self.cache.get(source, &chains) {
                hits += 1;
                done.insert(source.path.clone(), cached);
                continue;
            }
            match self.transforms.apply(source, &chains) {
                Ok(transformed) => {
                    self.cache.insert(&chains, transformed.clone());
                    done.insert(source.path.clone(), transformed);
                }
                Err(err) => errors.push(Error::Transform(err)),
            }
        }

        if !errors.is_empty() {
            return Err(BuildFailure::new(errors));
        }
        tracing::debug!(modules = done.len(), cache_hits = hits, "modules transformed");
        Ok((done, hits))
    }

    async fn read_template(&self) -> Result<Option<String>> {
        let template = match &self.config.html.template {
            Some(path) if self.config.html.enabled => self.root.join(path),
            _ => return Ok(None),
        };
        let bytes = self.runtime.read_file(&template).await?;
        String::from_utf8(bytes).map(Some).map_err(|e| {
            Error::Template(format!("{} is not valid UTF-8: {e}", template.display()))
        })
    }

    /// Run a full pass and write the output.
    pub async fn run(&mut self) -> std::result::Result<BuildReport, BuildFailure> {
        let started = Instant::now();
        let guard = StateGuard(Arc::clone(&self.state));
        let planned = self.plan_with(&guard).await?;

        let output_dir = self.output_dir();
        let summary = emit::write_outputs(
            &output_dir,
            &planned.emit.assets,
            &planned.emit.manifest,
            &self.config.manifest_filename,
            &self.config.public_path,
            self.plan.prune_stale,
        )?;
        drop(guard);

        let report = BuildReport {
            mode: self.config.mode,
            chunks: planned
                .chunks
                .chunks
                .iter()
                .map(|chunk| ChunkSummary {
                    name: chunk.name.clone(),
                    kind: chunk.kind,
                    modules: chunk.modules.len(),
                })
                .collect(),
            modules: planned.graph.len(),
            cache_hits: planned.cache_hits,
            assets: planned.emit.assets,
            manifest: planned.emit.manifest,
            manifest_path: output_dir.join(&self.config.manifest_filename),
            pruned: summary.pruned,
            inlined_runtime: planned.emit.inlined_runtime,
            duration: started.elapsed(),
        };
        tracing::info!(
            assets = report.assets.len(),
            modules = report.modules,
            elapsed_ms = report.duration.as_millis() as u64,
            "build finished"
        );
        Ok(report)
    }
}

/// Watch-mode runner: rebuild, then start a checker run on the new sources.
#[derive(Debug)]
pub struct PipelineRunner {
    pipeline: BuildPipeline,
    checker: Option<IncrementalChecker>,
}

impl PipelineRunner {
    pub fn new(pipeline: BuildPipeline, checker: Option<IncrementalChecker>) -> Self {
        Self { pipeline, checker }
    }

    pub fn pipeline(&self) -> &BuildPipeline {
        &self.pipeline
    }
}

#[async_trait]
impl PassRunner for PipelineRunner {
    type Output = std::result::Result<BuildReport, BuildFailure>;

    async fn run_pass(&mut self, request: &PassRequest) -> Self::Output {
        self.pipeline.invalidate(&request.changed);
        let result = self.pipeline.run().await;

        if let (Some(checker), Some(sources)) = (&self.checker, self.pipeline.last_sources()) {
            checker.start(sources.clone());
        }
        result
    }
}
