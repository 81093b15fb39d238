//! Pipeline orchestrator
//!
//! Runs the enabled stages in phase order over one [`Project`]. Per-file work
//! runs on a dedicated rayon pool; project-wide discovery is a barrier between
//! stages. Cancellation is checked between stages only.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::comments::annotate_file;
use crate::config::PipelineConfig;
use crate::control_flow::{restructure_functions, transform_guards, transform_loops};
use crate::enrich::{enrich_rename_map, Enricher};
use crate::error::{Error, Result};
use crate::noise::{self, NoiseShape};
use crate::path_utils::file_name;
use crate::preprocess::{overridden_class_funcs, preprocess};
use crate::project::{FileClass, Project, ProjectStore};
use crate::rename::discover::{collect_identifiers, IdentifierKind};
use crate::rename::names::derive_seed;
use crate::rename::{
    apply, apply_file_renames, apply_image_renames, build_rename_map, declared_types,
    rename_functions, rename_variables, ExclusionSet, NameGenerator, NameRole, RenameMap,
};

/// One pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess,
    ConditionTransform,
    LoopTransform,
    FunctionTransform,
    TypeRename,
    FileRename,
    ImageRename,
    VariableRename,
    FunctionRename,
    Noise,
    Comment,
}

/// Coarse ordering of stages; a stage order must never go back a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Preprocess,
    Structural,
    Rename,
    Noise,
    Comment,
}

impl Stage {
    pub const DEFAULT_ORDER: [Stage; 11] = [
        Stage::Preprocess,
        Stage::ConditionTransform,
        Stage::LoopTransform,
        Stage::FunctionTransform,
        Stage::TypeRename,
        Stage::FileRename,
        Stage::ImageRename,
        Stage::VariableRename,
        Stage::FunctionRename,
        Stage::Noise,
        Stage::Comment,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Preprocess => "Preprocessing sources",
            Stage::ConditionTransform => "Transforming conditions",
            Stage::LoopTransform => "Transforming loops",
            Stage::FunctionTransform => "Restructuring functions",
            Stage::TypeRename => "Renaming types",
            Stage::FileRename => "Renaming files",
            Stage::ImageRename => "Renaming images",
            Stage::VariableRename => "Renaming variables",
            Stage::FunctionRename => "Renaming functions",
            Stage::Noise => "Generating noise files",
            Stage::Comment => "Adding comments",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Stage::Preprocess => Phase::Preprocess,
            Stage::ConditionTransform | Stage::LoopTransform | Stage::FunctionTransform => {
                Phase::Structural
            }
            Stage::TypeRename
            | Stage::FileRename
            | Stage::ImageRename
            | Stage::VariableRename
            | Stage::FunctionRename => Phase::Rename,
            Stage::Noise => Phase::Noise,
            Stage::Comment => Phase::Comment,
        }
    }

    fn is_enabled(self, config: &PipelineConfig) -> bool {
        match self {
            Stage::Preprocess => config.preprocess,
            Stage::ConditionTransform => config.condition_transformation,
            Stage::LoopTransform => config.loop_transformation,
            Stage::FunctionTransform => config.function_transformation,
            Stage::TypeRename => config.type_renaming,
            Stage::FileRename => config.file_renaming,
            Stage::ImageRename => config.image_renaming,
            Stage::VariableRename => config.variable_renaming,
            Stage::FunctionRename => config.function_renaming,
            Stage::Noise => config.noise_file_count > 0,
            Stage::Comment => config.comment_adding,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check that `order` has no duplicates and never moves back a phase
pub fn validate_order(order: &[Stage]) -> Result<()> {
    let mut seen = HashSet::new();
    for pair in order.windows(2) {
        if pair[1].phase() < pair[0].phase() {
            return Err(Error::StageOrder(format!(
                "{:?} cannot run after {:?}",
                pair[1], pair[0]
            )));
        }
    }
    for stage in order {
        if !seen.insert(stage) {
            return Err(Error::StageOrder(format!("{:?} listed twice", stage)));
        }
    }
    Ok(())
}

/// Receives stage progress and answers liveness queries
pub trait ProgressSink: Send + Sync {
    fn report(&self, job_id: &str, stage: Stage);

    fn is_alive(&self, _job_id: &str) -> bool {
        true
    }
}

/// Logs progress through `tracing`; never cancels
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, job_id: &str, stage: Stage) {
        tracing::info!(job = job_id, "{}", stage.label());
    }
}

/// Count produced by one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Rewrites, renames, or generated files, depending on the stage
    pub count: usize,
    pub elapsed_ms: u128,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub job_id: String,
    pub seed: u64,
    pub files: usize,
    pub stages: Vec<StageReport>,
    /// Type renames applied, old name to new name
    pub type_renames: BTreeMap<String, String>,
}

impl PipelineReport {
    pub fn count(&self, stage: Stage) -> Option<usize> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.count)
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        project: Project,
        report: PipelineReport,
    },
    /// Liveness was lost before `stage` started; `None` means after the last stage
    Cancelled { stage: Option<Stage> },
}

/// State shared between stages of one run
struct RunContext {
    seed: u64,
    type_map: RenameMap,
}

pub struct Pipeline {
    config: PipelineConfig,
    enricher: Option<Arc<dyn Enricher>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            enricher: None,
            progress: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enabled stages in run order
    pub fn stages(&self) -> Result<Vec<Stage>> {
        let order: Vec<Stage> = match &self.config.stage_order {
            Some(order) => order.clone(),
            None => Stage::DEFAULT_ORDER.to_vec(),
        };
        validate_order(&order)?;
        Ok(order
            .into_iter()
            .filter(|s| s.is_enabled(&self.config))
            .collect())
    }

    fn is_alive(&self, job_id: &str) -> bool {
        self.progress.as_ref().map_or(true, |p| p.is_alive(job_id))
    }

    /// Run every enabled stage over `project`
    pub fn run(&self, mut project: Project, job_id: &str) -> Result<PipelineOutcome> {
        let stages = self.stages()?;
        // loaded projects fail earlier with their directory
        if project.is_empty() {
            return Err(Error::EmptyProject(PathBuf::new()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.unwrap_or(0))
            .build()?;

        let mut ctx = RunContext {
            seed: self.config.seed.unwrap_or_else(rand::random),
            type_map: RenameMap::new(),
        };
        tracing::info!(
            job = job_id,
            "Obfuscating {} files ({} stages, seed {})",
            project.len(),
            stages.len(),
            ctx.seed
        );

        let mut reports = Vec::with_capacity(stages.len());
        for stage in stages {
            if !self.is_alive(job_id) {
                tracing::info!(job = job_id, "Cancelled before {:?}", stage);
                return Ok(PipelineOutcome::Cancelled { stage: Some(stage) });
            }
            if let Some(progress) = &self.progress {
                progress.report(job_id, stage);
            }
            let started = Instant::now();
            let count = pool.install(|| self.run_stage(stage, &mut project, &mut ctx));
            tracing::debug!("{:?}: {} in {:?}", stage, count, started.elapsed());
            reports.push(StageReport {
                stage,
                count,
                elapsed_ms: started.elapsed().as_millis(),
            });
        }
        if !self.is_alive(job_id) {
            return Ok(PipelineOutcome::Cancelled { stage: None });
        }

        let report = PipelineReport {
            job_id: job_id.to_string(),
            seed: ctx.seed,
            files: project.len(),
            stages: reports,
            type_renames: ctx
                .type_map
                .iter()
                .map(|(o, n)| (o.to_string(), n.to_string()))
                .collect(),
        };
        Ok(PipelineOutcome::Completed { project, report })
    }

    /// Load `dir`, run, and write the result back. A cancelled run leaves
    /// the loaded files off disk; the caller owns cleanup of the directory.
    pub fn run_on_directory(&self, dir: &Path, job_id: &str) -> Result<Option<PipelineReport>> {
        let project = ProjectStore::load(dir)?;
        match self.run(project, job_id)? {
            PipelineOutcome::Completed { project, report } => {
                ProjectStore::save(&project, dir)?;
                Ok(Some(report))
            }
            PipelineOutcome::Cancelled { .. } => Ok(None),
        }
    }

    fn run_stage(&self, stage: Stage, project: &mut Project, ctx: &mut RunContext) -> usize {
        match stage {
            Stage::Preprocess => {
                let overridden = overridden_class_funcs(project);
                project.par_rewrite(FileClass::Source, |_, text| preprocess(text, &overridden))
            }
            Stage::ConditionTransform => {
                let comments = self.config.comment_adding;
                let rewrites = AtomicUsize::new(0);
                project.par_rewrite(FileClass::Source, |_, text| {
                    let (out, n) = transform_guards(text, comments);
                    rewrites.fetch_add(n, Ordering::Relaxed);
                    out
                });
                rewrites.into_inner()
            }
            Stage::LoopTransform => {
                let seed = ctx.seed;
                let comments = self.config.comment_adding;
                let vocabulary = project.vocabulary();
                let rewrites = AtomicUsize::new(0);
                project.par_rewrite(FileClass::Source, |path, text| {
                    let mut names = NameGenerator::new(&vocabulary, derive_seed(seed, path));
                    let (out, n) = transform_loops(text, &mut names, comments);
                    rewrites.fetch_add(n, Ordering::Relaxed);
                    out
                });
                rewrites.into_inner()
            }
            Stage::FunctionTransform => {
                let seed = derive_seed(ctx.seed, "functions");
                let vocabulary = project.vocabulary();
                let protected = &self.config.protected_files;
                let rewrites = AtomicUsize::new(0);
                project.par_rewrite(FileClass::Source, |path, text| {
                    if protected.iter().any(|p| p == file_name(path)) {
                        return text.to_string();
                    }
                    let mut names = NameGenerator::new(&vocabulary, derive_seed(seed, path));
                    let (out, n) = restructure_functions(text, &mut names);
                    rewrites.fetch_add(n, Ordering::Relaxed);
                    out
                });
                rewrites.into_inner()
            }
            Stage::TypeRename => self.rename_types(project, ctx),
            Stage::FileRename => self.rename_files(project, ctx),
            Stage::ImageRename => {
                let exclusions = ExclusionSet::from_project(project);
                let options = self.config.discovery_options();
                let ids = collect_identifiers(project, &[IdentifierKind::Image], &exclusions, &options);
                let vocabulary = project.vocabulary();
                let mut names = NameGenerator::new(&vocabulary, derive_seed(ctx.seed, "images"));
                let map = build_rename_map(&ids, NameRole::Image, &mut names);
                apply_image_renames(project, &map);
                map.len()
            }
            Stage::VariableRename => {
                let seed = ctx.seed;
                let vocabulary = project.vocabulary();
                let protected = &self.config.protected_files;
                let renamed = AtomicUsize::new(0);
                project.par_rewrite(FileClass::Source, |path, text| {
                    if protected.iter().any(|p| p == file_name(path)) {
                        return text.to_string();
                    }
                    let mut names = NameGenerator::new(&vocabulary, derive_seed(seed, path));
                    let (out, n) = rename_variables(text, &mut names);
                    renamed.fetch_add(n, Ordering::Relaxed);
                    out
                });
                renamed.into_inner()
            }
            Stage::FunctionRename => {
                let exclusions = ExclusionSet::from_project(project);
                let vocabulary = project.vocabulary();
                rename_functions(project, &exclusions, &vocabulary, ctx.seed)
            }
            Stage::Noise => {
                let vocabulary = project.vocabulary();
                let mut names = NameGenerator::new(&vocabulary, derive_seed(ctx.seed, "noise"));
                noise::generate(
                    project,
                    self.config.noise_file_count,
                    &mut names,
                    NoiseShape::default(),
                )
            }
            Stage::Comment => {
                let seed = ctx.seed;
                let enricher = self.enricher.as_deref();
                let settings = &self.config.enrichment;
                project.par_rewrite(FileClass::Source, |path, text| {
                    let mut rng = StdRng::seed_from_u64(derive_seed(seed, path));
                    annotate_file(
                        text,
                        enricher,
                        settings.comment_temperature,
                        settings.comment_max_tries,
                        &mut rng,
                    )
                })
            }
        }
    }

    fn rename_types(&self, project: &mut Project, ctx: &mut RunContext) -> usize {
        let exclusions = ExclusionSet::from_project(project);
        let options = self.config.discovery_options();
        let ids = collect_identifiers(project, &[IdentifierKind::Type], &exclusions, &options);
        let vocabulary = project.vocabulary();
        let mut names = NameGenerator::new(&vocabulary, derive_seed(ctx.seed, "types"));
        let mut map = build_rename_map(&ids, NameRole::Type, &mut names);
        if let Some(enricher) = &self.enricher {
            let settings = &self.config.enrichment;
            map = enrich_rename_map(
                &map,
                enricher.as_ref(),
                settings.rename_temperature,
                settings.rename_max_tries,
                &mut names,
            );
        }
        let changed = apply(project, &map, false);
        tracing::info!("Renamed {} types across {} files", map.len(), changed);
        let renamed = map.len();
        ctx.type_map = map;
        renamed
    }

    fn rename_files(&self, project: &mut Project, ctx: &RunContext) -> usize {
        let exclusions = ExclusionSet::from_project(project);
        let options = self.config.discovery_options();
        let ids = collect_identifiers(project, &[IdentifierKind::File], &exclusions, &options);

        // a nib named after a class is found through the class name
        let declared = declared_types(project);
        let vocabulary = project.vocabulary();
        let mut names = NameGenerator::new(&vocabulary, derive_seed(ctx.seed, "files"));
        let mut map = RenameMap::new();
        for id in &ids {
            let new = match ctx.type_map.get(&id.name) {
                Some(new) => Some(new.to_string()),
                None if declared.contains(id.name.as_str()) => {
                    tracing::debug!("Keeping file {}: type of that name is not renamed", id.name);
                    None
                }
                None => names.fresh(NameRole::Type, Some(&id.name)),
            };
            if let Some(new) = new {
                map.insert(id.name.clone(), new);
            }
        }
        apply_file_renames(project, &map);
        map.len()
    }
}
