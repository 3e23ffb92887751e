//! Pipeline controller
//!
//! The run is an explicit state machine:
//!
//! ```text
//! Init -> ParamsSet -> DirsReady -> AssembliesBuilt
//!     -> PolishOnly                                   (polish-only runs)
//!     -> Aligning -> Aligned -> CoverageDone -> BreakpointDone
//!            -> [KmerDone] -> PairwiseDone -> DiscordanceDone
//!            -> [MonomerDone] -> Finished
//! ```
//!
//! Stages run strictly one after another. Any fatal error ends the run at
//! once; skipped stages are recorded as [`SkipReason`]s.

use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::alignment::{Aligner, AlignmentArtifacts};
use crate::assembly::{parse_labels, AssemblyRegistry};
use crate::context::{OutputLayout, PipelineContext, RunFlags};
use crate::error::{PipelineError, PipelineResult};
use crate::manifest::RunManifest;
use crate::params::ParameterAdapter;
use crate::polish::Polisher;
use crate::reads::ReadSource;
use crate::stages::{StageArtifact, StageInputs, StageKind, StageSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    ParamsSet,
    DirsReady,
    AssembliesBuilt,
    PolishOnly,
    Aligning,
    Aligned,
    CoverageDone,
    BreakpointDone,
    KmerDone,
    PairwiseDone,
    DiscordanceDone,
    MonomerDone,
    Finished,
}

/// Why an optional stage did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NucleotideAlignmentDisabled,
    MonomerReferenceMissing,
    MonomerReferenceNotFound,
    UnsupportedPlatform,
}

impl SkipReason {
    /// Deliberate skips are informational; skips forced by the environment warn
    pub fn log_level(&self) -> log::Level {
        match self {
            SkipReason::NucleotideAlignmentDisabled | SkipReason::MonomerReferenceMissing => {
                log::Level::Info
            }
            SkipReason::MonomerReferenceNotFound | SkipReason::UnsupportedPlatform => log::Level::Warn,
        }
    }
}

/// Operating system family, used to gate the Linux-only monomer decomposer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os: String,
}

impl Platform {
    pub fn current() -> Self {
        Self::named(std::env::consts::OS)
    }

    pub fn named<S: Into<String>>(os: S) -> Self {
        Self { os: os.into() }
    }

    pub fn is_linux_family(&self) -> bool {
        matches!(self.os.as_str(), "linux" | "android")
    }
}

/// Decide whether monomer analysis can run
pub fn monomer_gate(monomers: Option<&Path>, platform: &Platform) -> Result<PathBuf, SkipReason> {
    let monomers = monomers.ok_or(SkipReason::MonomerReferenceMissing)?;
    if !platform.is_linux_family() {
        return Err(SkipReason::UnsupportedPlatform);
    }
    if !monomers.exists() {
        return Err(SkipReason::MonomerReferenceNotFound);
    }
    Ok(monomers.to_path_buf())
}

/// Conditions the analysis transitions depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gates {
    pub nucl_alignment: bool,
    pub monomers: Result<PathBuf, SkipReason>,
}

/// A guarded edge of the analysis part of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub stage: Option<StageKind>,
    pub to: PipelineState,
    pub skipped: Option<SkipReason>,
}

impl Transition {
    fn run(stage: StageKind, to: PipelineState) -> Self {
        Self { stage: Some(stage), to, skipped: None }
    }
}

/// Next edge from an analysis state, or `None` outside the analysis phase
pub fn analysis_transition(state: PipelineState, gates: &Gates) -> Option<Transition> {
    use PipelineState::*;

    let transition = match state {
        Aligned => Transition::run(StageKind::Coverage, CoverageDone),
        CoverageDone => Transition::run(StageKind::Breakpoint, BreakpointDone),
        BreakpointDone if gates.nucl_alignment => Transition::run(StageKind::KmerConsistency, KmerDone),
        BreakpointDone => Transition {
            skipped: Some(SkipReason::NucleotideAlignmentDisabled),
            ..Transition::run(StageKind::PairwiseComparison, PairwiseDone)
        },
        KmerDone => Transition::run(StageKind::PairwiseComparison, PairwiseDone),
        PairwiseDone => Transition::run(StageKind::Discordance, DiscordanceDone),
        DiscordanceDone => match &gates.monomers {
            Ok(_) => Transition::run(StageKind::MonomerUnit, MonomerDone),
            Err(reason) => Transition { stage: None, to: Finished, skipped: Some(*reason) },
        },
        MonomerDone => Transition { stage: None, to: Finished, skipped: None },
        _ => return None,
    };
    Some(transition)
}

/// Raw inputs of a run, before any validation
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub assembly_files: Vec<PathBuf>,
    pub labels: Option<String>,
    pub nano_reads: Option<PathBuf>,
    pub pacbio_reads: Option<PathBuf>,
    pub hifi_reads: Option<PathBuf>,
    pub monomers: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub threads: usize,
    pub flags: RunFlags,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub terminal: PipelineState,
    pub trace: Vec<PipelineState>,
    pub stages_run: Vec<StageArtifact>,
    pub skipped: Vec<SkipReason>,
    pub report_dir: PathBuf,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Trace {
    states: Vec<PipelineState>,
}

impl Trace {
    fn enter(&mut self, state: PipelineState) -> PipelineState {
        log::debug!("Pipeline state: {:?}", state);
        self.states.push(state);
        state
    }
}

pub struct PipelineController {
    aligner: Box<dyn Aligner>,
    polisher: Box<dyn Polisher>,
    stages: StageSet,
    platform: Platform,
}

impl PipelineController {
    pub fn new(aligner: Box<dyn Aligner>, polisher: Box<dyn Polisher>, stages: StageSet) -> Self {
        Self {
            aligner,
            polisher,
            stages,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn run(&self, request: &PipelineRequest) -> PipelineResult<PipelineOutcome> {
        let mut trace = Trace::default();
        let ctx = self.prepare(request, &mut trace)?;

        if ctx.flags.only_polish {
            self.polisher.polish(&ctx)?;
            let terminal = trace.enter(PipelineState::PolishOnly);
            log::info!("Polishing finished");
            return Ok(PipelineOutcome {
                terminal,
                trace: trace.states,
                stages_run: Vec::new(),
                skipped: Vec::new(),
                report_dir: ctx.layout.report_dir().to_path_buf(),
                manifest: None,
            });
        }

        trace.enter(PipelineState::Aligning);
        log::info!("Running {}...", self.aligner.name());
        let alignments = self.aligner.align(&ctx)?;
        let state = trace.enter(PipelineState::Aligned);

        self.analyse(&ctx, request.monomers.as_deref(), &alignments, state, trace)
    }

    /// Init -> ParamsSet -> DirsReady -> AssembliesBuilt. Every configuration
    /// check happens before the first directory is created, so the registry
    /// is assembled up front and only published once the layout exists.
    fn prepare(&self, request: &PipelineRequest, trace: &mut Trace) -> PipelineResult<PipelineContext> {
        trace.enter(PipelineState::Init);
        let reads = ReadSource::select(request.nano_reads.clone(), request.pacbio_reads.clone())?;
        let layout = OutputLayout::new(&request.out_dir);
        let assemblies = AssemblyRegistry::build(
            &request.assembly_files,
            request.labels.as_deref().map(parse_labels),
            layout.out_dir(),
        )?;
        let params = ParameterAdapter::adapt(&request.assembly_files, request.threads)?;
        trace.enter(PipelineState::ParamsSet);

        layout.ensure()?;
        trace.enter(PipelineState::DirsReady);
        trace.enter(PipelineState::AssembliesBuilt);

        Ok(PipelineContext {
            layout,
            assemblies,
            params,
            reads,
            hifi_reads: request.hifi_reads.clone(),
            flags: request.flags,
        })
    }

    fn analyse(
        &self,
        ctx: &PipelineContext,
        monomers: Option<&Path>,
        alignments: &AlignmentArtifacts,
        mut state: PipelineState,
        mut trace: Trace,
    ) -> PipelineResult<PipelineOutcome> {
        let gates = Gates {
            nucl_alignment: !ctx.flags.no_nucl_alignment,
            monomers: monomer_gate(monomers, &self.platform),
        };
        let mut stages_run: Vec<StageArtifact> = Vec::new();
        let mut skipped = Vec::new();

        while let Some(transition) = analysis_transition(state, &gates) {
            if let Some(reason) = transition.skipped {
                log_skip(reason, monomers);
                skipped.push(reason);
            }
            if let Some(kind) = transition.stage {
                let artifact = self.run_stage(kind, ctx, alignments, &stages_run, gates.monomers.as_ref().ok())?;
                stages_run.push(artifact);
            }
            state = trace.enter(transition.to);
        }

        let manifest = RunManifest::new(ctx, state, &stages_run, &skipped)
            .write_to(ctx.layout.report_dir())?;

        Ok(PipelineOutcome {
            terminal: state,
            trace: trace.states,
            stages_run,
            skipped,
            report_dir: ctx.layout.report_dir().to_path_buf(),
            manifest: Some(manifest),
        })
    }

    fn run_stage(
        &self,
        kind: StageKind,
        ctx: &PipelineContext,
        alignments: &AlignmentArtifacts,
        prior: &[StageArtifact],
        monomers: Option<&PathBuf>,
    ) -> PipelineResult<StageArtifact> {
        if let Some(dep) = kind.depends_on() {
            if !prior.iter().any(|a| a.kind == dep) {
                return Err(PipelineError::stage_failure(
                    kind.name(),
                    format!("required stage '{}' has not completed", dep),
                ));
            }
        }

        log::info!("Running {} analysis...", kind);
        let inputs = StageInputs {
            alignments,
            prior,
            monomers: monomers.map(|p| p.as_path()),
        };
        let artifact = self.stages.get(kind)?.run(&ctx.assemblies, ctx, &inputs)?;
        if artifact.kind != kind {
            return Err(PipelineError::stage_failure(
                kind.name(),
                format!("implementation reported a '{}' artifact", artifact.kind),
            ));
        }
        Ok(artifact)
    }
}

fn log_skip(reason: SkipReason, monomers: Option<&Path>) {
    let message = match reason {
        SkipReason::NucleotideAlignmentDisabled => {
            "Nucleotide alignment disabled; skipping k-mer analysis".to_string()
        }
        SkipReason::MonomerReferenceMissing => {
            "No monomer reference supplied; skipping monomer analysis".to_string()
        }
        SkipReason::MonomerReferenceNotFound => format!(
            "Monomer reference {} does not exist; monomer-based metrics will not be calculated",
            monomers.map(|p| p.display().to_string()).unwrap_or_default()
        ),
        SkipReason::UnsupportedPlatform => {
            "StringDecomposer can be run on Linux only. Monomer-based metrics will not be calculated"
                .to_string()
        }
    };
    log::log!(reason.log_level(), "{}", message);
}
