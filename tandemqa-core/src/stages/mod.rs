//! Analysis stages run over the alignment results
//!
//! Each stage consumes the alignment artifacts plus whatever earlier stages
//! produced, and yields a report artifact. The stage algorithms themselves live
//! in external programs; this module fixes the contract they are driven by.

use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentArtifacts;
use crate::assembly::AssemblySet;
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

pub mod external;

pub use external::ExternalStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Coverage,
    Breakpoint,
    KmerConsistency,
    PairwiseComparison,
    Discordance,
    MonomerUnit,
}

/// Whether a stage writes one artifact per assembly or one for the whole set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactScope {
    PerAssembly,
    CrossAssembly,
}

impl StageKind {
    /// All stages in execution order
    pub const ALL: [StageKind; 6] = [
        StageKind::Coverage,
        StageKind::Breakpoint,
        StageKind::KmerConsistency,
        StageKind::PairwiseComparison,
        StageKind::Discordance,
        StageKind::MonomerUnit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Coverage => "coverage",
            StageKind::Breakpoint => "breakpoints",
            StageKind::KmerConsistency => "kmer",
            StageKind::PairwiseComparison => "pairwise",
            StageKind::Discordance => "discordance",
            StageKind::MonomerUnit => "monomer",
        }
    }

    pub fn scope(&self) -> ArtifactScope {
        match self {
            StageKind::PairwiseComparison | StageKind::Discordance => ArtifactScope::CrossAssembly,
            _ => ArtifactScope::PerAssembly,
        }
    }

    /// Stage that must have completed first; `None` means only alignment is required
    pub fn depends_on(&self) -> Option<StageKind> {
        match self {
            StageKind::Coverage => None,
            StageKind::Breakpoint => Some(StageKind::Coverage),
            StageKind::KmerConsistency => Some(StageKind::Breakpoint),
            StageKind::PairwiseComparison => Some(StageKind::Breakpoint),
            StageKind::Discordance => Some(StageKind::PairwiseComparison),
            StageKind::MonomerUnit => Some(StageKind::Discordance),
        }
    }

    pub fn needs_reads(&self) -> bool {
        matches!(
            self,
            StageKind::KmerConsistency | StageKind::Discordance | StageKind::MonomerUnit
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a stage may consume besides the context
#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    pub alignments: &'a AlignmentArtifacts,
    pub prior: &'a [StageArtifact],
    pub monomers: Option<&'a Path>,
}

/// Report produced by a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageArtifact {
    pub kind: StageKind,
    pub paths: Vec<PathBuf>,
    /// True when every path was taken from an earlier run
    pub reused: bool,
}

pub trait AnalysisStage {
    fn kind(&self) -> StageKind;

    fn run(
        &self,
        assemblies: &AssemblySet,
        ctx: &PipelineContext,
        inputs: &StageInputs<'_>,
    ) -> PipelineResult<StageArtifact>;
}

/// Program names of the external stage implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePrograms {
    pub coverage: PathBuf,
    pub breakpoint: PathBuf,
    pub kmer: PathBuf,
    pub pairwise: PathBuf,
    pub discordance: PathBuf,
    pub monomer: PathBuf,
}

impl Default for StagePrograms {
    fn default() -> Self {
        let program = |kind: StageKind| PathBuf::from(format!("tandemquast-{}", kind.name()));
        Self {
            coverage: program(StageKind::Coverage),
            breakpoint: program(StageKind::Breakpoint),
            kmer: program(StageKind::KmerConsistency),
            pairwise: program(StageKind::PairwiseComparison),
            discordance: program(StageKind::Discordance),
            monomer: program(StageKind::MonomerUnit),
        }
    }
}

impl StagePrograms {
    pub fn program(&self, kind: StageKind) -> &Path {
        match kind {
            StageKind::Coverage => &self.coverage,
            StageKind::Breakpoint => &self.breakpoint,
            StageKind::KmerConsistency => &self.kmer,
            StageKind::PairwiseComparison => &self.pairwise,
            StageKind::Discordance => &self.discordance,
            StageKind::MonomerUnit => &self.monomer,
        }
    }
}

/// One implementation per stage kind
#[derive(Default)]
pub struct StageSet {
    stages: Vec<Box<dyn AnalysisStage>>,
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, replacing any earlier one of the same kind
    pub fn with(mut self, stage: Box<dyn AnalysisStage>) -> Self {
        self.stages.retain(|s| s.kind() != stage.kind());
        self.stages.push(stage);
        self
    }

    /// External implementations for every stage
    pub fn external(programs: &StagePrograms) -> Self {
        StageKind::ALL.iter().fold(Self::new(), |set, &kind| {
            set.with(Box::new(ExternalStage::new(kind, programs.program(kind))))
        })
    }

    pub fn get(&self, kind: StageKind) -> PipelineResult<&dyn AnalysisStage> {
        self.stages
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| &**s)
            .ok_or_else(|| {
                PipelineError::stage_failure(kind.name(), "no implementation registered")
            })
    }
}
