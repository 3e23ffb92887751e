//! TandemQA Core Library
//!
//! Orchestrates long-read based quality assessment of tandem-repeat
//! assemblies: parameter adaptation, read-to-assembly alignment through an
//! external mapper, and the staged analysis run on top of it.

pub mod error;
pub mod fasta;
pub mod params;
pub mod reads;
pub mod assembly;
pub mod context;
pub mod command;
pub mod alignment;
pub mod polish;
pub mod stages;
pub mod manifest;
pub mod pipeline;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use params::{AdaptiveParameters, ParameterAdapter};
pub use reads::{ReadPlatform, ReadSource};
pub use assembly::{Assembly, AssemblyRegistry, AssemblySet};
pub use context::{OutputLayout, PipelineContext, RunFlags};
pub use command::{CommandOutcome, CommandRunner, ExternalCommand, SystemRunner};
pub use alignment::{Aligner, AlignmentArtifacts, TandemMapper};
pub use polish::{ExternalPolisher, Polisher};
pub use stages::{AnalysisStage, ExternalStage, StageArtifact, StageInputs, StageKind, StagePrograms, StageSet};
pub use pipeline::{
    PipelineController, PipelineOutcome, PipelineRequest, PipelineState, Platform, SkipReason,
};

/// Version information for the TandemQA core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
