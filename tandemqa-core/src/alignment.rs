use std::path::PathBuf;
use std::time::Instant;

use crate::command::{resolve_program, CommandRunner, ExternalCommand, SystemRunner};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult, ALIGNMENT_STAGE};

/// Maps long reads onto every assembly
pub trait Aligner {
    fn align(&self, ctx: &PipelineContext) -> PipelineResult<AlignmentArtifacts>;
    fn name(&self) -> &'static str;
}

/// Read-to-assembly alignments, one per assembly in set order
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentArtifacts {
    pub alignments: Vec<PathBuf>,
    pub runtime_seconds: f64,
}

impl AlignmentArtifacts {
    /// Expected alignment locations for the context's assemblies
    pub fn expected(ctx: &PipelineContext) -> Self {
        Self {
            alignments: ctx
                .assemblies
                .iter()
                .map(|a| a.alignment_bed().to_path_buf())
                .collect(),
            runtime_seconds: 0.0,
        }
    }
}

/// TandemMapper run as a subordinate process
pub struct TandemMapper<R: CommandRunner = SystemRunner> {
    binary_path: PathBuf,
    runner: R,
}

impl TandemMapper<SystemRunner> {
    pub fn new(binary_path: Option<PathBuf>) -> Self {
        let binary_path = binary_path
            .map(resolve_program)
            .unwrap_or_else(|| resolve_program("tandemmapper"));
        Self {
            binary_path,
            runner: SystemRunner,
        }
    }
}

impl<R: CommandRunner> TandemMapper<R> {
    pub fn with_runner(binary_path: PathBuf, runner: R) -> Self {
        Self { binary_path, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn build_command(&self, ctx: &PipelineContext) -> ExternalCommand {
        ExternalCommand::new(&self.binary_path)
            .arg("-t")
            .arg(ctx.threads().to_string())
            .arg("-o")
            .arg(ctx.layout.out_dir())
            .arg(ctx.reads.platform().flag())
            .arg(ctx.reads.path())
            .arg("-l")
            .arg(ctx.assemblies.joined_labels())
            .arg_if(ctx.flags.no_nucl_alignment, "--no-nucl-align")
            .args(ctx.assemblies.fnames())
            .arg_if(!ctx.flags.reuse, "-f")
    }
}

impl<R: CommandRunner> Aligner for TandemMapper<R> {
    fn align(&self, ctx: &PipelineContext) -> PipelineResult<AlignmentArtifacts> {
        let start_time = Instant::now();
        let cmd = self.build_command(ctx);
        log::info!("Running {}: {}", self.name(), cmd);

        let outcome = self.runner.run(&cmd).map_err(|e| {
            PipelineError::stage_failure(
                ALIGNMENT_STAGE,
                format!("failed to start {}: {}", self.binary_path.display(), e),
            )
        })?;

        if !outcome.success() {
            return Err(PipelineError::stage_failure(
                ALIGNMENT_STAGE,
                format!(
                    "{} failed ({}). Please check input files and the mapper output; \
                     no analysis can proceed without alignments",
                    self.name(),
                    outcome.diagnostic()
                ),
            ));
        }

        let mut artifacts = AlignmentArtifacts::expected(ctx);
        artifacts.runtime_seconds = start_time.elapsed().as_secs_f64();
        log::info!("Alignment completed in {:.2}s", artifacts.runtime_seconds);
        Ok(artifacts)
    }

    fn name(&self) -> &'static str {
        "tandemmapper"
    }
}
