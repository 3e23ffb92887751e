//! Stage implementation backed by an external program

use std::path::{Path, PathBuf};

use super::{AnalysisStage, ArtifactScope, StageArtifact, StageInputs, StageKind};
use crate::assembly::{Assembly, AssemblySet};
use crate::command::{resolve_program, CommandRunner, ExternalCommand, SystemRunner};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// Runs a stage program and checks that it left its artifacts behind.
///
/// Artifact names carry the assembly labels and the parameter tag, so a
/// rerun with unchanged inputs finds the previous results and, unless reuse
/// is disabled, skips the program entirely.
pub struct ExternalStage<R: CommandRunner = SystemRunner> {
    kind: StageKind,
    program: PathBuf,
    runner: R,
}

impl ExternalStage<SystemRunner> {
    pub fn new<P: AsRef<Path>>(kind: StageKind, program: P) -> Self {
        Self {
            kind,
            program: resolve_program(program),
            runner: SystemRunner,
        }
    }
}

impl<R: CommandRunner> ExternalStage<R> {
    pub fn with_runner(kind: StageKind, program: PathBuf, runner: R) -> Self {
        Self { kind, program, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Artifact for one assembly
    pub fn assembly_artifact(&self, ctx: &PipelineContext, assembly: &Assembly) -> PathBuf {
        ctx.layout.report_dir().join(format!(
            "{}_{}_{}.tsv",
            assembly.label(),
            self.kind.name(),
            ctx.params.tag()
        ))
    }

    /// Artifact covering the whole assembly set.
    ///
    /// The ordered label list is folded into a fixed-width digest: labels may
    /// contain `_` themselves, and a long list must still fit one file name.
    /// The labels themselves are recorded in the run manifest.
    pub fn set_artifact(&self, ctx: &PipelineContext, assemblies: &AssemblySet) -> PathBuf {
        ctx.layout.report_dir().join(format!(
            "{}_{}asm_{:016x}_{}.tsv",
            self.kind.name(),
            assemblies.len(),
            label_digest(&assemblies.labels()),
            ctx.params.tag()
        ))
    }

    fn base_command(&self, ctx: &PipelineContext, inputs: &StageInputs<'_>, out: &Path) -> PipelineResult<ExternalCommand> {
        let params = &ctx.params;
        let mut cmd = ExternalCommand::new(&self.program)
            .arg("-t")
            .arg(params.max_threads().to_string())
            .arg("--kmer-window")
            .arg(params.kmer_window_size().to_string())
            .arg("--bp-window")
            .arg(params.bp_window_size().to_string())
            .arg("--ma-window")
            .arg(params.moving_avg_window_size().to_string())
            .arg("--platform")
            .arg(ctx.reads.recorded_platform_tag().to_string())
            .arg("--out")
            .arg(out);

        if self.kind.needs_reads() {
            cmd = cmd.arg("--reads").arg(ctx.reads.path());
        }
        if self.kind == StageKind::MonomerUnit {
            let monomers = inputs.monomers.ok_or_else(|| {
                PipelineError::configuration("monomer analysis requires a monomer reference file")
            })?;
            cmd = cmd.arg("--monomers").arg(monomers);
        }
        Ok(cmd.arg_if(!ctx.flags.reuse, "-f"))
    }

    fn with_assembly(cmd: ExternalCommand, assembly: &Assembly) -> ExternalCommand {
        cmd.arg("--label")
            .arg(assembly.label())
            .arg("--assembly")
            .arg(assembly.fname())
            .arg("--alignment")
            .arg(assembly.alignment_bed())
    }

    /// Cross-assembly stages read every per-assembly report produced so far
    fn with_prior(cmd: ExternalCommand, inputs: &StageInputs<'_>) -> ExternalCommand {
        inputs
            .prior
            .iter()
            .filter(|a| a.kind.scope() == ArtifactScope::PerAssembly)
            .flat_map(|a| a.paths.iter())
            .fold(cmd, |cmd, path| cmd.arg("--prior").arg(path))
    }

    fn invoke(&self, cmd: &ExternalCommand, out: &Path) -> PipelineResult<()> {
        log::debug!("{} stage command: {}", self.kind, cmd);
        let outcome = self.runner.run(cmd).map_err(|e| {
            PipelineError::stage_failure(
                self.kind.name(),
                format!("failed to start {}: {}", self.program.display(), e),
            )
        })?;
        if !outcome.success() {
            return Err(PipelineError::stage_failure(self.kind.name(), outcome.diagnostic()));
        }
        if !is_valid_artifact(out) {
            return Err(PipelineError::stage_failure(
                self.kind.name(),
                format!("program succeeded but did not write {}", out.display()),
            ));
        }
        Ok(())
    }
}

/// Labels never contain whitespace, so a newline separates them unambiguously
fn label_digest(labels: &[&str]) -> u64 {
    xxhash_rust::xxh64::xxh64(labels.join("\n").as_bytes(), 0)
}

fn is_valid_artifact(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

impl<R: CommandRunner> AnalysisStage for ExternalStage<R> {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn run(
        &self,
        assemblies: &AssemblySet,
        ctx: &PipelineContext,
        inputs: &StageInputs<'_>,
    ) -> PipelineResult<StageArtifact> {
        let mut paths = Vec::new();
        let mut computed = 0usize;

        match self.kind.scope() {
            ArtifactScope::PerAssembly => {
                for assembly in assemblies {
                    let out = self.assembly_artifact(ctx, assembly);
                    if ctx.flags.reuse && is_valid_artifact(&out) {
                        log::info!("Reusing {} results for {}", self.kind, assembly.label());
                    } else {
                        let cmd = Self::with_assembly(self.base_command(ctx, inputs, &out)?, assembly);
                        self.invoke(&cmd, &out)?;
                        computed += 1;
                    }
                    paths.push(out);
                }
            }
            ArtifactScope::CrossAssembly => {
                let out = self.set_artifact(ctx, assemblies);
                if ctx.flags.reuse && is_valid_artifact(&out) {
                    log::info!("Reusing {} results", self.kind);
                } else {
                    let cmd = assemblies
                        .iter()
                        .fold(self.base_command(ctx, inputs, &out)?, Self::with_assembly);
                    let cmd = Self::with_prior(cmd, inputs);
                    self.invoke(&cmd, &out)?;
                    computed += 1;
                }
                paths.push(out);
            }
        }

        Ok(StageArtifact {
            kind: self.kind,
            paths,
            reused: computed == 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::AlignmentArtifacts;
    use crate::assembly::{parse_labels, AssemblyRegistry};
    use crate::command::CommandOutcome;
    use crate::context::{OutputLayout, RunFlags};
    use crate::params::AdaptiveParameters;
    use crate::reads::ReadSource;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes the `--out` file and records each command
    #[derive(Default)]
    struct WritingRunner {
        calls: RefCell<Vec<ExternalCommand>>,
        fail: bool,
        skip_write: bool,
    }

    impl CommandRunner for WritingRunner {
        fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutcome> {
            self.calls.borrow_mut().push(command.clone());
            if self.fail {
                return Ok(CommandOutcome::with_status(1));
            }
            if !self.skip_write {
                let args = command.args_lossy();
                let pos = args.iter().position(|a| a == "--out").unwrap();
                std::fs::write(&args[pos + 1], "result\n")?;
            }
            Ok(CommandOutcome::with_status(0))
        }
    }

    fn context(dir: &Path, reuse: bool) -> PipelineContext {
        let files = vec![PathBuf::from("/asm/a.fa"), PathBuf::from("/asm/b.fa")];
        labelled_context(dir, reuse, &files, None)
    }

    fn labelled_context(dir: &Path, reuse: bool, files: &[PathBuf], labels: Option<&str>) -> PipelineContext {
        let layout = OutputLayout::new(dir);
        layout.ensure().unwrap();
        PipelineContext {
            assemblies: AssemblyRegistry::build(files, labels.map(parse_labels), layout.out_dir()).unwrap(),
            layout,
            params: AdaptiveParameters::from_max_length(10_000, 4),
            reads: ReadSource::select(None, Some("/reads/clr.fa".into())).unwrap(),
            hifi_reads: None,
            flags: RunFlags { reuse, ..Default::default() },
        }
    }

    fn run_stage(stage: &ExternalStage<WritingRunner>, ctx: &PipelineContext) -> PipelineResult<StageArtifact> {
        let alignments = AlignmentArtifacts::expected(ctx);
        let inputs = StageInputs { alignments: &alignments, prior: &[], monomers: None };
        stage.run(&ctx.assemblies, ctx, &inputs)
    }

    #[test]
    fn test_per_assembly_invocations() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let stage = ExternalStage::with_runner(StageKind::Coverage, "cov".into(), WritingRunner::default());

        let artifact = run_stage(&stage, &ctx).unwrap();
        assert_eq!(stage.runner().calls.borrow().len(), 2);
        assert!(!artifact.reused);
        assert_eq!(
            artifact.paths[0].file_name().unwrap().to_string_lossy(),
            "a_coverage_k500_bp200_ma20.tsv"
        );

        let args = stage.runner().calls.borrow()[0].args_lossy();
        assert!(args.contains(&"--alignment".to_string()));
        assert!(!args.contains(&"--reads".to_string()));
        // CLR runs still publish the default tag
        let pos = args.iter().position(|a| a == "--platform").unwrap();
        assert_eq!(args[pos + 1], "nano");
    }

    #[test]
    fn test_reuse_skips_existing_artifacts() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let stage = ExternalStage::with_runner(StageKind::Breakpoint, "bp".into(), WritingRunner::default());

        run_stage(&stage, &ctx).unwrap();
        let first = std::fs::metadata(&stage.assembly_artifact(&ctx, ctx.assemblies.iter().next().unwrap()))
            .unwrap()
            .modified()
            .unwrap();

        let again = run_stage(&stage, &ctx).unwrap();
        assert!(again.reused);
        assert_eq!(stage.runner().calls.borrow().len(), 2);
        let second = std::fs::metadata(&again.paths[0]).unwrap().modified().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_reuse_recomputes() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), false);
        let stage = ExternalStage::with_runner(
            StageKind::PairwiseComparison,
            "pw".into(),
            WritingRunner::default(),
        );

        run_stage(&stage, &ctx).unwrap();
        let again = run_stage(&stage, &ctx).unwrap();
        assert!(!again.reused);
        let calls = stage.runner().calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].args_lossy().contains(&"-f".to_string()));
        let name = again.paths[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pairwise_2asm_"), "{}", name);
        assert!(name.ends_with("_k500_bp200_ma20.tsv"), "{}", name);
    }

    #[test]
    fn test_set_artifact_separates_label_splits() {
        let dir = TempDir::new().unwrap();
        let files = vec![PathBuf::from("/asm/x.fa"), PathBuf::from("/asm/y.fa")];
        let first = labelled_context(dir.path(), true, &files, Some("a_b,c"));
        let second = labelled_context(dir.path(), true, &files, Some("a,b_c"));
        let stage = ExternalStage::with_runner(StageKind::Discordance, "disc".into(), WritingRunner::default());

        assert_ne!(
            stage.set_artifact(&first, &first.assemblies),
            stage.set_artifact(&second, &second.assemblies)
        );
    }

    #[test]
    fn test_set_artifact_name_is_bounded() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..10).map(|i| PathBuf::from(format!("/asm/{}.fa", i))).collect();
        let labels: Vec<String> = (0..10).map(|i| format!("{}{}", "x".repeat(29), i)).collect();
        let ctx = labelled_context(dir.path(), true, &files, Some(&labels.join(",")));
        let stage = ExternalStage::with_runner(
            StageKind::PairwiseComparison,
            "pw".into(),
            WritingRunner::default(),
        );

        let artifact = run_stage(&stage, &ctx).unwrap();
        let name = artifact.paths[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.len() < 64, "{}", name);
        assert!(artifact.paths[0].exists());
    }

    #[test]
    fn test_cross_assembly_stage_receives_prior_reports() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let alignments = AlignmentArtifacts::expected(&ctx);
        let prior = vec![
            StageArtifact {
                kind: StageKind::Coverage,
                paths: vec![PathBuf::from("/r/a_cov.tsv"), PathBuf::from("/r/b_cov.tsv")],
                reused: false,
            },
            StageArtifact {
                kind: StageKind::PairwiseComparison,
                paths: vec![PathBuf::from("/r/pairwise.tsv")],
                reused: false,
            },
        ];
        let inputs = StageInputs { alignments: &alignments, prior: &prior, monomers: None };
        let stage = ExternalStage::with_runner(StageKind::Discordance, "disc".into(), WritingRunner::default());

        stage.run(&ctx.assemblies, &ctx, &inputs).unwrap();
        let args = stage.runner().calls.borrow()[0].args_lossy();
        let prior_args: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "--prior")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(prior_args, vec!["/r/a_cov.tsv", "/r/b_cov.tsv"]);
    }

    #[test]
    fn test_failed_program_is_stage_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let runner = WritingRunner { fail: true, ..Default::default() };
        let stage = ExternalStage::with_runner(StageKind::Discordance, "disc".into(), runner);

        let err = run_stage(&stage, &ctx).unwrap_err();
        assert!(matches!(err, PipelineError::StageFailure { ref stage, .. } if stage == "discordance"));
    }

    #[test]
    fn test_missing_artifact_is_stage_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let runner = WritingRunner { skip_write: true, ..Default::default() };
        let stage = ExternalStage::with_runner(StageKind::Coverage, "cov".into(), runner);

        assert!(run_stage(&stage, &ctx).is_err());
    }

    #[test]
    fn test_monomer_stage_requires_reference() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), true);
        let stage = ExternalStage::with_runner(StageKind::MonomerUnit, "mono".into(), WritingRunner::default());

        let err = run_stage(&stage, &ctx).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
