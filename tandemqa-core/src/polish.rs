//! Polish-only branch: consensus correction of the assemblies

use std::path::PathBuf;

use crate::command::{resolve_program, CommandRunner, ExternalCommand, SystemRunner};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult, POLISHING_STAGE};

pub trait Polisher {
    fn polish(&self, ctx: &PipelineContext) -> PipelineResult<()>;
}

/// Polisher run as a subordinate process
pub struct ExternalPolisher<R: CommandRunner = SystemRunner> {
    binary_path: PathBuf,
    runner: R,
}

impl ExternalPolisher<SystemRunner> {
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path: resolve_program(binary_path),
            runner: SystemRunner,
        }
    }
}

impl<R: CommandRunner> ExternalPolisher<R> {
    pub fn with_runner(binary_path: PathBuf, runner: R) -> Self {
        Self { binary_path, runner }
    }

    pub fn build_command(&self, ctx: &PipelineContext) -> ExternalCommand {
        let hifi = ctx.hifi_reads.as_ref().filter(|p| {
            let exists = p.exists();
            if !exists {
                log::warn!("HiFi reads file {} does not exist and will be ignored", p.display());
            }
            exists
        });

        let mut cmd = ExternalCommand::new(&self.binary_path)
            .arg("-t")
            .arg(ctx.threads().to_string())
            .arg("-o")
            .arg(ctx.layout.out_dir())
            .arg("--tmp-dir")
            .arg(ctx.layout.tmp_dir())
            .arg(ctx.reads.platform().flag())
            .arg(ctx.reads.path());
        if let Some(hifi) = hifi {
            cmd = cmd.arg("--hifi").arg(hifi);
        }
        cmd.arg("-l")
            .arg(ctx.assemblies.joined_labels())
            .args(ctx.assemblies.fnames())
    }
}

impl<R: CommandRunner> Polisher for ExternalPolisher<R> {
    fn polish(&self, ctx: &PipelineContext) -> PipelineResult<()> {
        let cmd = self.build_command(ctx);
        log::info!("Running polishing: {}", cmd);

        let outcome = self.runner.run(&cmd).map_err(|e| {
            PipelineError::stage_failure(
                POLISHING_STAGE,
                format!("failed to start {}: {}", self.binary_path.display(), e),
            )
        })?;
        if !outcome.success() {
            return Err(PipelineError::stage_failure(POLISHING_STAGE, outcome.diagnostic()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::AssemblyRegistry;
    use crate::context::{OutputLayout, RunFlags};
    use crate::params::AdaptiveParameters;
    use crate::reads::ReadSource;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn context(hifi: Option<PathBuf>) -> PipelineContext {
        let layout = OutputLayout::new(Path::new("/out"));
        PipelineContext {
            assemblies: AssemblyRegistry::build(&[PathBuf::from("/asm/a.fa")], None, layout.out_dir())
                .unwrap(),
            layout,
            params: AdaptiveParameters::from_max_length(1_000, 2),
            reads: ReadSource::select(Some("/reads/ont.fq".into()), None).unwrap(),
            hifi_reads: hifi,
            flags: RunFlags { only_polish: true, ..Default::default() },
        }
    }

    #[test]
    fn test_existing_hifi_is_passed() {
        let hifi = NamedTempFile::new().unwrap();
        let polisher = ExternalPolisher::with_runner(PathBuf::from("polish"), SystemRunner);
        let args = polisher.build_command(&context(Some(hifi.path().to_path_buf()))).args_lossy();
        let pos = args.iter().position(|a| a == "--hifi").unwrap();
        assert_eq!(args[pos + 1], hifi.path().to_string_lossy());
    }

    #[test]
    fn test_missing_hifi_is_dropped() {
        let polisher = ExternalPolisher::with_runner(PathBuf::from("polish"), SystemRunner);
        let args = polisher
            .build_command(&context(Some(PathBuf::from("/nowhere/hifi.fq"))))
            .args_lossy();
        assert!(!args.contains(&"--hifi".to_string()));
        assert_eq!(args.last().unwrap(), "/asm/a.fa");
    }
}
