//! Process-scoped pipeline state shared by every stage

use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::assembly::AssemblySet;
use crate::error::{PipelineError, PipelineResult};
use crate::params::AdaptiveParameters;
use crate::reads::ReadSource;

/// Output directory tree: `<out_dir>/report` and `<out_dir>/tmp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    out_dir: PathBuf,
    report_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(out_dir: &Path) -> Self {
        let out_dir = if out_dir.is_absolute() {
            out_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(out_dir))
                .unwrap_or_else(|_| out_dir.to_path_buf())
        };
        Self {
            report_dir: out_dir.join("report"),
            tmp_dir: out_dir.join("tmp"),
            out_dir,
        }
    }

    /// Create the report and tmp directories; existing ones are left as they are
    pub fn ensure(&self) -> PipelineResult<()> {
        for dir in [&self.report_dir, &self.tmp_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| PipelineError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }
}

/// Behavioural switches taken from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunFlags {
    /// Treat existing artifacts as valid and skip recomputation
    pub reuse: bool,
    pub only_polish: bool,
    pub no_nucl_alignment: bool,
}

/// State threaded through all stages. Built once assemblies are known.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub layout: OutputLayout,
    pub assemblies: AssemblySet,
    pub params: AdaptiveParameters,
    pub reads: ReadSource,
    pub hifi_reads: Option<PathBuf>,
    pub flags: RunFlags,
}

impl PipelineContext {
    pub fn threads(&self) -> usize {
        self.params.max_threads()
    }
}
