//! JSON record of what a pipeline run produced

use std::path::{Path, PathBuf};
use chrono::Utc;
use serde::Serialize;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::params::AdaptiveParameters;
use crate::pipeline::{PipelineState, SkipReason};
use crate::reads::ReadPlatform;
use crate::stages::StageArtifact;

pub const MANIFEST_FILE: &str = "run_manifest.json";

#[derive(Debug, Serialize)]
pub struct ManifestAssembly {
    pub label: String,
    pub fname: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct RunManifest {
    pub version: String,
    pub finished_at: String,
    pub terminal: PipelineState,
    pub parameters: AdaptiveParameters,
    pub platform: ReadPlatform,
    pub assemblies: Vec<ManifestAssembly>,
    pub stages: Vec<StageArtifact>,
    pub skipped: Vec<SkipReason>,
}

impl RunManifest {
    pub fn new(
        ctx: &PipelineContext,
        terminal: PipelineState,
        stages: &[StageArtifact],
        skipped: &[SkipReason],
    ) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            finished_at: Utc::now().to_rfc3339(),
            terminal,
            parameters: ctx.params,
            platform: ctx.reads.platform(),
            assemblies: ctx
                .assemblies
                .iter()
                .map(|a| ManifestAssembly {
                    label: a.label().to_string(),
                    fname: a.fname().to_path_buf(),
                })
                .collect(),
            stages: stages.to_vec(),
            skipped: skipped.to_vec(),
        }
    }

    /// Write the manifest into `report_dir`, returning its path
    pub fn write_to(&self, report_dir: &Path) -> PipelineResult<PathBuf> {
        let path = report_dir.join(MANIFEST_FILE);
        let file = std::fs::File::create(&path)
            .map_err(|e| PipelineError::io(format!("creating {}", path.display()), e))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PipelineError::io(format!("writing {}", path.display()), e.into()))?;
        Ok(path)
    }
}
