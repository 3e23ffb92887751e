//! Long-read input selection

use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPlatform {
    #[default]
    Nano,
    PacBio,
}

impl ReadPlatform {
    /// Flag naming this platform on external tool command lines
    pub fn flag(&self) -> &'static str {
        match self {
            ReadPlatform::Nano => "--nano",
            ReadPlatform::PacBio => "--pacbio",
        }
    }
}

impl fmt::Display for ReadPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPlatform::Nano => write!(f, "nano"),
            ReadPlatform::PacBio => write!(f, "pacbio"),
        }
    }
}

/// The single error-prone long-read file used as ground truth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSource {
    platform: ReadPlatform,
    path: PathBuf,
}

impl ReadSource {
    /// Select exactly one of the nanopore and CLR read files
    pub fn select(nano: Option<PathBuf>, pacbio: Option<PathBuf>) -> PipelineResult<Self> {
        match (nano, pacbio) {
            (Some(path), None) => Ok(Self { platform: ReadPlatform::Nano, path }),
            (None, Some(path)) => Ok(Self { platform: ReadPlatform::PacBio, path }),
            _ => Err(PipelineError::configuration(
                "You should specify ONE path to a file with reads (ONT or PacBio CLR reads)",
            )),
        }
    }

    pub fn platform(&self) -> ReadPlatform {
        self.platform
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Platform tag published to analysis stages.
    ///
    /// CLR selections leave the tag at its default; only a nanopore selection
    /// records it. Command lines that must name the real platform use
    /// [`ReadSource::platform`] instead.
    pub fn recorded_platform_tag(&self) -> ReadPlatform {
        match self.platform {
            ReadPlatform::Nano => ReadPlatform::Nano,
            ReadPlatform::PacBio => ReadPlatform::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_nano() {
        let source = ReadSource::select(Some("ont.fq".into()), None).unwrap();
        assert_eq!(source.platform(), ReadPlatform::Nano);
        assert_eq!(source.path(), Path::new("ont.fq"));
        assert_eq!(source.platform().flag(), "--nano");
    }

    #[test]
    fn test_select_pacbio_keeps_default_tag() {
        let source = ReadSource::select(None, Some("clr.fa".into())).unwrap();
        assert_eq!(source.platform(), ReadPlatform::PacBio);
        assert_eq!(source.platform().flag(), "--pacbio");
        assert_eq!(source.recorded_platform_tag(), ReadPlatform::Nano);
    }

    #[test]
    fn test_both_sources_rejected() {
        let err = ReadSource::select(Some("a".into()), Some("b".into())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_no_source_rejected() {
        let err = ReadSource::select(None, None).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }
}
