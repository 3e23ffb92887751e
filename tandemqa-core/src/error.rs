//! Error types shared by every pipeline component

use std::path::PathBuf;
use thiserror::Error;

/// Name under which the alignment stage reports failures
pub const ALIGNMENT_STAGE: &str = "alignment";

/// Name under which the polishing branch reports failures
pub const POLISHING_STAGE: &str = "polishing";

/// Fatal pipeline errors. Degraded capabilities are not errors; see [`crate::SkipReason`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String, files: Vec<PathBuf> },

    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn invalid_input<S: Into<String>>(message: S, files: Vec<PathBuf>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            files,
        }
    }

    pub fn stage_failure<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status for this error.
    ///
    /// Alignment failures share status 2 with configuration errors: nothing
    /// downstream can run without alignments.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 2,
            Self::InvalidInput { .. } => 1,
            Self::StageFailure { stage, .. } if stage == ALIGNMENT_STAGE => 2,
            Self::StageFailure { .. } => 3,
            Self::Io { .. } => 3,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
