//! User-facing error reporting for the TandemQA CLI

use tandemqa_core::error::ALIGNMENT_STAGE;
use tandemqa_core::PipelineError;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &PipelineError) -> String {
    let mut message = error.to_string();

    match error {
        PipelineError::Configuration { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Supply exactly one of --nano or --pacbio\n\
                 • Pass at least one assembly file\n\
                 • Give one label per assembly with -l (comma separated)\n\
                 • Check your tandemqa.toml configuration file",
            );
        }

        PipelineError::InvalidInput { files, .. } => {
            message.push_str("\n\nSuggestions:");
            for file in files {
                message.push_str(&format!("\n • Check that {} is a non-empty FASTA file", file.display()));
            }
        }

        PipelineError::StageFailure { stage, .. } if stage == ALIGNMENT_STAGE => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check the read and assembly files and the mapper output\n\
                 • Ensure tandemmapper is installed and in your PATH (or set tools.mapper)",
            );
        }

        PipelineError::StageFailure { stage, .. } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Ensure the {} stage program is installed (see the [stages] section of tandemqa.toml)\n\
                 • Rerun with -f to recompute artifacts left by earlier runs",
                stage
            ));
        }

        PipelineError::Io { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Ensure you have write permissions for the output directory\n\
                 • Free up disk space",
            );
        }
    }

    message
}

/// Print error with helpful suggestions and exit with its status
pub fn print_error_and_exit(error: &PipelineError) -> ! {
    eprintln!("ERROR! {}", format_error_with_suggestions(error));
    std::process::exit(error.exit_code());
}
