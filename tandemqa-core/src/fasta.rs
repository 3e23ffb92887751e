//! Assembly file inspection
//!
//! Well-formedness checks and length measurement for assembly FASTA/FASTQ
//! files, backed by needletail (gzip input is detected transparently).

use std::path::{Path, PathBuf};
use needletail::parse_fastx_file;
use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("No sequences found in {0}")]
    EmptyFile(PathBuf),
    #[error("Sequences in {0} contain no bases")]
    NoBases(PathBuf),
}

/// Summary of one assembly file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaSummary {
    pub records: usize,
    pub total_length: u64,
}

/// Scan a sequence file, counting records and bases
pub fn summarize<P: AsRef<Path>>(path: P) -> Result<FastaSummary, FastaError> {
    let path = path.as_ref();
    let parse_err = |e: needletail::errors::ParseError| FastaError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut reader = parse_fastx_file(path).map_err(parse_err)?;
    let mut summary = FastaSummary { records: 0, total_length: 0 };

    while let Some(record) = reader.next() {
        let record = record.map_err(parse_err)?;
        summary.records += 1;
        summary.total_length += record.seq().len() as u64;
    }

    if summary.records == 0 {
        return Err(FastaError::EmptyFile(path.to_path_buf()));
    }
    if summary.total_length == 0 {
        return Err(FastaError::NoBases(path.to_path_buf()));
    }
    Ok(summary)
}

/// Check every assembly file, reporting all malformed ones at once
pub fn check_fasta_files(paths: &[PathBuf]) -> PipelineResult<Vec<FastaSummary>> {
    let mut summaries = Vec::with_capacity(paths.len());
    let mut bad = Vec::new();

    for path in paths {
        match summarize(path) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                log::error!("{}", e);
                bad.push(path.clone());
            }
        }
    }

    if bad.is_empty() {
        Ok(summaries)
    } else {
        let names: Vec<String> = bad.iter().map(|p| p.display().to_string()).collect();
        Err(PipelineError::invalid_input(
            format!("malformed assembly file(s): {}", names.join(", ")),
            bad,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fasta(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_total_length_spans_records() {
        let f = fasta(">ctg1\nACGTACGT\nACGT\n>ctg2\nGGGG\n");
        let summary = summarize(f.path()).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.total_length, 16);
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let f = fasta("");
        assert!(summarize(f.path()).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let f = fasta("this is not a sequence file\n");
        assert!(summarize(f.path()).is_err());
    }

    #[test]
    fn test_check_reports_every_bad_file() {
        let good = fasta(">a\nACGT\n");
        let bad = fasta("");
        let paths = vec![good.path().to_path_buf(), bad.path().to_path_buf()];

        match check_fasta_files(&paths) {
            Err(PipelineError::InvalidInput { files, .. }) => {
                assert_eq!(files, vec![bad.path().to_path_buf()]);
            }
            other => panic!("expected invalid input, got {:?}", other),
        }
    }
}
