//! Adaptive analysis parameters
//!
//! Analysis granularity scales with the largest assembly under evaluation.
//! The parameters are computed once, before any stage runs, and handed to
//! every stage by reference.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::fasta;

/// Smallest k-mer window ever used
pub const MIN_KMER_WINDOW: u64 = 500;

/// Fixed moving-average window
pub const MOVING_AVG_WINDOW: u64 = 20;

/// Analysis granularity derived from assembly size. Read-only once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveParameters {
    kmer_window_size: u64,
    bp_window_size: u64,
    moving_avg_window_size: u64,
    max_threads: usize,
}

impl AdaptiveParameters {
    /// Derive parameters from the longest assembly and the requested thread count
    pub fn from_max_length(max_assembly_len: u64, threads: usize) -> Self {
        let bp_window_size = bp_window_size(max_assembly_len);
        Self {
            kmer_window_size: kmer_window_size(max_assembly_len),
            bp_window_size,
            moving_avg_window_size: moving_avg_window_size(max_assembly_len, bp_window_size),
            max_threads: threads,
        }
    }

    pub fn kmer_window_size(&self) -> u64 {
        self.kmer_window_size
    }

    pub fn bp_window_size(&self) -> u64 {
        self.bp_window_size
    }

    pub fn moving_avg_window_size(&self) -> u64 {
        self.moving_avg_window_size
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Short key identifying this parameter set in artifact names
    pub fn tag(&self) -> String {
        format!(
            "k{}_bp{}_ma{}",
            self.kmer_window_size, self.bp_window_size, self.moving_avg_window_size
        )
    }
}

pub fn kmer_window_size(max_assembly_len: u64) -> u64 {
    MIN_KMER_WINDOW.max(max_assembly_len / 150)
}

pub fn bp_window_size(max_assembly_len: u64) -> u64 {
    if max_assembly_len < 100_000 {
        200
    } else if max_assembly_len < 1_000_000 {
        500
    } else {
        1000
    }
}

/// Always yields [`MOVING_AVG_WINDOW`]: the clamp's lower and upper bound coincide.
/// Kept in this form until the intended scaling law is settled.
pub fn moving_avg_window_size(max_assembly_len: u64, bp_window_size: u64) -> u64 {
    let scaled = max_assembly_len / bp_window_size.max(1) / 20;
    MOVING_AVG_WINDOW.min(MOVING_AVG_WINDOW.max(scaled))
}

/// Validates assembly files and derives [`AdaptiveParameters`] from them
pub struct ParameterAdapter;

impl ParameterAdapter {
    pub fn adapt(assembly_files: &[PathBuf], threads: usize) -> PipelineResult<AdaptiveParameters> {
        let summaries = fasta::check_fasta_files(assembly_files)?;
        let max_len = summaries.iter().map(|s| s.total_length).max().unwrap_or(0);
        log::debug!("Max assembly length: {}", max_len);

        let params = AdaptiveParameters::from_max_length(max_len, threads);
        log::info!(
            "Parameters: kmer window {}, breakpoint window {}, moving average window {}, threads {}",
            params.kmer_window_size(),
            params.bp_window_size(),
            params.moving_avg_window_size(),
            params.max_threads()
        );
        Ok(params)
    }
}
