//! Run diagnostics and terminal formatting.
//!
//! - `QualityReport`: counts of what each stage kept and discarded
//! - `format`: human-readable summaries and tables

pub mod format;

pub use format::*;

use serde::{Deserialize, Serialize};

use crate::domain::CandidateRegion;
use crate::error::FitFailureReason;
use crate::fit::LineFitBatch;
use crate::matching::{Dispersion, MatchOutcome};

/// Number of regions rejected for one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCount {
    pub reason: FitFailureReason,
    pub count: usize,
}

/// What each pipeline stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub spectrum_samples: usize,
    /// Detection threshold actually used (flux above baseline).
    pub detection_threshold: f64,
    pub regions_found: usize,
    /// Regions clipped at a spectrum edge.
    pub regions_truncated: usize,
    pub fits_accepted: usize,
    /// One entry per failure reason, in `FitFailureReason::ALL` order.
    pub rejected: Vec<RejectionCount>,
    pub matched: usize,
    pub unmatched_fits: usize,
    pub unmatched_references: usize,
    pub dispersion: Dispersion,
}

impl QualityReport {
    pub fn new(
        spectrum_samples: usize,
        detection_threshold: f64,
        regions: &[CandidateRegion],
        batch: &LineFitBatch,
        matches: &MatchOutcome,
        dispersion: &Dispersion,
    ) -> Self {
        Self {
            spectrum_samples,
            detection_threshold,
            regions_found: regions.len(),
            regions_truncated: regions.iter().filter(|r| r.boundary_truncated).count(),
            fits_accepted: batch.fits.len(),
            rejected: FitFailureReason::ALL
                .iter()
                .map(|&reason| RejectionCount {
                    reason,
                    count: batch.rejected_count(reason),
                })
                .collect(),
            matched: matches.matched.len(),
            unmatched_fits: matches.unmatched_fits,
            unmatched_references: matches.unmatched_references,
            dispersion: dispersion.clone(),
        }
    }

    pub fn rejected_count(&self, reason: FitFailureReason) -> usize {
        self.rejected
            .iter()
            .find(|r| r.reason == reason)
            .map_or(0, |r| r.count)
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.iter().map(|r| r.count).sum()
    }
}
