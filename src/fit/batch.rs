//! Fit every candidate region and aggregate the outcome.
//!
//! Regions are independent, so they are fitted in parallel (rayon); the
//! collected results keep region order and the accepted fits are then sorted
//! by center, which keeps the output deterministic regardless of scheduling.
//! Per-region failures never abort the batch: they are collected as
//! `RejectedRegion`s for the quality report.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateRegion, LineFit, Spectrum};
use crate::error::{FitFailure, FitFailureReason};
use crate::fit::fitter::{LineFitOptions, fit_line};

/// A candidate region the fitter rejected, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRegion {
    pub region: CandidateRegion,
    pub failure: FitFailure,
}

/// Accepted fits (sorted by center) plus the rejected regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineFitBatch {
    pub fits: Vec<LineFit>,
    pub rejected: Vec<RejectedRegion>,
}

impl LineFitBatch {
    pub fn rejected_count(&self, reason: FitFailureReason) -> usize {
        self.rejected.iter().filter(|r| r.failure.reason == reason).count()
    }
}

/// Fit all regions.
pub fn fit_regions(spectrum: &Spectrum, regions: &[CandidateRegion], options: &LineFitOptions) -> LineFitBatch {
    let results: Vec<Result<LineFit, FitFailure>> = regions
        .par_iter()
        .map(|region| fit_line(spectrum, region, options))
        .collect();

    let mut batch = LineFitBatch::default();
    for (region, result) in regions.iter().zip(results) {
        match result {
            Ok(fit) => {
                debug!(
                    "line at {:.3}: width={:.4} amplitude={:.3} rel_rms={:.2e} ({} iterations)",
                    fit.center, fit.width, fit.amplitude, fit.quality.relative_rms, fit.quality.iterations
                );
                batch.fits.push(fit);
            }
            Err(failure) => {
                warn!(
                    "rejected region {}..{} (peak at {:.3}): {failure}",
                    region.start, region.end, region.peak_position
                );
                batch.rejected.push(RejectedRegion {
                    region: *region,
                    failure,
                });
            }
        }
    }

    batch.fits.sort_by(|a, b| a.center.total_cmp(&b.center));
    batch
}
