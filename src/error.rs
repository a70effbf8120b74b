//! Error types.
//!
//! - `ProfileError`: failures of the computational core (bad inputs, bad
//!   configuration, insufficient calibration data, out-of-range queries)
//! - `FitFailure`: a single candidate region could not be fitted; recovered by
//!   skipping that region
//! - `AppError`: what the `instprofile` binary reports, with its exit code

use serde::{Deserialize, Serialize};

/// Errors raised by the core library.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("spectrum length mismatch: positions={positions}, flux={flux}")]
    LengthMismatch { positions: usize, flux: usize },
    #[error("spectrum needs at least {required} samples, got {actual}")]
    TooFewSamples { actual: usize, required: usize },
    #[error("{what} must be finite at index {index}, got {value}")]
    NonFinite {
        what: &'static str,
        index: usize,
        value: f64,
    },
    #[error("positions must be strictly increasing, index {index} has {current} after {previous}")]
    NonIncreasingPosition {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("invalid reference line list: {0}")]
    InvalidReferenceList(String),
    #[error("dispersion solution unavailable: {0}")]
    DispersionUnavailable(String),
    #[error("insufficient data to build a profile: {usable} usable matched lines")]
    InsufficientData { usable: usize },
    #[error("query {value} outside sampled range [{min}, {max}]")]
    OutOfRangeQuery { value: f64, min: f64, max: f64 },
    #[error("instrumental width must be positive to render a kernel, got {width}")]
    NonPositiveWidth { width: f64 },
}

impl ProfileError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Why a candidate region was rejected by the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFailureReason {
    NonConvergence,
    DegenerateRegion,
    PoorQuality,
    CenterOutsideRegion,
}

impl FitFailureReason {
    pub const ALL: [FitFailureReason; 4] = [
        FitFailureReason::NonConvergence,
        FitFailureReason::DegenerateRegion,
        FitFailureReason::PoorQuality,
        FitFailureReason::CenterOutsideRegion,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FitFailureReason::NonConvergence => "non_convergence",
            FitFailureReason::DegenerateRegion => "degenerate_region",
            FitFailureReason::PoorQuality => "poor_quality",
            FitFailureReason::CenterOutsideRegion => "center_outside_region",
        }
    }
}

impl std::fmt::Display for FitFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A per-region fit failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct FitFailure {
    pub reason: FitFailureReason,
    pub detail: String,
}

impl FitFailure {
    pub fn new(reason: FitFailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn non_convergence(detail: impl Into<String>) -> Self {
        Self::new(FitFailureReason::NonConvergence, detail)
    }

    pub fn degenerate(detail: impl Into<String>) -> Self {
        Self::new(FitFailureReason::DegenerateRegion, detail)
    }

    pub fn poor_quality(detail: impl Into<String>) -> Self {
        Self::new(FitFailureReason::PoorQuality, detail)
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        let exit_code = match &err {
            ProfileError::InsufficientData { .. } => 3,
            ProfileError::DispersionUnavailable(_)
            | ProfileError::OutOfRangeQuery { .. }
            | ProfileError::NonPositiveWidth { .. } => 4,
            _ => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_maps_to_exit_code_3() {
        let err: AppError = ProfileError::InsufficientData { usable: 0 }.into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("0 usable"));
    }

    #[test]
    fn fit_failure_display_names_reason() {
        let failure = FitFailure::poor_quality("relative rms 0.3 > 0.05");
        assert_eq!(failure.to_string(), "poor_quality: relative rms 0.3 > 0.05");
    }
}
