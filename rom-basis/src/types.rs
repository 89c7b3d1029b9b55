use faer::Mat;
use serde::{Deserialize, Serialize};

/// Error types for basis generation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum BasisError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("time interval {0} has no snapshots")]
    EmptyInterval(usize),

    #[error("SVD computation failed: {0}")]
    SvdFailed(String),

    #[error("time interval {index} out of range (have {count})")]
    InvalidInterval { index: usize, count: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// How the number of retained singular vectors is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Truncation {
    /// Keep up to `max_basis_dimension` vectors.
    FixedRank,
    /// Keep the fewest leading vectors whose squared singular values reach
    /// this fraction of the total squared sum.
    EnergyFraction(f64),
}

/// Configuration for static SVD sampling and basis generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSvdOptions {
    /// Problem dimension (length of each state vector).
    pub dim: usize,
    /// Initial sample time step.
    pub sample_dt: f64,
    /// Upper bound on the basis rank of any interval.
    pub max_basis_dimension: usize,
    /// Rank selection rule.
    pub truncation: Truncation,
    /// Snapshots per time interval. None for a single unbounded interval.
    pub samples_per_time_interval: Option<usize>,
    /// Cap on the number of time intervals. None for unbounded.
    pub max_time_intervals: Option<usize>,
    /// Singular values at or below this are treated as zero.
    pub singular_value_tol: f64,
    /// Keep the truncated right singular vectors in each basis.
    pub compute_temporal_basis: bool,
}

impl Default for StaticSvdOptions {
    fn default() -> Self {
        Self {
            dim: 1,
            sample_dt: 1.0,
            max_basis_dimension: usize::MAX,
            truncation: Truncation::FixedRank,
            samples_per_time_interval: None,
            max_time_intervals: None,
            singular_value_tol: 0.0,
            compute_temporal_basis: false,
        }
    }
}

impl StaticSvdOptions {
    /// Options for an `dim`-dimensional problem with everything else default.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<(), BasisError> {
        if self.dim == 0 {
            return Err(BasisError::Configuration(
                "dimension must be positive".to_string(),
            ));
        }
        if !(self.sample_dt.is_finite() && self.sample_dt > 0.0) {
            return Err(BasisError::Configuration(format!(
                "sample time step must be positive, got {}",
                self.sample_dt
            )));
        }
        if self.max_basis_dimension == 0 {
            return Err(BasisError::Configuration(
                "max basis dimension must be at least 1".to_string(),
            ));
        }
        if let Truncation::EnergyFraction(f) = self.truncation {
            if !(f > 0.0 && f <= 1.0) {
                return Err(BasisError::Configuration(format!(
                    "energy fraction must lie in (0, 1], got {f}"
                )));
            }
        }
        if self.samples_per_time_interval == Some(0) {
            return Err(BasisError::Configuration(
                "samples per time interval must be at least 1".to_string(),
            ));
        }
        if self.max_time_intervals == Some(0) {
            return Err(BasisError::Configuration(
                "max time intervals must be at least 1".to_string(),
            ));
        }
        if !(self.singular_value_tol.is_finite() && self.singular_value_tol >= 0.0) {
            return Err(BasisError::Configuration(format!(
                "singular value tolerance must be non-negative, got {}",
                self.singular_value_tol
            )));
        }
        Ok(())
    }
}

/// Truncated SVD of one time interval's snapshot matrix.
#[derive(Debug, Clone)]
pub struct Basis {
    /// Left singular vectors (n × r), the spatial basis.
    pub u: Mat<f64>,
    /// Retained singular values (r), non-increasing.
    pub s: Vec<f64>,
    /// Right singular vectors (k × r), if requested.
    pub v: Option<Mat<f64>>,
    /// Every singular value of the snapshot matrix, before truncation.
    pub spectrum: Vec<f64>,
}

impl Basis {
    /// Truncated rank r.
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Problem dimension n.
    pub fn dim(&self) -> usize {
        self.u.nrows()
    }
}
