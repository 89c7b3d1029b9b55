use crate::types::{BasisError, StaticSvdOptions};

/// Decides when a snapshot should be captured.
///
/// Implementations carry only their own step-size state; the snapshots
/// themselves live in the generator.
pub trait SvdSampler {
    /// Whether a sample should be taken at `time`.
    fn is_next_sample(&self, time: f64) -> bool;

    /// Time at which the next sample should be considered, given the state
    /// (and right-hand side) at `time`.
    fn compute_next_sample_time(&mut self, state: &[f64], rhs: Option<&[f64]>, time: f64) -> f64;

    /// Replace the sample time step. A step that is not positive and
    /// finite is rejected and the current one kept.
    fn reset_dt(&mut self, new_dt: f64) -> Result<(), BasisError>;

    /// Current sample time step.
    fn dt(&self) -> f64;
}

/// Sampler for the static SVD approach: every state is sampled.
#[derive(Debug)]
pub struct StaticSvdSampler {
    dt: f64,
}

impl StaticSvdSampler {
    /// Create a static sampler from validated options.
    pub fn new(options: &StaticSvdOptions) -> Result<Self, BasisError> {
        options.validate()?;
        Ok(Self {
            dt: options.sample_dt,
        })
    }
}

impl SvdSampler for StaticSvdSampler {
    fn is_next_sample(&self, _time: f64) -> bool {
        true
    }

    fn compute_next_sample_time(
        &mut self,
        _state: &[f64],
        _rhs: Option<&[f64]>,
        time: f64,
    ) -> f64 {
        time
    }

    fn reset_dt(&mut self, new_dt: f64) -> Result<(), BasisError> {
        if !(new_dt.is_finite() && new_dt > 0.0) {
            return Err(BasisError::InvalidArgument(format!(
                "sample time step must be positive, got {new_dt}"
            )));
        }
        self.dt = new_dt;
        Ok(())
    }

    fn dt(&self) -> f64 {
        self.dt
    }
}
