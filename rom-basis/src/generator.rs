use std::ops::Range;

use faer::Mat;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::interval::TimeInterval;
use crate::sampler::{StaticSvdSampler, SvdSampler};
use crate::types::{Basis, BasisError, StaticSvdOptions};
use crate::utils::validate_vector;

/// Accumulates snapshots into time intervals and produces one truncated
/// SVD basis per interval.
///
/// The sampler decides when a sample is due; the generator owns every
/// interval for its whole lifetime. Intervals are only ever appended.
///
/// ```rust
/// use rom_basis::{StaticSvdOptions, SvdBasisGenerator};
///
/// let options = StaticSvdOptions {
///     samples_per_time_interval: Some(2),
///     ..StaticSvdOptions::new(3)
/// };
/// let mut generator = SvdBasisGenerator::new(options).unwrap();
/// for step in 0..5 {
///     let t = step as f64;
///     if generator.is_next_sample(t) {
///         let state = [t.sin(), t.cos(), 1.0];
///         generator.take_sample(&state, None, t).unwrap();
///     }
/// }
/// assert_eq!(generator.num_intervals(), 3);
/// assert_eq!(generator.spatial_basis(0).unwrap().nrows(), 3);
/// ```
#[derive(Debug)]
pub struct SvdBasisGenerator<S: SvdSampler = StaticSvdSampler> {
    options: StaticSvdOptions,
    sampler: S,
    intervals: Vec<TimeInterval>,
    last_sample_time: Option<f64>,
}

impl SvdBasisGenerator<StaticSvdSampler> {
    /// Generator using the static (sample everything) policy.
    pub fn new(options: StaticSvdOptions) -> Result<Self, BasisError> {
        let sampler = StaticSvdSampler::new(&options)?;
        Self::with_sampler(options, sampler)
    }
}

impl<S: SvdSampler> SvdBasisGenerator<S> {
    /// Generator using a caller-supplied sampling policy.
    pub fn with_sampler(options: StaticSvdOptions, sampler: S) -> Result<Self, BasisError> {
        options.validate()?;
        Ok(Self {
            options,
            sampler,
            intervals: Vec::new(),
            last_sample_time: None,
        })
    }

    pub fn options(&self) -> &StaticSvdOptions {
        &self.options
    }

    /// Problem dimension n.
    pub fn dim(&self) -> usize {
        self.options.dim
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Whether a sample should be taken at `time`.
    pub fn is_next_sample(&self, time: f64) -> bool {
        self.sampler.is_next_sample(time)
    }

    /// Time at which the next sample should be considered.
    pub fn compute_next_sample_time(
        &mut self,
        state: &[f64],
        rhs: Option<&[f64]>,
        time: f64,
    ) -> f64 {
        self.sampler.compute_next_sample_time(state, rhs, time)
    }

    /// Replace the sampler's time step.
    pub fn reset_dt(&mut self, new_dt: f64) -> Result<(), BasisError> {
        self.sampler.reset_dt(new_dt)
    }

    /// Add a snapshot taken at `time`.
    ///
    /// Opens a new interval when there is none yet, when the current one
    /// is closed, or when it already holds `samples_per_time_interval`
    /// columns. Returns `Ok(false)` without storing anything if that would
    /// exceed `max_time_intervals`.
    pub fn take_sample(
        &mut self,
        state: &[f64],
        rhs: Option<&[f64]>,
        time: f64,
    ) -> Result<bool, BasisError> {
        let dim = self.options.dim;
        validate_vector(state, dim, "state")?;
        if let Some(r) = rhs {
            validate_vector(r, dim, "right-hand side")?;
        }
        if !time.is_finite() {
            return Err(BasisError::InvalidArgument(format!(
                "sample time must be finite, got {time}"
            )));
        }
        if let Some(last) = self.last_sample_time {
            if time < last {
                return Err(BasisError::InvalidArgument(format!(
                    "sample time {time} precedes previous sample time {last}"
                )));
            }
        }

        if self.is_new_time_interval() {
            let count = self.intervals.len();
            if self.options.max_time_intervals.is_some_and(|max| count >= max) {
                warn!(time, intervals = count, "time interval limit reached, sample rejected");
                return Ok(false);
            }
            if let Some(prev_start) = self.intervals.last().map(TimeInterval::start_time) {
                if time <= prev_start {
                    return Err(BasisError::InvalidArgument(format!(
                        "new time interval at {time} does not follow interval start {prev_start}"
                    )));
                }
            }
            self.end_samples();
            debug!(interval = count, start_time = time, "opened time interval");
            self.intervals.push(TimeInterval::new(time, dim));
        }

        let index = self.intervals.len() - 1;
        self.intervals[index].push(state, rhs)?;
        self.last_sample_time = Some(time);
        Ok(true)
    }

    /// Close the current interval so that it counts as final; the next
    /// sample opens a new interval.
    pub fn end_samples(&mut self) {
        if let Some(current) = self.intervals.last_mut() {
            current.close();
        }
    }

    fn is_new_time_interval(&self) -> bool {
        match self.intervals.last() {
            None => true,
            Some(current) => {
                current.is_closed()
                    || self
                        .options
                        .samples_per_time_interval
                        .is_some_and(|max| current.num_samples() >= max)
            }
        }
    }

    /// Number of intervals created so far, open or closed.
    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    fn interval(&self, index: usize) -> Result<&TimeInterval, BasisError> {
        self.intervals.get(index).ok_or(BasisError::InvalidInterval {
            index,
            count: self.intervals.len(),
        })
    }

    pub fn interval_start_time(&self, index: usize) -> Result<f64, BasisError> {
        Ok(self.interval(index)?.start_time())
    }

    pub fn num_samples(&self, index: usize) -> Result<usize, BasisError> {
        Ok(self.interval(index)?.num_samples())
    }

    /// Whether the interval is final: superseded by a newer interval or
    /// closed by `end_samples`.
    pub fn is_closed(&self, index: usize) -> Result<bool, BasisError> {
        Ok(self.interval(index)?.is_closed())
    }

    pub fn snapshot_matrix(&self, index: usize) -> Result<Mat<f64>, BasisError> {
        Ok(self.interval(index)?.snapshot_matrix())
    }

    pub fn rhs_matrix(&self, index: usize) -> Result<Option<Mat<f64>>, BasisError> {
        Ok(self.interval(index)?.rhs_matrix())
    }

    /// Basis of an interval, recomputed if snapshots were added since the
    /// last computation.
    pub fn basis(&mut self, index: usize) -> Result<&Basis, BasisError> {
        let count = self.intervals.len();
        let options = &self.options;
        let interval = self
            .intervals
            .get_mut(index)
            .ok_or(BasisError::InvalidInterval { index, count })?;
        interval.basis(options, index)
    }

    /// Left singular vectors (n × r) of an interval.
    pub fn spatial_basis(&mut self, index: usize) -> Result<&Mat<f64>, BasisError> {
        Ok(&self.basis(index)?.u)
    }

    /// Retained singular values of an interval.
    pub fn singular_values(&mut self, index: usize) -> Result<&[f64], BasisError> {
        Ok(&self.basis(index)?.s)
    }

    /// Right singular vectors (k × r), when `compute_temporal_basis` is set.
    pub fn temporal_basis(&mut self, index: usize) -> Result<Option<&Mat<f64>>, BasisError> {
        Ok(self.basis(index)?.v.as_ref())
    }

    /// Bring the bases of `range` up to date, computing them in parallel.
    pub fn refresh_bases(&mut self, range: Range<usize>) -> Result<(), BasisError> {
        let count = self.intervals.len();
        if range.start > range.end {
            return Err(BasisError::InvalidArgument(format!(
                "interval range {}..{} is reversed",
                range.start, range.end
            )));
        }
        if range.end > count {
            return Err(BasisError::InvalidInterval {
                index: range.end - 1,
                count,
            });
        }
        let options = &self.options;
        let start = range.start;
        self.intervals[range]
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(offset, interval)| interval.refresh(options, start + offset))
    }
}
