use faer::Mat;

use crate::svd::static_svd;
use crate::types::{Basis, BasisError, StaticSvdOptions};

/// One time interval: the snapshots taken since `start_time` and their
/// cached basis.
///
/// Snapshots are stored column-major, one column per accepted sample in
/// acceptance order. The cached basis is dropped whenever a column is
/// appended.
#[derive(Debug, Clone)]
pub struct TimeInterval {
    start_time: f64,
    dim: usize,
    states: Vec<f64>,
    rhs: Option<Vec<f64>>,
    num_samples: usize,
    closed: bool,
    basis: Option<Basis>,
}

impl TimeInterval {
    /// Open an empty interval starting at `start_time`.
    pub fn new(start_time: f64, dim: usize) -> Self {
        Self {
            start_time,
            dim,
            states: Vec::new(),
            rhs: None,
            num_samples: 0,
            closed: false,
            basis: None,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Freeze the interval; no further columns may be appended.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the cached basis reflects every column.
    pub fn has_basis(&self) -> bool {
        self.basis.is_some()
    }

    /// Append one snapshot (and its right-hand side) as a new column.
    ///
    /// All columns of an interval either carry a right-hand side or none do.
    pub fn push(&mut self, state: &[f64], rhs: Option<&[f64]>) -> Result<(), BasisError> {
        if self.closed {
            return Err(BasisError::InvalidArgument(
                "cannot append to a closed time interval".to_string(),
            ));
        }
        match rhs {
            Some(r) if self.num_samples == 0 => self.rhs = Some(r.to_vec()),
            Some(r) => match self.rhs.as_mut() {
                Some(stored) => stored.extend_from_slice(r),
                None => return Err(mixed_rhs()),
            },
            None if self.rhs.is_some() => return Err(mixed_rhs()),
            None => {}
        }
        self.states.extend_from_slice(state);
        self.num_samples += 1;
        self.basis = None;
        Ok(())
    }

    /// The snapshot matrix (n × k).
    pub fn snapshot_matrix(&self) -> Mat<f64> {
        column_major_mat(self.dim, self.num_samples, &self.states)
    }

    /// The right-hand-side matrix (n × k), if right-hand sides were sampled.
    pub fn rhs_matrix(&self) -> Option<Mat<f64>> {
        self.rhs
            .as_ref()
            .map(|data| column_major_mat(self.dim, self.num_samples, data))
    }

    /// Recompute the basis if the snapshot matrix changed since the last
    /// computation.
    pub fn refresh(&mut self, options: &StaticSvdOptions, index: usize) -> Result<(), BasisError> {
        if self.basis.is_none() {
            let basis = static_svd(&self.snapshot_matrix(), options, index)?;
            self.basis = Some(basis);
        }
        Ok(())
    }

    /// The cached basis, computing it first if needed.
    pub fn basis(
        &mut self,
        options: &StaticSvdOptions,
        index: usize,
    ) -> Result<&Basis, BasisError> {
        self.refresh(options, index)?;
        self.basis.as_ref().ok_or(BasisError::EmptyInterval(index))
    }
}

fn mixed_rhs() -> BasisError {
    BasisError::InvalidArgument(
        "right-hand side must be supplied for all or none of an interval's samples".to_string(),
    )
}

fn column_major_mat(nrows: usize, ncols: usize, data: &[f64]) -> Mat<f64> {
    Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_appends_columns_in_order() {
        let mut interval = TimeInterval::new(0.0, 2);
        interval.push(&[1.0, 2.0], None).unwrap();
        interval.push(&[3.0, 4.0], None).unwrap();
        let m = interval.snapshot_matrix();
        assert_eq!((m.nrows(), m.ncols()), (2, 2));
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m[(1, 1)], 4.0);
        assert!(interval.rhs_matrix().is_none());
    }

    #[test]
    fn test_rhs_tracked_alongside_state() {
        let mut interval = TimeInterval::new(1.0, 2);
        interval.push(&[1.0, 0.0], Some(&[0.5, 0.5])).unwrap();
        interval.push(&[0.0, 1.0], Some(&[0.25, 0.75])).unwrap();
        let rhs = interval.rhs_matrix().unwrap();
        assert_eq!(rhs.ncols(), 2);
        assert_eq!(rhs[(1, 1)], 0.75);
    }

    #[test]
    fn test_mixed_rhs_rejected() {
        let mut interval = TimeInterval::new(0.0, 1);
        interval.push(&[1.0], None).unwrap();
        assert!(interval.push(&[2.0], Some(&[0.0])).is_err());

        let mut interval = TimeInterval::new(0.0, 1);
        interval.push(&[1.0], Some(&[0.0])).unwrap();
        assert!(interval.push(&[2.0], None).is_err());
        assert_eq!(interval.num_samples(), 1);
    }

    #[test]
    fn test_push_invalidates_basis() {
        let options = StaticSvdOptions::new(2);
        let mut interval = TimeInterval::new(0.0, 2);
        interval.push(&[1.0, 0.0], None).unwrap();
        assert_eq!(interval.basis(&options, 0).unwrap().rank(), 1);
        assert!(interval.has_basis());

        interval.push(&[0.0, 1.0], None).unwrap();
        assert!(!interval.has_basis());
        assert_eq!(interval.basis(&options, 0).unwrap().rank(), 2);
    }

    #[test]
    fn test_closed_interval_is_frozen() {
        let mut interval = TimeInterval::new(0.0, 1);
        interval.push(&[1.0], None).unwrap();
        interval.close();
        assert!(interval.push(&[2.0], None).is_err());
        assert_eq!(interval.num_samples(), 1);
    }

    #[test]
    fn test_empty_interval_basis_fails() {
        let mut interval = TimeInterval::new(0.0, 3);
        let err = interval.basis(&StaticSvdOptions::new(3), 4).unwrap_err();
        assert!(matches!(err, BasisError::EmptyInterval(4)));
    }
}
