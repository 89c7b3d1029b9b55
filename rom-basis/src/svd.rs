use faer::Mat;
use tracing::debug;

use crate::types::{Basis, BasisError, StaticSvdOptions};
use crate::utils::determine_rank;

/// Compute the truncated SVD of a snapshot matrix.
///
/// # Arguments
/// * `snapshots` - Snapshot matrix (n × k), columns are time-ordered states.
/// * `options` - Truncation settings (rank cap, energy fraction, tolerance).
///
/// # Algorithm
/// 1. Thin SVD: A = U Σ Vᵀ, singular values non-increasing
/// 2. Choose r from the truncation rule, capped by the rank cap and by the
///    count of singular values above `singular_value_tol`
/// 3. Keep the leading r columns of U (and V)
///
/// The interval index is only used to label an empty-matrix error.
pub fn static_svd(
    snapshots: &Mat<f64>,
    options: &StaticSvdOptions,
    interval: usize,
) -> Result<Basis, BasisError> {
    if snapshots.ncols() == 0 {
        return Err(BasisError::EmptyInterval(interval));
    }
    if snapshots.nrows() == 0 {
        return Err(BasisError::InvalidArgument(
            "snapshot matrix has no rows".to_string(),
        ));
    }

    let svd = snapshots
        .thin_svd()
        .map_err(|e| BasisError::SvdFailed(format!("{e:?}")))?;
    let u_full = svd.U();
    let v_full = svd.V();
    let s_col = svd.S().column_vector();

    let n_sv = s_col.nrows();
    let spectrum: Vec<f64> = (0..n_sv).map(|i| s_col[i]).collect();
    if spectrum.iter().any(|s| !s.is_finite()) {
        return Err(BasisError::SvdFailed(
            "decomposition produced non-finite singular values".to_string(),
        ));
    }

    let rank = determine_rank(
        &spectrum,
        options.truncation,
        options.max_basis_dimension,
        options.singular_value_tol,
    );

    let u = u_full.subcols(0, rank).to_owned();
    let v = options
        .compute_temporal_basis
        .then(|| v_full.subcols(0, rank).to_owned());
    let s = spectrum[..rank].to_vec();

    debug!(
        interval,
        rows = snapshots.nrows(),
        samples = snapshots.ncols(),
        rank,
        "computed truncated SVD"
    );

    Ok(Basis { u, s, v, spectrum })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Truncation;
    use crate::utils::orthonormality_error;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    /// Snapshots of a few travelling sinusoids on an n-point grid.
    fn make_snapshots(n: usize, k: usize) -> Mat<f64> {
        let mut a = Mat::<f64>::zeros(n, k);
        for j in 0..k {
            let t = j as f64 * 0.2;
            for i in 0..n {
                let x = i as f64 / n as f64;
                a[(i, j)] = (6.0 * x - t).sin() + 0.5 * (13.0 * x + 2.0 * t).cos();
            }
        }
        a
    }

    #[test]
    fn test_basis_orthonormal_and_sorted() {
        let a = make_snapshots(20, 8);
        let basis = static_svd(&a, &StaticSvdOptions::new(20), 0).unwrap();
        assert!(orthonormality_error(&basis.u) < 1e-10);
        for w in basis.s.windows(2) {
            assert!(w[0] >= w[1]);
        }
        assert_eq!(basis.spectrum.len(), 8);
    }

    #[test]
    fn test_fixed_rank_truncation() {
        let a = make_snapshots(10, 6);
        let options = StaticSvdOptions {
            max_basis_dimension: 2,
            ..StaticSvdOptions::new(10)
        };
        let basis = static_svd(&a, &options, 0).unwrap();
        assert_eq!(basis.rank(), 2);
        assert_eq!(basis.u.nrows(), 10);
        assert_eq!(basis.u.ncols(), 2);
        assert!(basis.v.is_none());
    }

    #[test]
    fn test_rank_capped_by_columns() {
        let a = make_snapshots(10, 3);
        let basis = static_svd(&a, &StaticSvdOptions::new(10), 0).unwrap();
        assert_eq!(basis.rank(), 3);
    }

    #[test]
    fn test_rank_capped_by_rows() {
        let a = make_snapshots(2, 9);
        let basis = static_svd(&a, &StaticSvdOptions::new(2), 0).unwrap();
        assert!(basis.rank() <= 2);
        assert_eq!(basis.u.nrows(), 2);
    }

    #[test]
    fn test_energy_truncation_minimal() {
        let a = make_snapshots(16, 10);
        let options = StaticSvdOptions {
            truncation: Truncation::EnergyFraction(0.9),
            ..StaticSvdOptions::new(16)
        };
        let basis = static_svd(&a, &options, 0).unwrap();
        let total: f64 = basis.spectrum.iter().map(|s| s * s).sum();
        let kept: f64 = basis.s.iter().map(|s| s * s).sum();
        let r = basis.rank();
        let one_less: f64 = basis.s[..r - 1].iter().map(|s| s * s).sum();
        assert!(kept >= 0.9 * total);
        assert!(one_less < 0.9 * total);
    }

    #[test]
    fn test_temporal_basis_shape() {
        let a = make_snapshots(12, 5);
        let options = StaticSvdOptions {
            compute_temporal_basis: true,
            max_basis_dimension: 3,
            ..StaticSvdOptions::new(12)
        };
        let basis = static_svd(&a, &options, 0).unwrap();
        let v = basis.v.as_ref().unwrap();
        assert_eq!(v.nrows(), 5);
        assert_eq!(v.ncols(), 3);
        assert!(orthonormality_error(v) < 1e-10);
    }

    #[test]
    fn test_rank_one_reconstruction() {
        // A = x yᵀ has a single singular value ‖x‖‖y‖.
        let x = [1.0, 2.0, 2.0];
        let y = [3.0, 4.0];
        let a = Mat::from_fn(3, 2, |i, j| x[i] * y[j]);
        let options = StaticSvdOptions {
            singular_value_tol: 1e-10,
            ..StaticSvdOptions::new(3)
        };
        let basis = static_svd(&a, &options, 0).unwrap();
        assert_eq!(basis.rank(), 1);
        assert_near(basis.s[0], 15.0, 1e-10);
        // Left vector is ±x/‖x‖.
        let sign = basis.u[(0, 0)].signum();
        for i in 0..3 {
            assert_near(sign * basis.u[(i, 0)], x[i] / 3.0, 1e-10);
        }
    }

    #[test]
    fn test_empty_matrix_fails() {
        let a = Mat::<f64>::zeros(4, 0);
        let err = static_svd(&a, &StaticSvdOptions::new(4), 7).unwrap_err();
        assert!(matches!(err, BasisError::EmptyInterval(7)));
    }
}
