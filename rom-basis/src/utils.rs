use faer::Mat;

use crate::types::{BasisError, Truncation};

/// Validate that a vector has the expected length and contains no NaN/Inf.
pub fn validate_vector(x: &[f64], dim: usize, what: &str) -> Result<(), BasisError> {
    if x.len() != dim {
        return Err(BasisError::InvalidArgument(format!(
            "{what} has length {}, expected {dim}",
            x.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(BasisError::InvalidArgument(format!(
            "{what} contains NaN or Inf values"
        )));
    }
    Ok(())
}

/// Determine truncation rank from non-increasing singular values.
///
/// Fixed-rank mode keeps `max_rank` values; energy mode keeps the fewest
/// leading values whose cumulative squared sum reaches `fraction` of the
/// total. Either count is then clamped by `max_rank` and by the number of
/// values strictly above `tol`.
pub fn determine_rank(
    singular_values: &[f64],
    truncation: Truncation,
    max_rank: usize,
    tol: f64,
) -> usize {
    let numerical_rank = singular_values.iter().take_while(|&&s| s > tol).count();

    let r = match truncation {
        Truncation::FixedRank => singular_values.len(),
        Truncation::EnergyFraction(fraction) => energy_rank(singular_values, fraction),
    };

    r.min(max_rank).min(numerical_rank)
}

/// Smallest count of leading values capturing `fraction` of the squared sum.
fn energy_rank(singular_values: &[f64], fraction: f64) -> usize {
    let total: f64 = singular_values.iter().map(|s| s * s).sum();
    if total == 0.0 {
        return 0;
    }
    let mut cumulative = 0.0;
    for (i, &s) in singular_values.iter().enumerate() {
        cumulative += s * s;
        if cumulative >= fraction * total {
            return i + 1;
        }
    }
    singular_values.len()
}

/// Largest entry of |UᵀU - I|.
pub fn orthonormality_error(u: &Mat<f64>) -> f64 {
    let gram = u.transpose() * u;
    let r = gram.nrows();
    let mut worst = 0.0_f64;
    for j in 0..r {
        for i in 0..r {
            let expected = if i == j { 1.0 } else { 0.0 };
            worst = worst.max((gram[(i, j)] - expected).abs());
        }
    }
    worst
}

/// Copy a matrix into a column-major vector.
pub fn to_column_major(m: &Mat<f64>) -> Vec<f64> {
    let mut data = Vec::with_capacity(m.nrows() * m.ncols());
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            data.push(m[(i, j)]);
        }
    }
    data
}

/// Rebuild a matrix from column-major data.
pub fn from_column_major(nrows: usize, ncols: usize, data: &[f64]) -> Result<Mat<f64>, BasisError> {
    if data.len() != nrows * ncols {
        return Err(BasisError::Storage(format!(
            "array of length {} does not fit a {nrows} x {ncols} matrix",
            data.len()
        )));
    }
    Ok(Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn test_validate_vector_ok() {
        assert!(validate_vector(&[1.0, 2.0, 3.0], 3, "state").is_ok());
    }

    #[test]
    fn test_validate_vector_wrong_length() {
        let err = validate_vector(&[1.0, 2.0], 3, "state").unwrap_err();
        assert!(matches!(err, BasisError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_vector_nan() {
        assert!(validate_vector(&[1.0, f64::NAN], 2, "rhs").is_err());
        assert!(validate_vector(&[f64::INFINITY, 0.0], 2, "rhs").is_err());
    }

    #[test]
    fn test_determine_rank_fixed() {
        let s = vec![10.0, 5.0, 1.0, 0.1];
        assert_eq!(determine_rank(&s, Truncation::FixedRank, 2, 0.0), 2);
        assert_eq!(determine_rank(&s, Truncation::FixedRank, 100, 0.0), 4);
    }

    #[test]
    fn test_determine_rank_tolerance_drops_small_values() {
        let s = vec![10.0, 5.0, 1e-14, 0.0];
        assert_eq!(determine_rank(&s, Truncation::FixedRank, 4, 1e-10), 2);
    }

    #[test]
    fn test_determine_rank_energy() {
        let s = vec![10.0, 5.0, 1.0, 0.1];
        let total: f64 = s.iter().map(|x| x * x).sum();
        let r = determine_rank(&s, Truncation::EnergyFraction(0.99), usize::MAX, 0.0);
        let captured: f64 = s.iter().take(r).map(|x| x * x).sum();
        let one_less: f64 = s.iter().take(r - 1).map(|x| x * x).sum();
        assert!(captured >= 0.99 * total);
        assert!(one_less < 0.99 * total);
    }

    #[test]
    fn test_determine_rank_energy_full() {
        let s = vec![3.0, 2.0, 1.0];
        assert_eq!(
            determine_rank(&s, Truncation::EnergyFraction(1.0), usize::MAX, 0.0),
            3
        );
    }

    #[test]
    fn test_determine_rank_all_zero() {
        let s = vec![0.0, 0.0];
        assert_eq!(determine_rank(&s, Truncation::EnergyFraction(0.5), 2, 0.0), 0);
        assert_eq!(determine_rank(&s, Truncation::FixedRank, 2, 0.0), 0);
    }

    #[test]
    fn test_orthonormality_identity() {
        let m = Mat::<f64>::identity(4, 2);
        assert_near(orthonormality_error(&m), 0.0, 1e-15);
    }

    #[test]
    fn test_column_major_layout() {
        let mut m = Mat::<f64>::zeros(2, 3);
        m[(0, 1)] = 1.0;
        m[(1, 2)] = 2.0;
        let data = to_column_major(&m);
        assert_eq!(data, vec![0.0, 0.0, 1.0, 0.0, 0.0, 2.0]);
        let back = from_column_major(2, 3, &data).unwrap();
        assert_eq!(back[(0, 1)], 1.0);
        assert_eq!(back[(1, 2)], 2.0);
        assert!(from_column_major(2, 2, &data).is_err());
    }
}
