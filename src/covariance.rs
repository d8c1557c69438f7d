//! # Covariance helpers
//!
//! Small numerical utilities shared by every stage that touches a joint covariance:
//! invariant checks (symmetry, finiteness, positive semi-definiteness), principal sub-matrix
//! extraction and block-diagonal assembly.
//!
//! All matrices are dense [`DMatrix<f64>`]; observable vectors are [`DVector<f64>`].
use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{PSD_EPS, SYMMETRY_EPS},
    prep_errors::PrepError,
};

/// Check that `cov` is square, symmetric within [`SYMMETRY_EPS`] (relative to the largest
/// magnitude of the pair), has no NaN/Inf entry, a non-negative diagonal and no eigenvalue
/// below `-PSD_EPS * max(1, max|λ|)`.
///
/// Arguments
/// -----------------
/// * `cov`: the covariance matrix to validate.
/// * `context`: object name or stage, used in the error message.
///
/// Return
/// ----------
/// * `Ok(())` if every invariant holds, otherwise [`PrepError::InvalidParameter`]
///   (or [`PrepError::SchemaMismatch`] for a non-square matrix).
pub fn check_covariance(cov: &DMatrix<f64>, context: &str) -> Result<(), PrepError> {
    if cov.nrows() != cov.ncols() {
        return Err(PrepError::SchemaMismatch(format!(
            "{context}: covariance is {}x{}, expected a square matrix",
            cov.nrows(),
            cov.ncols()
        )));
    }
    if let Some(bad) = cov.iter().find(|x| !x.is_finite()) {
        return Err(PrepError::InvalidParameter(format!(
            "{context}: covariance contains a non-finite entry ({bad})"
        )));
    }
    let n = cov.nrows();
    for i in 0..n {
        if cov[(i, i)] < 0.0 {
            return Err(PrepError::InvalidParameter(format!(
                "{context}: negative variance {} at index {i}",
                cov[(i, i)]
            )));
        }
        for j in (i + 1)..n {
            let (a, b) = (cov[(i, j)], cov[(j, i)]);
            let scale = a.abs().max(b.abs()).max(1.0);
            if (a - b).abs() > SYMMETRY_EPS * scale {
                return Err(PrepError::InvalidParameter(format!(
                    "{context}: covariance is not symmetric at ({i}, {j}): {a} != {b}"
                )));
            }
        }
    }
    if n == 0 {
        return Ok(());
    }

    let eigenvalues = cov.clone().symmetric_eigen().eigenvalues;
    let scale = eigenvalues.amax().max(1.0);
    match eigenvalues.iter().copied().find(|&l| l < -PSD_EPS * scale) {
        Some(lambda) => Err(PrepError::InvalidParameter(format!(
            "{context}: covariance is not positive semi-definite (eigenvalue {lambda})"
        ))),
        None => Ok(()),
    }
}

/// Check that every entry of `values` is finite.
pub fn check_finite_vector(values: &DVector<f64>, context: &str) -> Result<(), PrepError> {
    match values.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(PrepError::InvalidParameter(format!(
            "{context}: observable {i} is not finite ({})",
            values[i]
        ))),
        None => Ok(()),
    }
}

/// Extract the principal sub-matrix `cov[idx, :][:, idx]`.
///
/// For a multivariate Gaussian this is exactly the marginal covariance of the kept variables;
/// no conditioning is performed. The caller is responsible for `idx` being in range.
pub fn principal_submatrix(cov: &DMatrix<f64>, idx: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(idx.len(), idx.len(), |r, c| cov[(idx[r], idx[c])])
}

/// Select `values[idx]` in the order given by `idx`.
pub fn select_entries(values: &DVector<f64>, idx: &[usize]) -> DVector<f64> {
    DVector::from_iterator(idx.len(), idx.iter().map(|&i| values[i]))
}

/// Assemble `blockdiag(head, diag(tail_variances))`.
///
/// Used to append independently measured host properties (mass, ages) to a fit covariance:
/// the appended variables carry no correlation with the light-curve parameters.
pub fn append_diagonal(head: &DMatrix<f64>, tail_variances: &[f64]) -> DMatrix<f64> {
    let n = head.nrows();
    let total = n + tail_variances.len();
    let mut out = DMatrix::zeros(total, total);
    out.view_mut((0, 0), (n, n)).copy_from(head);
    for (k, var) in tail_variances.iter().enumerate() {
        out[(n + k, n + k)] = *var;
    }
    out
}

/// Force exact symmetry by averaging `cov` with its transpose.
pub fn symmetrize(cov: &DMatrix<f64>) -> DMatrix<f64> {
    (cov + cov.transpose()) * 0.5
}
