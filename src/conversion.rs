//! # Unit conversions
//!
//! Two families of conversions live here:
//!
//! * **Flux → magnitude** for the light-curve amplitude (SALT2 `x0`, SNEMO `c0`), with
//!   first-order (delta-method) propagation of the joint covariance through the Jacobian of
//!   `m = -2.5 log10(A) + const`.
//! * **Sexagesimal sky coordinates** (`HH MM SS.ss`, `±DD MM SS.s`, space or colon separated)
//!   to decimal degrees, for metadata tables that publish positions as strings.
//!
//! ## Covariance propagation
//!
//! Only one variable is transformed nonlinearly, so the Jacobian is the identity except for a
//! single diagonal entry `J = -2.5 / (ln(10) · A)`. Hence
//!
//! ```text
//! C'[i, i] = J² · C[i, i]
//! C'[i, j] = J  · C[i, j]     (j ≠ i, and symmetrically C'[j, i])
//! C'[j, k] = C[j, k]          (j, k ≠ i)
//! ```
use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{Degree, Magnitude, POGSON},
    covariance::check_finite_vector,
    prep_errors::PrepError,
};

/// How the magnitude value itself is obtained from a fit.
///
/// The covariance is always propagated through the logarithmic Jacobian of the amplitude;
/// this only chooses where the central value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MagnitudeModel {
    /// `m = -2.5 log10(A) + zero_point`
    ZeroPoint(f64),
    /// The peak magnitude was synthesized by the external fitting routine (e.g. a rest-frame
    /// band magnitude of the fitted spectral model) and is carried on the fit result.
    External,
}

/// Jacobian factor `dm/dA = -2.5 / (ln(10) · A)`.
///
/// Return
/// ----------
/// * [`PrepError::InvalidParameter`] if `amplitude` is not strictly positive and finite.
pub fn magnitude_jacobian(amplitude: f64) -> Result<f64, PrepError> {
    check_amplitude(amplitude)?;
    Ok(-POGSON / (std::f64::consts::LN_10 * amplitude))
}

/// `m = -2.5 log10(A) + zero_point`, failing on non-positive amplitudes.
pub fn flux_to_magnitude(amplitude: f64, zero_point: f64) -> Result<Magnitude, PrepError> {
    check_amplitude(amplitude)?;
    Ok(-POGSON * amplitude.log10() + zero_point)
}

fn check_amplitude(amplitude: f64) -> Result<(), PrepError> {
    if !amplitude.is_finite() || amplitude <= 0.0 {
        return Err(PrepError::InvalidParameter(format!(
            "amplitude must be strictly positive for the magnitude transform, got {amplitude}"
        )));
    }
    Ok(())
}

/// Replace the amplitude at `index` by a magnitude and propagate the covariance.
///
/// Arguments
/// -----------------
/// * `values`: the fitted parameter vector.
/// * `cov`: the joint covariance aligned with `values`.
/// * `index`: position of the amplitude parameter.
/// * `model`: where the magnitude value comes from (see [`MagnitudeModel`]).
/// * `external`: the externally synthesized magnitude, required by [`MagnitudeModel::External`].
///
/// Return
/// ----------
/// * `(values', cov')` with `values'[index]` in magnitudes and `cov'` propagated at first order.
///
/// Errors
/// ----------
/// * [`PrepError::SchemaMismatch`] if `cov` is not `len × len` or `index` is out of range.
/// * [`PrepError::InvalidParameter`] if the amplitude is not strictly positive, the external
///   magnitude is missing, or any output entry is not finite.
pub fn convert_amplitude(
    values: &DVector<f64>,
    cov: &DMatrix<f64>,
    index: usize,
    model: &MagnitudeModel,
    external: Option<Magnitude>,
) -> Result<(DVector<f64>, DMatrix<f64>), PrepError> {
    let n = values.len();
    if cov.nrows() != n || cov.ncols() != n {
        return Err(PrepError::SchemaMismatch(format!(
            "parameter vector has {n} entries but covariance is {}x{}",
            cov.nrows(),
            cov.ncols()
        )));
    }
    if index >= n {
        return Err(PrepError::SchemaMismatch(format!(
            "amplitude index {index} out of range for {n} parameters"
        )));
    }

    let amplitude = values[index];
    let jac = magnitude_jacobian(amplitude)?;
    let magnitude = match model {
        MagnitudeModel::ZeroPoint(zp) => flux_to_magnitude(amplitude, *zp)?,
        MagnitudeModel::External => external.ok_or_else(|| {
            PrepError::InvalidParameter(
                "external magnitude model selected but no peak magnitude was provided".into(),
            )
        })?,
    };

    let mut out_values = values.clone();
    out_values[index] = magnitude;

    let mut out_cov = cov.clone();
    for j in 0..n {
        if j != index {
            out_cov[(index, j)] *= jac;
            out_cov[(j, index)] *= jac;
        }
    }
    out_cov[(index, index)] *= jac * jac;

    check_finite_vector(&out_values, "magnitude conversion")?;
    if out_cov.iter().any(|x| !x.is_finite()) {
        return Err(PrepError::InvalidParameter(
            "magnitude conversion produced a non-finite covariance entry".into(),
        ));
    }
    Ok((out_values, out_cov))
}

/// Split a sexagesimal string on whitespace or colons into exactly three fields.
fn sexagesimal_fields(input: &str) -> Option<[&str; 3]> {
    let parts: Vec<&str> = input
        .split(|c: char| c.is_whitespace() || c == ':')
        .filter(|s| !s.is_empty())
        .collect();
    match parts.as_slice() {
        [a, b, c] => Some([*a, *b, *c]),
        _ => None,
    }
}

/// Parse a right ascension string to degrees
///
/// Arguments
/// ---------
/// * `ra`: a string representing the right ascension as `HH MM SS.SS` or `HH:MM:SS.SS`
///
/// Returns
/// -------
/// * `Option<Degree>`: the right ascension in degrees, `None` if the input format is invalid.
pub fn parse_ra_to_deg(ra: &str) -> Option<Degree> {
    let [h, m, s] = sexagesimal_fields(ra)?;
    let h: f64 = h.parse().ok()?;
    let m: f64 = m.parse().ok()?;
    let s: f64 = s.parse().ok()?;
    Some((h + m / 60.0 + s / 3600.0) * 15.0)
}

/// Parse a declination string to degrees
///
/// Arguments
/// ---------
/// * `dec`: a string representing the declination as `±DD MM SS.SS` or `±DD:MM:SS.SS`
///
/// Returns
/// -------
/// * `Option<Degree>`: the declination in degrees, `None` if the input format is invalid.
pub fn parse_dec_to_deg(dec: &str) -> Option<Degree> {
    let [d, m, s] = sexagesimal_fields(dec)?;
    let sign = if d.starts_with('-') { -1.0 } else { 1.0 };
    let d: f64 = d.trim_start_matches(&['-', '+'][..]).parse().ok()?;
    let m: f64 = m.parse().ok()?;
    let s: f64 = s.parse().ok()?;
    Some(sign * (d + m / 60.0 + s / 3600.0))
}

#[cfg(test)]
mod conversion_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flux_to_magnitude() {
        assert_relative_eq!(flux_to_magnitude(1.0, 10.63).unwrap(), 10.63);
        assert_relative_eq!(flux_to_magnitude(1e-4, 0.0).unwrap(), 10.0, epsilon = 1e-12);
        assert!(matches!(
            flux_to_magnitude(0.0, 10.63),
            Err(PrepError::InvalidParameter(_))
        ));
        assert!(matches!(
            flux_to_magnitude(-1e-5, 10.63),
            Err(PrepError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_convert_amplitude_jacobian_applied_once() {
        let a = 2.0e-5;
        let values = DVector::from_vec(vec![a, 0.5, -0.05]);
        let cov = DMatrix::from_row_slice(
            3,
            3,
            &[
                1e-12, 2e-8, 3e-9, //
                2e-8, 0.09, 0.001, //
                3e-9, 0.001, 0.0016,
            ],
        );
        let (v, c) = convert_amplitude(&values, &cov, 0, &MagnitudeModel::ZeroPoint(10.63), None)
            .unwrap();
        let jac = -2.5 / (std::f64::consts::LN_10 * a);

        assert_relative_eq!(v[0], -2.5 * a.log10() + 10.63, epsilon = 1e-12);
        assert_eq!(v[1], 0.5);
        assert_eq!(v[2], -0.05);

        assert_relative_eq!(c[(0, 0)], 1e-12 * jac * jac, max_relative = 1e-12);
        assert_relative_eq!(c[(0, 1)], 2e-8 * jac, max_relative = 1e-12);
        assert_relative_eq!(c[(1, 0)], 2e-8 * jac, max_relative = 1e-12);
        assert_relative_eq!(c[(2, 0)], 3e-9 * jac, max_relative = 1e-12);
        assert_eq!(c[(1, 2)], 0.001);
        assert_eq!(c[(1, 1)], 0.09);
        assert_eq!(c, c.transpose());
    }

    #[test]
    fn test_convert_amplitude_external_magnitude() {
        let values = DVector::from_vec(vec![0.3, 1.2]);
        let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![1e-4, 0.04]));
        let (v, _) =
            convert_amplitude(&values, &cov, 0, &MagnitudeModel::External, Some(15.2)).unwrap();
        assert_eq!(v[0], 15.2);

        assert!(matches!(
            convert_amplitude(&values, &cov, 0, &MagnitudeModel::External, None),
            Err(PrepError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_convert_amplitude_rejects_bad_input() {
        let values = DVector::from_vec(vec![-0.3, 1.2]);
        let cov = DMatrix::identity(2, 2);
        assert!(matches!(
            convert_amplitude(&values, &cov, 0, &MagnitudeModel::ZeroPoint(10.63), None),
            Err(PrepError::InvalidParameter(_))
        ));
        let values = DVector::from_vec(vec![0.3, 1.2]);
        assert!(matches!(
            convert_amplitude(
                &values,
                &DMatrix::identity(3, 3),
                0,
                &MagnitudeModel::External,
                Some(1.0),
            ),
            Err(PrepError::SchemaMismatch(_))
        ));
        assert!(matches!(
            convert_amplitude(&values, &cov, 2, &MagnitudeModel::External, Some(1.0)),
            Err(PrepError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_ra_to_deg() {
        assert_relative_eq!(parse_ra_to_deg("22 52 23.37").unwrap(), 343.097375, epsilon = 1e-9);
        assert_relative_eq!(
            parse_ra_to_deg("23:58:57.68").unwrap(),
            359.7403333333333,
            epsilon = 1e-9
        );
        assert_relative_eq!(parse_ra_to_deg("04 41 04.77").unwrap(), 70.269875, epsilon = 1e-9);
        assert_eq!(parse_ra_to_deg("1 2 3.4.5"), None);
        assert_eq!(parse_ra_to_deg("1 2"), None);
    }

    #[test]
    fn test_dec_to_deg() {
        assert_relative_eq!(
            parse_dec_to_deg("-00 30 14.2").unwrap(),
            -0.5039444444444444,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            parse_dec_to_deg("+13:55:42.7").unwrap(),
            13.928527777777777,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            parse_dec_to_deg("89 15 50.2").unwrap(),
            89.26394444444445,
            epsilon = 1e-9
        );
        assert_eq!(parse_dec_to_deg("89 15 50.2.3"), None);
        assert_eq!(parse_dec_to_deg("89 15"), None);
    }
}
