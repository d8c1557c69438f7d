//! # Light-curve catalogs
//!
//! A [`Catalog`] is the output of one survey pipeline: a list of per-object
//! [`FitResult`]s sharing a single [`FitModel`]. One adapter covers every
//! `{survey} × {model}` combination, so JLA/CSP/Foundation fits with SALT2 or SNEMO feed the
//! same merger.
//!
//! ## From fits to observables
//!
//! [`Catalog::to_observables`] turns every fit into a light-curve block `[mB, shape...]`:
//!
//! 1. the object name is normalized with [`canonical_name`];
//! 2. the amplitude and shape parameters are selected from the fitted vector, together with the
//!    principal sub-matrix of the covariance (marginalizing the nuisance parameters such as `t0`),
//!    after rounding noise in the fitter's covariance has been symmetrized away;
//! 3. the amplitude is turned into a magnitude by
//!    [`convert_amplitude`](crate::conversion::convert_amplitude).
//!
//! A malformed fit (missing parameter, misaligned covariance) is fatal. A fit whose numbers
//! cannot be converted (non-positive amplitude, NaN/Inf, asymmetric covariance) is **excluded**:
//! it is reported in [`ConversionOutcome::excluded`] and logged, mirroring the NaN cut of the
//! survey scripts.
pub mod fit_model;
pub mod fit_result;
pub mod survey;

use nalgebra::{DMatrix, DVector};

use crate::{
    constants::ObjectName,
    conversion::convert_amplitude,
    covariance::{check_covariance, principal_submatrix, select_entries, symmetrize},
    prep_errors::PrepError,
};

pub use fit_model::FitModel;
pub use fit_result::FitResult;
pub use survey::{canonical_name, Survey};

/// Light-curve block of one object, before metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FitObservables {
    pub name: ObjectName,
    pub survey: Survey,
    pub values: DVector<f64>,
    pub cov: DMatrix<f64>,
}

/// Result of converting a whole catalog.
#[derive(Debug, Default)]
pub struct ConversionOutcome {
    pub converted: Vec<FitObservables>,
    pub excluded: Vec<(ObjectName, PrepError)>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub survey: Survey,
    pub model: FitModel,
    pub fits: Vec<FitResult>,
}

impl Catalog {
    pub fn new(survey: Survey, model: FitModel) -> Self {
        Catalog {
            survey,
            model,
            fits: Vec::new(),
        }
    }

    pub fn with_fits(survey: Survey, model: FitModel, fits: Vec<FitResult>) -> Self {
        Catalog { survey, model, fits }
    }

    pub fn push(&mut self, fit: FitResult) {
        self.fits.push(fit);
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// Observable names of the light-curve block produced by this catalog.
    pub fn observable_names(&self) -> Vec<String> {
        self.model.observable_names()
    }

    /// Convert every fit into its light-curve block.
    ///
    /// Return
    /// ----------
    /// * `Ok(ConversionOutcome)` with the converted objects in catalog order and the excluded ones.
    /// * `Err(PrepError::SchemaMismatch)` if a fit lacks one of the model parameters or its
    ///   covariance is not aligned with its parameters.
    pub fn to_observables(&self) -> Result<ConversionOutcome, PrepError> {
        let amplitude = self.model.amplitude_param();
        let shape = self.model.shape_params();
        let magnitude_model = self.model.magnitude_model();

        let mut outcome = ConversionOutcome::default();
        for fit in &self.fits {
            fit.check_shape()?;
            let name = canonical_name(&fit.name);

            let mut idx = Vec::with_capacity(shape.len() + 1);
            idx.push(fit.param_index(amplitude)?);
            for param in &shape {
                idx.push(fit.param_index(param)?);
            }

            let full_cov = fit.covariance_matrix();
            let converted = check_covariance(&full_cov, &name).and_then(|_| {
                let values = select_entries(&fit.values(), &idx);
                let cov = principal_submatrix(&symmetrize(&full_cov), &idx);
                convert_amplitude(&values, &cov, 0, &magnitude_model, fit.peak_magnitude)
            });

            match converted {
                Ok((values, cov)) => outcome.converted.push(FitObservables {
                    name,
                    survey: self.survey,
                    values,
                    cov,
                }),
                Err(err) => {
                    tracing::warn!(
                        "{} {}: excluding {name}, magnitude conversion failed: {err}",
                        self.survey,
                        self.model
                    );
                    outcome.excluded.push((name, err));
                }
            }
        }

        tracing::debug!(
            "{} {}: {} fits converted, {} excluded",
            self.survey,
            self.model,
            outcome.converted.len(),
            outcome.excluded.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod catalog_test {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn salt2_fit(name: &str, x0: f64) -> FitResult {
        FitResult {
            name: name.into(),
            vparam_names: vec!["t0".into(), "x0".into(), "x1".into(), "c".into()],
            parameters: vec![53000.0, x0, 0.4, -0.05],
            covariance: vec![
                vec![0.04, 1e-8, 0.01, 0.0],
                vec![1e-8, 1e-12, 2e-8, 3e-9],
                vec![0.01, 2e-8, 0.09, 0.001],
                vec![0.0, 3e-9, 0.001, 0.0016],
            ],
            errors: BTreeMap::new(),
            peak_magnitude: None,
        }
    }

    #[test]
    fn test_to_observables_salt2() {
        let catalog = Catalog::with_fits(
            Survey::Jla,
            FitModel::Salt2,
            vec![salt2_fit("sn2005el", 2e-5), salt2_fit("12856", 1e-5)],
        );
        let outcome = catalog.to_observables().unwrap();
        assert!(outcome.excluded.is_empty());
        assert_eq!(outcome.converted.len(), 2);

        let first = &outcome.converted[0];
        assert_eq!(first.name, "SN2005el");
        assert_eq!(outcome.converted[1].name, "SDSS12856");
        assert_eq!(first.values.len(), 3);
        assert_relative_eq!(first.values[0], -2.5 * 2e-5_f64.log10() + 10.63, epsilon = 1e-12);
        assert_eq!(first.values[1], 0.4);

        let jac = -2.5 / (std::f64::consts::LN_10 * 2e-5);
        assert_relative_eq!(first.cov[(0, 0)], 1e-12 * jac * jac, max_relative = 1e-12);
        assert_relative_eq!(first.cov[(0, 1)], 2e-8 * jac, max_relative = 1e-12);
        assert_eq!(first.cov[(1, 2)], 0.001);
        assert_eq!(first.cov, first.cov.transpose());
    }

    #[test]
    fn test_to_observables_excludes_non_positive_amplitude() {
        let catalog = Catalog::with_fits(
            Survey::Csp,
            FitModel::Salt2,
            vec![salt2_fit("2004ef", -1e-5), salt2_fit("2005M", 3e-5)],
        );
        let outcome = catalog.to_observables().unwrap();
        assert_eq!(outcome.converted.len(), 1);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].0, "SN2004ef");
        assert!(matches!(
            outcome.excluded[0].1,
            PrepError::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_to_observables_missing_parameter_is_fatal() {
        let catalog = Catalog::with_fits(
            Survey::Jla,
            FitModel::Snemo2,
            vec![salt2_fit("sn2005el", 2e-5)],
        );
        assert!(matches!(
            catalog.to_observables(),
            Err(PrepError::SchemaMismatch(_))
        ));
    }
}
