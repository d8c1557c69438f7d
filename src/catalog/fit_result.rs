//! Per-object output of the external light-curve fitter.
//!
//! The fitter writes, for each supernova, the names of the varied parameters, their best-fit
//! values, their joint covariance (aligned with `vparam_names`) and per-parameter errors. SNEMO
//! fits additionally carry the rest-frame peak magnitude synthesized from the fitted spectrum.
//!
//! Fit results are read from a JSON array with [`read_fit_results`], or from a directory of
//! per-object JSON files with [`read_fit_directory`].
use std::{collections::BTreeMap, fs::File, io::BufReader};

use camino::Utf8Path;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{catalog::survey::name_from_file_name, constants::Magnitude, prep_errors::PrepError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Object name as written by the fitter (not yet canonical).
    #[serde(default)]
    pub name: String,
    pub vparam_names: Vec<String>,
    /// Best-fit values, aligned with `vparam_names`.
    pub parameters: Vec<f64>,
    /// Joint covariance, row-major, aligned with `vparam_names`.
    pub covariance: Vec<Vec<f64>>,
    #[serde(default)]
    pub errors: BTreeMap<String, f64>,
    #[serde(default)]
    pub peak_magnitude: Option<Magnitude>,
}

impl FitResult {
    /// Position of a varied parameter.
    pub fn param_index(&self, param: &str) -> Result<usize, PrepError> {
        self.vparam_names
            .iter()
            .position(|p| p == param)
            .ok_or_else(|| {
                PrepError::SchemaMismatch(format!(
                    "{}: fitted parameters {:?} do not include `{param}`",
                    self.name, self.vparam_names
                ))
            })
    }

    /// Check that names, values and covariance rows all have the same length.
    pub fn check_shape(&self) -> Result<(), PrepError> {
        let n = self.vparam_names.len();
        if self.parameters.len() != n {
            return Err(PrepError::SchemaMismatch(format!(
                "{}: {} parameter names but {} values",
                self.name,
                n,
                self.parameters.len()
            )));
        }
        if self.covariance.len() != n || self.covariance.iter().any(|row| row.len() != n) {
            return Err(PrepError::SchemaMismatch(format!(
                "{}: covariance is not {n}x{n}",
                self.name
            )));
        }
        Ok(())
    }

    pub fn values(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.parameters)
    }

    /// Covariance as a dense matrix; call [`FitResult::check_shape`] first.
    pub fn covariance_matrix(&self) -> DMatrix<f64> {
        let n = self.covariance.len();
        DMatrix::from_fn(n, n, |r, c| self.covariance[r][c])
    }
}

/// Read a JSON array of [`FitResult`]s.
pub fn read_fit_results(path: &Utf8Path) -> Result<Vec<FitResult>, PrepError> {
    let file = File::open(path)?;
    let fits: Vec<FitResult> = serde_json::from_reader(BufReader::new(file))?;
    Ok(fits)
}

/// Read one [`FitResult`] per `*.json` file of a directory, in file-name order.
///
/// A fit with an empty `name` takes it from its file name (`sn2005el.json`).
pub fn read_fit_directory(dir: &Utf8Path) -> Result<Vec<FitResult>, PrepError> {
    let mut paths = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let path = entry?.into_path();
        if path.extension() == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut fits = Vec::with_capacity(paths.len());
    for path in paths {
        let file = File::open(&path)?;
        let mut fit: FitResult = serde_json::from_reader(BufReader::new(file))?;
        if fit.name.trim().is_empty() {
            fit.name = name_from_file_name(path.file_name().unwrap_or_default());
        }
        fits.push(fit);
    }
    tracing::debug!("{dir}: read {} fit results", fits.len());
    Ok(fits)
}
