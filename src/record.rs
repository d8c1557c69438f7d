//! # Object records and observable schema
//!
//! An [`ObjectRecord`] is one supernova after merging: identity, redshifts, the ordered
//! observable vector `v` and its joint covariance `C`. Every record of a dataset shares the same
//! [`Schema`], the ordered list of observable names (e.g. `["mB", "x1", "c", "logM"]`).
//!
//! ## Invariants
//! -----------------
//! * `v.len() == C.nrows() == C.ncols() == schema.len()`
//! * `C` symmetric, non-negative diagonal
//! * no NaN/Inf in `v`, `C` or the redshifts
//!
//! [`ObjectRecord::validate`] checks all of them; the dataset runs it at every lifecycle
//! transition that can change numbers.
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::{
    catalog::survey::Survey,
    constants::{ObjectName, Redshift},
    covariance::{check_covariance, check_finite_vector},
    metadata::MassSource,
    prep_errors::PrepError,
};

/// Ordered observable names shared by every record of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    names: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting duplicated names.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Result<Self, PrepError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(PrepError::SchemaMismatch(format!(
                    "observable `{name}` appears twice in the schema"
                )));
            }
        }
        Ok(Schema { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Position of an observable in the schema.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Position of an observable, failing with [`PrepError::SchemaMismatch`] when absent.
    pub fn require(&self, name: &str) -> Result<usize, PrepError> {
        self.index_of(name).ok_or_else(|| {
            PrepError::SchemaMismatch(format!(
                "observable `{name}` is not part of the schema {:?}",
                self.names
            ))
        })
    }

    /// Sub-schema at `idx`, in the order of `idx`.
    pub(crate) fn select(&self, idx: &[usize]) -> Schema {
        Schema {
            names: idx.iter().map(|&i| self.names[i].clone()).collect(),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

/// One supernova with its standardized observables.
///
/// # Fields
///
/// * `name` - canonical object name, the join key across catalogs
/// * `survey` - the light-curve catalog the fit came from
/// * `subset` - dense zero-based group index used by the sampler's group-level priors
/// * `z_helio` / `z_cmb` - heliocentric and CMB-frame redshifts
/// * `mass_source` - which metadata source provided the host mass, if any
/// * `values` - observable vector `v`, ordered as the dataset schema
/// * `cov` - joint covariance `C` of `v`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub name: ObjectName,
    pub survey: Survey,
    pub subset: usize,
    pub z_helio: Redshift,
    pub z_cmb: Redshift,
    pub mass_source: Option<MassSource>,
    pub values: DVector<f64>,
    pub cov: DMatrix<f64>,
}

impl ObjectRecord {
    /// Number of observables `P`.
    pub fn n_props(&self) -> usize {
        self.values.len()
    }

    /// 1-σ uncertainty of observable `index`, `sqrt(C[index, index])`.
    pub fn sigma(&self, index: usize) -> f64 {
        self.cov[(index, index)].sqrt()
    }

    /// Check every record invariant against the expected schema length.
    pub fn validate(&self, n_props: usize) -> Result<(), PrepError> {
        if self.values.len() != n_props {
            return Err(PrepError::SchemaMismatch(format!(
                "{}: {} observables, schema expects {n_props}",
                self.name,
                self.values.len()
            )));
        }
        if self.cov.nrows() != n_props || self.cov.ncols() != n_props {
            return Err(PrepError::SchemaMismatch(format!(
                "{}: covariance is {}x{}, schema expects {n_props}x{n_props}",
                self.name,
                self.cov.nrows(),
                self.cov.ncols()
            )));
        }
        if !self.z_helio.is_finite() || !self.z_cmb.is_finite() {
            return Err(PrepError::InvalidParameter(format!(
                "{}: non-finite redshift (z_helio = {}, z_cmb = {})",
                self.name, self.z_helio, self.z_cmb
            )));
        }
        check_finite_vector(&self.values, &self.name)?;
        check_covariance(&self.cov, &self.name)
    }
}
