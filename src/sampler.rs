//! Input record of the hierarchical sampler.
//!
//! [`SamplerInput`] mirrors the data block the sampler expects, field names included
//! (`z_CMB`, `obs_mBx1c`, ...), and is written as JSON. Every view exports as a Gaussian-only
//! dataset: no non-Gaussian properties and no age mixture, so the age tensors are empty.
use std::{fs, io::BufWriter};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        ObjectName, Redshift, OUTLIER_FRACTION_PRIOR_LNMEAN, OUTLIER_FRACTION_PRIOR_LNWIDTH,
    },
    prep_errors::PrepError,
    projector::View,
};

/// Sampler switches and priors passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerPriors {
    pub outl_frac_prior_lnmean: f64,
    pub outl_frac_prior_lnwidth: f64,
    pub do_full_dint: i32,
    pub lognormal_intr_prior: i32,
    pub allow_alpha_s_n: i32,
}

impl Default for SamplerPriors {
    fn default() -> Self {
        SamplerPriors {
            outl_frac_prior_lnmean: OUTLIER_FRACTION_PRIOR_LNMEAN,
            outl_frac_prior_lnwidth: OUTLIER_FRACTION_PRIOR_LNWIDTH,
            do_full_dint: 0,
            lognormal_intr_prior: 0,
            allow_alpha_s_n: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerInput {
    pub n_sne: usize,
    pub names: Vec<ObjectName>,
    pub n_props: usize,
    pub n_non_gaus_props: usize,
    pub n_sn_set: usize,
    /// Subset index of every object, zero based.
    pub sn_set_inds: Vec<usize>,
    pub z_helio: Vec<Redshift>,
    #[serde(rename = "z_CMB")]
    pub z_cmb: Vec<Redshift>,
    /// `n_sne × n_props`.
    #[serde(rename = "obs_mBx1c")]
    pub obs_mbx1c: Vec<Vec<f64>>,
    /// `n_sne × n_props × n_props`.
    #[serde(rename = "obs_mBx1c_cov")]
    pub obs_mbx1c_cov: Vec<Vec<Vec<f64>>>,
    pub n_age_mix: usize,
    pub age_gaus_mean: Vec<Vec<Vec<f64>>>,
    pub age_gaus_std: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "age_gaus_A")]
    pub age_gaus_a: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "do_fullDint")]
    pub do_full_dint: i32,
    pub outl_frac_prior_lnmean: f64,
    pub outl_frac_prior_lnwidth: f64,
    pub lognormal_intr_prior: i32,
    #[serde(rename = "allow_alpha_S_N")]
    pub allow_alpha_s_n: i32,
}

impl SamplerInput {
    /// Check counts and finiteness.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::CardinalityError)` if a per-object array does not have `n_sne` entries,
    ///   a row does not have `n_props` entries or a subset index is not below `n_sn_set`.
    /// * `Err(PrepError::InvalidParameter)` on NaN/Inf.
    pub fn validate(&self) -> Result<(), PrepError> {
        let per_object = [
            ("names", self.names.len()),
            ("sn_set_inds", self.sn_set_inds.len()),
            ("z_helio", self.z_helio.len()),
            ("z_CMB", self.z_cmb.len()),
            ("obs_mBx1c", self.obs_mbx1c.len()),
            ("obs_mBx1c_cov", self.obs_mbx1c_cov.len()),
        ];
        if let Some((field, len)) = per_object.iter().find(|(_, len)| *len != self.n_sne) {
            return Err(PrepError::CardinalityError(format!(
                "{field} has {len} entries for {} objects",
                self.n_sne
            )));
        }

        let p = self.n_props;
        let rows_ok = self.obs_mbx1c.iter().all(|row| row.len() == p)
            && self
                .obs_mbx1c_cov
                .iter()
                .all(|m| m.len() == p && m.iter().all(|row| row.len() == p));
        if !rows_ok {
            return Err(PrepError::CardinalityError(format!(
                "observations are not {p} wide"
            )));
        }
        if let Some(i) = self.sn_set_inds.iter().find(|&&i| i >= self.n_sn_set) {
            return Err(PrepError::CardinalityError(format!(
                "subset index {i} but n_sn_set = {}",
                self.n_sn_set
            )));
        }

        let numbers = self
            .z_helio
            .iter()
            .chain(&self.z_cmb)
            .chain(self.obs_mbx1c.iter().flatten())
            .chain(self.obs_mbx1c_cov.iter().flatten().flatten());
        if let Some(x) = numbers.into_iter().find(|x| !x.is_finite()) {
            return Err(PrepError::InvalidParameter(format!(
                "non-finite value {x} in sampler input"
            )));
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, PrepError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Validate and write as JSON.
    pub fn write_json(&self, path: &Utf8Path) -> Result<(), PrepError> {
        self.validate()?;
        let writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

impl View {
    /// Export the view as sampler input.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::CardinalityError)` for an empty view.
    /// * any error of [`SamplerInput::validate`].
    pub fn to_sampler_input(&self, priors: &SamplerPriors) -> Result<SamplerInput, PrepError> {
        if self.is_empty() {
            return Err(PrepError::CardinalityError(
                "cannot export an empty view".into(),
            ));
        }
        let p = self.n_props();
        let input = SamplerInput {
            n_sne: self.len(),
            names: self.records.iter().map(|r| r.name.clone()).collect(),
            n_props: p,
            n_non_gaus_props: 0,
            n_sn_set: self.n_subsets(),
            sn_set_inds: self.records.iter().map(|r| r.subset).collect(),
            z_helio: self.records.iter().map(|r| r.z_helio).collect(),
            z_cmb: self.records.iter().map(|r| r.z_cmb).collect(),
            obs_mbx1c: self
                .records
                .iter()
                .map(|r| r.values.iter().copied().collect())
                .collect(),
            obs_mbx1c_cov: self
                .records
                .iter()
                .map(|r| {
                    r.cov
                        .row_iter()
                        .map(|row| row.iter().copied().collect())
                        .collect()
                })
                .collect(),
            n_age_mix: 0,
            age_gaus_mean: Vec::new(),
            age_gaus_std: Vec::new(),
            age_gaus_a: Vec::new(),
            do_full_dint: priors.do_full_dint,
            outl_frac_prior_lnmean: priors.outl_frac_prior_lnmean,
            outl_frac_prior_lnwidth: priors.outl_frac_prior_lnwidth,
            lognormal_intr_prior: priors.lognormal_intr_prior,
            allow_alpha_s_n: priors.allow_alpha_s_n,
        };
        input.validate()?;
        Ok(input)
    }
}

#[cfg(test)]
mod sampler_test {
    use super::*;
    use crate::{
        catalog::Survey,
        record::{ObjectRecord, Schema},
    };
    use nalgebra::{DMatrix, DVector};

    fn view() -> View {
        View {
            schema: Schema::new(["mB", "x1"]).unwrap(),
            records: vec![ObjectRecord {
                name: "SN2005el".into(),
                survey: Survey::Csp,
                subset: 0,
                z_helio: 0.0149,
                z_cmb: 0.0148,
                mass_source: None,
                values: DVector::from_vec(vec![14.8, -1.2]),
                cov: DMatrix::from_row_slice(2, 2, &[0.01, 0.003, 0.003, 0.09]),
            }],
            subset_labels: vec!["CSP/0".into()],
        }
    }

    #[test]
    fn test_export() {
        let input = view().to_sampler_input(&SamplerPriors::default()).unwrap();
        assert_eq!(input.n_sne, 1);
        assert_eq!(input.n_sn_set, 1);
        assert_eq!(input.obs_mbx1c, vec![vec![14.8, -1.2]]);
        assert_eq!(input.obs_mbx1c_cov[0][0][1], 0.003);
        assert_eq!(input.outl_frac_prior_lnmean, -4.6);

        let json: serde_json::Value =
            serde_json::from_str(&input.to_json_string().unwrap()).unwrap();
        assert_eq!(json["z_CMB"][0], 0.0148);
        assert_eq!(json["do_fullDint"], 0);
        assert!(json["age_gaus_A"].as_array().unwrap().is_empty());
        assert!(json.get("obs_mBx1c_cov").is_some());
    }

    #[test]
    fn test_validate() {
        let mut input = view().to_sampler_input(&SamplerPriors::default()).unwrap();
        input.obs_mbx1c[0][1] = f64::NAN;
        assert!(matches!(
            input.validate(),
            Err(PrepError::InvalidParameter(_))
        ));

        let mut input = view().to_sampler_input(&SamplerPriors::default()).unwrap();
        input.n_sne = 2;
        assert!(matches!(
            input.validate(),
            Err(PrepError::CardinalityError(_))
        ));

        let empty = View {
            records: Vec::new(),
            ..view()
        };
        assert!(empty.to_sampler_input(&SamplerPriors::default()).is_err());
    }
}
