//! # Post-cut normalization
//!
//! Once the sample is final, some observables are re-centered on the sample mean and their
//! uncertainty floored. For the host mass this is `logM ← logM − ⟨logM⟩` and an extra `0.1 dex`
//! added to its error.
//!
//! The mean is the post-cut one, so normalization must run exactly once, after every cut: the
//! stage requires state `cut` and moves the dataset to `normalized`; a second call fails with
//! [`PrepError::OrderingError`]. The subtracted means are kept on the dataset
//! ([`ConsolidatedDataset::centering`]) so that thresholds can still be given in raw units.
//!
//! Only diagonal entries change, the covariance stays symmetric.
use crate::{
    constants::HOST_MASS_FLOOR,
    dataset::{CenteringOffset, ConsolidatedDataset, DatasetState},
    prep_errors::PrepError,
    record::Schema,
};

/// How the uncertainty floor is added to a variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InflationRule {
    /// `C[i,i] ← C[i,i] + f²`: the 1-σ error becomes `sqrt(σ₀² + f²)`.
    #[default]
    Quadrature,
    /// `C[i,i] ← sqrt(C[i,i]² + f²)`, applied to the variance entry itself.
    ///
    /// Reproduces older prepared datasets; the result is not the quadrature sum of errors.
    LegacyEntry,
}

impl InflationRule {
    pub fn inflate(&self, variance: f64, floor: f64) -> f64 {
        match self {
            InflationRule::Quadrature => variance + floor * floor,
            InflationRule::LegacyEntry => (variance * variance + floor * floor).sqrt(),
        }
    }
}

/// Center observable `index` on the sample mean and inflate its variance with `floor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenteringRule {
    pub index: usize,
    pub floor: f64,
}

impl CenteringRule {
    /// Rule for a named observable with the host-mass floor.
    pub fn for_observable(schema: &Schema, name: &str) -> Result<Self, PrepError> {
        Ok(CenteringRule {
            index: schema.require(name)?,
            floor: HOST_MASS_FLOOR,
        })
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeConfig {
    pub rules: Vec<CenteringRule>,
    pub inflation: InflationRule,
}

impl NormalizeConfig {
    pub fn new(rules: Vec<CenteringRule>) -> Self {
        NormalizeConfig {
            rules,
            inflation: InflationRule::default(),
        }
    }

    pub fn with_inflation(mut self, inflation: InflationRule) -> Self {
        self.inflation = inflation;
        self
    }

    fn check(&self, schema: &Schema) -> Result<(), PrepError> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.index >= schema.len() {
                return Err(PrepError::SchemaMismatch(format!(
                    "centering index {} out of range for schema {schema}",
                    rule.index
                )));
            }
            if !(rule.floor.is_finite() && rule.floor >= 0.0) {
                return Err(PrepError::InvalidConfig(format!(
                    "uncertainty floor must be finite and non-negative, got {}",
                    rule.floor
                )));
            }
            if self.rules[..i].iter().any(|r| r.index == rule.index) {
                return Err(PrepError::InvalidConfig(format!(
                    "observable {} is centered twice",
                    rule.index
                )));
            }
        }
        Ok(())
    }
}

/// Center and inflate the configured observables of a cut dataset.
///
/// Return
/// ----------
/// * `Ok(dataset)` in state `normalized`, with one [`CenteringOffset`] per rule.
/// * `Err(PrepError::OrderingError)` unless the dataset is `cut`, in particular on a second call.
/// * `Err(PrepError::CardinalityError)` for an empty dataset (no mean).
/// * `Err(PrepError::SchemaMismatch)` / `Err(PrepError::InvalidConfig)` for a bad rule.
pub fn normalize(
    dataset: ConsolidatedDataset,
    config: &NormalizeConfig,
) -> Result<ConsolidatedDataset, PrepError> {
    dataset.require_state("normalize", &[DatasetState::Cut])?;
    config.check(dataset.schema())?;
    if dataset.is_empty() {
        return Err(PrepError::CardinalityError(
            "cannot normalize an empty dataset".into(),
        ));
    }

    let mut dataset = dataset;
    let n = dataset.len() as f64;
    for rule in &config.rules {
        let mean = dataset.records().iter().map(|r| r.values[rule.index]).sum::<f64>() / n;
        for record in dataset.records_mut() {
            record.values[rule.index] -= mean;
            let variance = record.cov[(rule.index, rule.index)];
            record.cov[(rule.index, rule.index)] = config.inflation.inflate(variance, rule.floor);
        }
        let name = dataset
            .schema()
            .name(rule.index)
            .unwrap_or_default()
            .to_string();
        tracing::info!("{name}: centered on {mean:.4}, floor {} added", rule.floor);
        dataset.push_centering(CenteringOffset {
            index: rule.index,
            name,
            mean,
        });
    }

    dataset.set_state(DatasetState::Normalized);
    Ok(dataset)
}
