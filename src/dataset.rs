//! # Consolidated dataset and its lifecycle
//!
//! A [`ConsolidatedDataset`] owns the records of every stage, their shared [`Schema`] and a
//! [`DatasetState`] tag. Stages consume the dataset by value and hand back a new one with the
//! next state, so the order `raw → deduplicated → cut → normalized → frozen` is checked at run
//! time: a stage receiving a dataset in the wrong state fails with
//! [`PrepError::OrderingError`].
//!
//! Subsets are numbered densely (`0..K-1`); `subset_labels[k]` names subset `k`. Stages that drop
//! records may leave gaps, [`ConsolidatedDataset::freeze`] renumbers them.
use std::fmt;

use ahash::AHashSet;
use serde::Serialize;

use crate::{
    prep_errors::PrepError,
    record::{ObjectRecord, Schema},
};

/// Lifecycle tag of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DatasetState {
    Raw,
    Deduplicated,
    Cut,
    Normalized,
    Frozen,
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatasetState::Raw => "raw",
            DatasetState::Deduplicated => "deduplicated",
            DatasetState::Cut => "cut",
            DatasetState::Normalized => "normalized",
            DatasetState::Frozen => "frozen",
        };
        f.write_str(s)
    }
}

/// Sample mean subtracted from one observable by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenteringOffset {
    pub index: usize,
    pub name: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedDataset {
    schema: Schema,
    records: Vec<ObjectRecord>,
    subset_labels: Vec<String>,
    state: DatasetState,
    centering: Vec<CenteringOffset>,
}

impl ConsolidatedDataset {
    /// Build a dataset in state [`DatasetState::Raw`].
    ///
    /// Arguments
    /// -----------------
    /// * `schema`: observable names shared by every record.
    /// * `records`: merged records, each with `subset < subset_labels.len()`.
    /// * `subset_labels`: label of every subset index.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::SchemaMismatch)` / `Err(PrepError::InvalidParameter)` if a record breaks
    ///   its invariants, `Err(PrepError::CardinalityError)` if a subset index has no label.
    pub fn new_raw(
        schema: Schema,
        records: Vec<ObjectRecord>,
        subset_labels: Vec<String>,
    ) -> Result<Self, PrepError> {
        let dataset = ConsolidatedDataset {
            schema,
            records,
            subset_labels,
            state: DatasetState::Raw,
            centering: Vec::new(),
        };
        dataset.validate_records()?;
        Ok(dataset)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    pub fn state(&self) -> DatasetState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_props(&self) -> usize {
        self.schema.len()
    }

    /// Object names in row order.
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn subset_labels(&self) -> &[String] {
        &self.subset_labels
    }

    /// Number of subset labels. Dense once the dataset is frozen.
    pub fn n_subsets(&self) -> usize {
        self.subset_labels.len()
    }

    pub fn centering(&self) -> &[CenteringOffset] {
        &self.centering
    }

    /// Mean subtracted from observable `index` by the normalizer, if any.
    pub fn centering_offset(&self, index: usize) -> Option<f64> {
        self.centering
            .iter()
            .find(|offset| offset.index == index)
            .map(|offset| offset.mean)
    }

    /// Fail with [`PrepError::OrderingError`] unless the dataset is in one of `expected`.
    pub fn require_state(
        &self,
        stage: &'static str,
        expected: &[DatasetState],
    ) -> Result<(), PrepError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(PrepError::ordering(stage, expected, self.state))
        }
    }

    /// Replace the records and move to `state`, keeping schema, labels and offsets.
    pub(crate) fn with_records(self, records: Vec<ObjectRecord>, state: DatasetState) -> Self {
        ConsolidatedDataset {
            records,
            state,
            ..self
        }
    }

    pub(crate) fn take_records(&mut self) -> Vec<ObjectRecord> {
        std::mem::take(&mut self.records)
    }

    pub(crate) fn set_subset_labels(&mut self, labels: Vec<String>) {
        self.subset_labels = labels;
    }

    pub(crate) fn push_centering(&mut self, offset: CenteringOffset) {
        self.centering.push(offset);
    }

    pub(crate) fn records_mut(&mut self) -> &mut [ObjectRecord] {
        &mut self.records
    }

    pub(crate) fn set_state(&mut self, state: DatasetState) {
        self.state = state;
    }

    fn validate_records(&self) -> Result<(), PrepError> {
        let n_props = self.schema.len();
        for record in &self.records {
            record.validate(n_props)?;
            if record.subset >= self.subset_labels.len() {
                return Err(PrepError::CardinalityError(format!(
                    "{}: subset index {} but only {} subset labels",
                    record.name,
                    record.subset,
                    self.subset_labels.len()
                )));
            }
        }
        Ok(())
    }

    /// Renumber subsets `0..K-1` over the subsets still in use, preserving their order.
    fn redensify_subsets(&mut self) {
        let mut used = vec![false; self.subset_labels.len()];
        for record in &self.records {
            used[record.subset] = true;
        }
        let mut remap = vec![usize::MAX; used.len()];
        let mut labels = Vec::new();
        for old in (0..used.len()).filter(|&i| used[i]) {
            remap[old] = labels.len();
            labels.push(self.subset_labels[old].clone());
        }
        if labels.len() != self.subset_labels.len() {
            tracing::debug!(
                "renumbering subsets: {} labels, {} in use",
                self.subset_labels.len(),
                labels.len()
            );
        }
        for record in &mut self.records {
            record.subset = remap[record.subset];
        }
        self.subset_labels = labels;
    }

    /// Seal a normalized dataset for projection.
    ///
    /// Every record invariant is checked again, names must be unique and the dataset non-empty;
    /// subset indices are renumbered densely.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::OrderingError)` unless the dataset is `normalized`.
    /// * `Err(PrepError::CardinalityError)` for an empty dataset or a repeated name.
    pub fn freeze(mut self) -> Result<Self, PrepError> {
        self.require_state("freeze", &[DatasetState::Normalized])?;
        if self.records.is_empty() {
            return Err(PrepError::CardinalityError(
                "cannot freeze an empty dataset".into(),
            ));
        }
        self.validate_records()?;

        let mut seen = AHashSet::with_capacity(self.records.len());
        if let Some(dup) = self.records.iter().find(|r| !seen.insert(r.name.as_str())) {
            return Err(PrepError::CardinalityError(format!(
                "object {} appears more than once",
                dup.name
            )));
        }

        self.redensify_subsets();
        self.state = DatasetState::Frozen;
        Ok(self)
    }
}

#[cfg(test)]
mod dataset_test {
    use super::*;
    use crate::catalog::Survey;
    use nalgebra::{DMatrix, DVector};

    fn record(name: &str, subset: usize) -> ObjectRecord {
        ObjectRecord {
            name: name.into(),
            survey: Survey::Jla,
            subset,
            z_helio: 0.05,
            z_cmb: 0.05,
            mass_source: None,
            values: DVector::from_vec(vec![19.0, 0.1]),
            cov: DMatrix::identity(2, 2) * 0.01,
        }
    }

    fn dataset(records: Vec<ObjectRecord>) -> ConsolidatedDataset {
        let labels = vec!["JLA/1".into(), "JLA/2".into(), "JLA/3".into()];
        ConsolidatedDataset::new_raw(Schema::new(["mB", "x1"]).unwrap(), records, labels).unwrap()
    }

    #[test]
    fn test_new_raw_checks_subsets() {
        let labels = vec!["JLA/1".to_string()];
        let err = ConsolidatedDataset::new_raw(
            Schema::new(["mB", "x1"]).unwrap(),
            vec![record("SN1", 1)],
            labels,
        );
        assert!(matches!(err, Err(PrepError::CardinalityError(_))));
    }

    #[test]
    fn test_freeze_requires_normalized() {
        let data = dataset(vec![record("SN1", 0)]);
        assert_eq!(
            data.freeze(),
            Err(PrepError::OrderingError {
                stage: "freeze",
                expected: "normalized".into(),
                found: DatasetState::Raw,
            })
        );
    }

    #[test]
    fn test_freeze_redensifies() {
        let mut data = dataset(vec![record("SN1", 2), record("SN2", 0), record("SN3", 2)]);
        data.set_state(DatasetState::Normalized);
        let frozen = data.freeze().unwrap();
        assert_eq!(frozen.state(), DatasetState::Frozen);
        assert_eq!(frozen.subset_labels(), &["JLA/1", "JLA/3"]);
        let subsets: Vec<usize> = frozen.records().iter().map(|r| r.subset).collect();
        assert_eq!(subsets, vec![1, 0, 1]);
    }

    #[test]
    fn test_freeze_rejects_duplicates() {
        let mut data = dataset(vec![record("SN1", 0), record("SN1", 1)]);
        data.set_state(DatasetState::Normalized);
        assert!(matches!(
            data.freeze(),
            Err(PrepError::CardinalityError(_))
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DatasetState::Deduplicated.to_string(), "deduplicated");
        let err = PrepError::ordering(
            "cut",
            &[DatasetState::Deduplicated, DatasetState::Cut],
            DatasetState::Raw,
        );
        assert_eq!(
            err.to_string(),
            "Stage `cut` requires a dataset in state deduplicated or cut, found raw"
        );
    }
}
