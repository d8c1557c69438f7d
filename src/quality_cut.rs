//! # Quality cuts
//!
//! A cut is a [`CutPredicate`] evaluated independently on every record; thresholds are global
//! configuration, never derived from the sample. Three predicates cover the cuts of the combined
//! sample:
//!
//! * [`ParameterBounds`]: `sqrt(C[j,j]) < T` and `|v[j]| < B` for every `j` of an index range,
//!   typically the shape/color block between the magnitude and the host mass;
//! * [`NameList`]: keep only listed objects (restricting a SALT2 sample to the objects that
//!   passed the SNEMO cuts); every listed name must be present;
//! * [`ExcludeNames`]: drop named outliers.
//!
//! Closures `Fn(&ObjectRecord) -> bool` are predicates too, and [`CutRule`] wraps the built-in
//! ones for configuration.
//!
//! [`apply_cut`] returns the filtered dataset, a [`CutReport`] and an [`AuditManifest`] listing
//! the retained objects, written as TOML next to the sampler input.
use std::{collections::BTreeMap, fs, ops::Range};

use ahash::AHashSet;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::canonical_name,
    constants::{ObjectName, DEFAULT_MAX_ABS_PARAMETER},
    dataset::{ConsolidatedDataset, DatasetState},
    prep_errors::PrepError,
    record::{ObjectRecord, Schema},
};

pub trait CutPredicate {
    /// `true` if the record is kept.
    fn passes(&self, record: &ObjectRecord) -> bool;

    /// Short description used in logs.
    fn describe(&self) -> String {
        "custom cut".to_string()
    }

    /// Check the predicate against the whole dataset before it is evaluated.
    fn precheck(&self, _dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        Ok(())
    }
}

impl<F> CutPredicate for F
where
    F: Fn(&ObjectRecord) -> bool,
{
    fn passes(&self, record: &ObjectRecord) -> bool {
        self(record)
    }
}

/// Uncertainty and magnitude bounds on a range of observables.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBounds {
    pub indices: Range<usize>,
    /// `T`: maximal 1-σ uncertainty.
    pub max_uncertainty: f64,
    /// `B`: maximal absolute value.
    pub max_abs_value: f64,
}

impl ParameterBounds {
    pub fn new(indices: Range<usize>, max_uncertainty: f64) -> Self {
        ParameterBounds {
            indices,
            max_uncertainty,
            max_abs_value: DEFAULT_MAX_ABS_PARAMETER,
        }
    }

    /// Bounds on the shape/color block: every observable after the first one and before
    /// `boundary` (usually the host mass).
    pub fn shape_block(
        schema: &Schema,
        boundary: &str,
        max_uncertainty: f64,
    ) -> Result<Self, PrepError> {
        let end = schema.require(boundary)?;
        Ok(ParameterBounds::new(1..end, max_uncertainty))
    }

    pub fn with_max_abs_value(mut self, max_abs_value: f64) -> Self {
        self.max_abs_value = max_abs_value;
        self
    }
}

impl CutPredicate for ParameterBounds {
    fn passes(&self, record: &ObjectRecord) -> bool {
        self.indices.clone().all(|j| {
            record.sigma(j) < self.max_uncertainty && record.values[j].abs() < self.max_abs_value
        })
    }

    fn describe(&self) -> String {
        format!(
            "σ < {} and |v| < {} on observables {:?}",
            self.max_uncertainty, self.max_abs_value, self.indices
        )
    }

    fn precheck(&self, dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        if self.indices.end > dataset.n_props() || self.indices.is_empty() {
            return Err(PrepError::SchemaMismatch(format!(
                "cut range {:?} does not fit schema {}",
                self.indices,
                dataset.schema()
            )));
        }
        if !(self.max_uncertainty > 0.0 && self.max_abs_value > 0.0) {
            return Err(PrepError::InvalidConfig(format!(
                "cut thresholds must be positive, got T = {}, B = {}",
                self.max_uncertainty, self.max_abs_value
            )));
        }
        Ok(())
    }
}

/// Keep only the listed objects.
#[derive(Debug, Clone, PartialEq)]
pub struct NameList {
    names: AHashSet<ObjectName>,
}

impl NameList {
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        NameList {
            names: names.into_iter().map(|n| canonical_name(n.as_ref())).collect(),
        }
    }

    /// The objects listed in an audit manifest of another cut.
    pub fn from_manifest(manifest: &AuditManifest) -> Self {
        NameList::new(&manifest.names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl CutPredicate for NameList {
    fn passes(&self, record: &ObjectRecord) -> bool {
        self.names.contains(&record.name)
    }

    fn describe(&self) -> String {
        format!("keep {} listed objects", self.names.len())
    }

    fn precheck(&self, dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        let present: AHashSet<&str> = dataset.names().into_iter().collect();
        let mut missing: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|n| !present.contains(n))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(PrepError::CardinalityError(format!(
            "{} listed objects are not in the dataset: {}",
            missing.len(),
            missing.join(", ")
        )))
    }
}

/// Drop the listed objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludeNames {
    names: AHashSet<ObjectName>,
}

impl ExcludeNames {
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        ExcludeNames {
            names: names.into_iter().map(|n| canonical_name(n.as_ref())).collect(),
        }
    }
}

impl CutPredicate for ExcludeNames {
    fn passes(&self, record: &ObjectRecord) -> bool {
        !self.names.contains(&record.name)
    }

    fn describe(&self) -> String {
        format!("exclude {} named objects", self.names.len())
    }

    fn precheck(&self, dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        let present: AHashSet<&str> = dataset.names().into_iter().collect();
        for name in self.names.iter().filter(|n| !present.contains(n.as_str())) {
            tracing::debug!("excluded object {name} is not in the dataset");
        }
        Ok(())
    }
}

/// Built-in cuts, as used in the pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum CutRule {
    Bounds(ParameterBounds),
    Keep(NameList),
    Exclude(ExcludeNames),
}

impl CutRule {
    fn predicate(&self) -> &dyn CutPredicate {
        match self {
            CutRule::Bounds(p) => p,
            CutRule::Keep(p) => p,
            CutRule::Exclude(p) => p,
        }
    }
}

impl CutPredicate for CutRule {
    fn passes(&self, record: &ObjectRecord) -> bool {
        self.predicate().passes(record)
    }

    fn describe(&self) -> String {
        self.predicate().describe()
    }

    fn precheck(&self, dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        self.predicate().precheck(dataset)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutReport {
    pub removed: Vec<ObjectName>,
    pub retained: usize,
}

/// List of the objects retained by a cut.
///
/// `names` are in row order; `status` records the verdict of every object seen by the cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditManifest {
    pub count: usize,
    pub names: Vec<ObjectName>,
    #[serde(default)]
    pub status: BTreeMap<ObjectName, bool>,
}

impl AuditManifest {
    fn check_count(&self) -> Result<(), PrepError> {
        if self.count != self.names.len() {
            return Err(PrepError::CardinalityError(format!(
                "manifest count {} but {} names",
                self.count,
                self.names.len()
            )));
        }
        Ok(())
    }

    /// Check the manifest against the dataset it describes.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::CardinalityError)` if `count` differs from the number of retained names
    ///   or rows, or if the names differ from the dataset rows.
    pub fn check(&self, dataset: &ConsolidatedDataset) -> Result<(), PrepError> {
        self.check_count()?;
        if self.count != dataset.len() {
            return Err(PrepError::CardinalityError(format!(
                "manifest count {} but {} names and {} rows",
                self.count,
                self.names.len(),
                dataset.len()
            )));
        }
        if self.names.iter().map(String::as_str).ne(dataset.names()) {
            return Err(PrepError::CardinalityError(
                "manifest names do not match the dataset rows".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, PrepError> {
        Ok(toml::to_string(self)?)
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), PrepError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Read a manifest written by an earlier run, e.g. to restrict a second sample to the
    /// objects that passed the first one with [`NameList::from_manifest`].
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::CardinalityError)` if `count` differs from the number of names.
    /// * `Err(PrepError::IoError)` or `Err(PrepError::TomlParseError)` if the file cannot be
    ///   read or parsed.
    pub fn read(path: &Utf8Path) -> Result<Self, PrepError> {
        let manifest: AuditManifest = toml::from_str(&fs::read_to_string(path)?)?;
        manifest.check_count()?;
        tracing::debug!("{path}: read a manifest of {} objects", manifest.count);
        Ok(manifest)
    }
}

#[derive(Debug)]
pub struct CutOutcome {
    pub dataset: ConsolidatedDataset,
    pub report: CutReport,
    pub manifest: AuditManifest,
}

/// Filter a dataset with a predicate.
///
/// Arguments
/// -----------------
/// * `dataset`: a `deduplicated` dataset, or one already `cut` (cuts can be chained).
/// * `predicate`: the per-record cut.
///
/// Return
/// ----------
/// * `Ok(CutOutcome)` with the dataset in state `cut`.
/// * `Err(PrepError::OrderingError)` for any other input state.
/// * any error of [`CutPredicate::precheck`].
pub fn apply_cut(
    dataset: ConsolidatedDataset,
    predicate: &dyn CutPredicate,
) -> Result<CutOutcome, PrepError> {
    dataset.require_state("cut", &[DatasetState::Deduplicated, DatasetState::Cut])?;
    predicate.precheck(&dataset)?;

    let mut dataset = dataset;
    let mut report = CutReport::default();
    let mut manifest = AuditManifest::default();
    let mut kept = Vec::with_capacity(dataset.len());

    for record in dataset.take_records() {
        let pass = predicate.passes(&record);
        manifest.status.insert(record.name.clone(), pass);
        if pass {
            manifest.names.push(record.name.clone());
            kept.push(record);
        } else {
            tracing::debug!("{} fails cut: {}", record.name, predicate.describe());
            report.removed.push(record.name);
        }
    }
    manifest.count = kept.len();
    report.retained = kept.len();

    let dataset = dataset.with_records(kept, DatasetState::Cut);
    manifest.check(&dataset)?;
    tracing::info!(
        "cut `{}`: {} retained, {} removed",
        predicate.describe(),
        report.retained,
        report.removed.len()
    );
    Ok(CutOutcome {
        dataset,
        report,
        manifest,
    })
}

/// Put every record of a cut dataset into a single subset.
pub fn collapse_subsets(dataset: ConsolidatedDataset) -> Result<ConsolidatedDataset, PrepError> {
    dataset.require_state("collapse_subsets", &[DatasetState::Cut])?;
    let mut dataset = dataset;
    for record in dataset.records_mut() {
        record.subset = 0;
    }
    dataset.set_subset_labels(vec!["all".into()]);
    Ok(dataset)
}

#[cfg(test)]
mod quality_cut_test {
    use super::*;
    use crate::catalog::Survey;
    use nalgebra::{DMatrix, DVector};

    fn record(name: &str, x1: f64, sigma_x1: f64) -> ObjectRecord {
        ObjectRecord {
            name: name.into(),
            survey: Survey::Jla,
            subset: 0,
            z_helio: 0.03,
            z_cmb: 0.03,
            mass_source: None,
            values: DVector::from_vec(vec![15.0, x1, 0.01, 10.2]),
            cov: DMatrix::from_diagonal(&DVector::from_vec(vec![
                0.01,
                sigma_x1 * sigma_x1,
                0.0004,
                0.01,
            ])),
        }
    }

    fn deduplicated() -> ConsolidatedDataset {
        let mut data = ConsolidatedDataset::new_raw(
            Schema::new(["mB", "x1", "c", "logM"]).unwrap(),
            vec![
                record("SN1", 0.5, 0.1),
                record("SN2", 6.0, 0.1),
                record("SN3", 0.5, 1.5),
                record("SN4", -1.0, 0.4),
            ],
            vec!["JLA/1".into()],
        )
        .unwrap();
        data.set_state(DatasetState::Deduplicated);
        data
    }

    #[test]
    fn test_parameter_bounds() {
        let schema = Schema::new(["mB", "x1", "c", "logM"]).unwrap();
        let bounds = ParameterBounds::shape_block(&schema, "logM", 1.0).unwrap();
        assert_eq!(bounds.indices, 1..3);

        let outcome = apply_cut(deduplicated(), &bounds).unwrap();
        assert_eq!(outcome.dataset.state(), DatasetState::Cut);
        assert_eq!(outcome.dataset.names(), vec!["SN1", "SN4"]);
        assert_eq!(outcome.report.removed, vec!["SN2", "SN3"]);
        assert_eq!(outcome.manifest.count, 2);
        assert_eq!(outcome.manifest.status["SN2"], false);
        assert!(outcome.manifest.check(&outcome.dataset).is_ok());
    }

    #[test]
    fn test_name_list_and_closure() {
        let keep = NameList::new(["SN1", "SN3", "SN4"]);
        let outcome = apply_cut(deduplicated(), &keep).unwrap();
        let outcome = apply_cut(outcome.dataset, &|r: &ObjectRecord| r.values[1] > 0.0).unwrap();
        assert_eq!(outcome.dataset.names(), vec!["SN1", "SN3"]);

        let missing = NameList::new(["SN1", "SN9"]);
        assert!(matches!(
            apply_cut(deduplicated(), &missing),
            Err(PrepError::CardinalityError(_))
        ));
    }

    #[test]
    fn test_exclude_names() {
        let rule = CutRule::Exclude(ExcludeNames::new(["SN2", "SN7"]));
        let outcome = apply_cut(deduplicated(), &rule).unwrap();
        assert_eq!(outcome.dataset.len(), 3);
    }

    #[test]
    fn test_requires_deduplicated() {
        let raw = ConsolidatedDataset::new_raw(
            Schema::new(["mB"]).unwrap(),
            vec![],
            vec![],
        )
        .unwrap();
        assert!(matches!(
            apply_cut(raw, &ExcludeNames::new(["SN1"])),
            Err(PrepError::OrderingError { stage: "cut", .. })
        ));
    }

    #[test]
    fn test_manifest_toml() {
        let outcome = apply_cut(deduplicated(), &ExcludeNames::new(["SN3"])).unwrap();
        let text = outcome.manifest.to_toml_string().unwrap();
        assert!(text.contains("count = 3"));
        let back: AuditManifest = toml::from_str(&text).unwrap();
        assert_eq!(back, outcome.manifest);

        let mut wrong = outcome.manifest.clone();
        wrong.count = 4;
        assert!(matches!(
            wrong.check(&outcome.dataset),
            Err(PrepError::CardinalityError(_))
        ));
    }

    #[test]
    fn test_collapse_subsets() {
        let outcome = apply_cut(deduplicated(), &ExcludeNames::new(["SN3"])).unwrap();
        let collapsed = collapse_subsets(outcome.dataset).unwrap();
        assert_eq!(collapsed.n_subsets(), 1);
        assert!(collapsed.records().iter().all(|r| r.subset == 0));
    }
}
