//! # Variant projection
//!
//! A frozen dataset feeds several analyses, each using a subset of the observables. A
//! [`View`] keeps, for every record, `v' = v[idx]` and the principal sub-matrix
//! `C' = C[idx, idx]`: the marginal distribution of the kept observables. Nothing is conditioned
//! on the dropped ones.
//!
//! * [`project`] builds one view from a [`ViewSpec`];
//! * [`split`] partitions the records on one observable (host mass above/below `10`) and projects
//!   both sides;
//! * [`View::shift`] offsets one observable of every record, leaving the covariance alone;
//! * [`standard_host_views`] lists the views of the host-property analyses.
//!
//! Projection requires a `frozen` dataset.
use crate::{
    covariance::{principal_submatrix, select_entries},
    dataset::{ConsolidatedDataset, DatasetState},
    prep_errors::PrepError,
    record::{ObjectRecord, Schema},
};

/// Observables of a view, by position or by name.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSpec {
    /// Keep these observables, in this order.
    Keep(Vec<usize>),
    /// Keep every observable but these, in schema order.
    Drop(Vec<usize>),
    KeepNames(Vec<String>),
    DropNames(Vec<String>),
}

impl ViewSpec {
    pub fn keep(idx: impl Into<Vec<usize>>) -> Self {
        ViewSpec::Keep(idx.into())
    }

    pub fn drop(idx: impl Into<Vec<usize>>) -> Self {
        ViewSpec::Drop(idx.into())
    }

    pub fn keep_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        ViewSpec::KeepNames(names.into_iter().map(Into::into).collect())
    }

    pub fn drop_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        ViewSpec::DropNames(names.into_iter().map(Into::into).collect())
    }

    /// Every observable.
    pub fn all() -> Self {
        ViewSpec::Drop(Vec::new())
    }

    /// Indices kept by this view for `schema`.
    ///
    /// Return
    /// ----------
    /// * `Err(PrepError::SchemaMismatch)` for an index out of range, a repeated index, an unknown
    ///   name, or an empty selection.
    pub fn resolve(&self, schema: &Schema) -> Result<Vec<usize>, PrepError> {
        let names_to_idx = |names: &[String]| {
            names
                .iter()
                .map(|n| schema.require(n))
                .collect::<Result<Vec<_>, _>>()
        };
        let (listed, keep) = match self {
            ViewSpec::Keep(idx) => (idx.clone(), true),
            ViewSpec::Drop(idx) => (idx.clone(), false),
            ViewSpec::KeepNames(names) => (names_to_idx(names)?, true),
            ViewSpec::DropNames(names) => (names_to_idx(names)?, false),
        };

        for (i, &j) in listed.iter().enumerate() {
            if j >= schema.len() {
                return Err(PrepError::SchemaMismatch(format!(
                    "view index {j} out of range for schema {schema}"
                )));
            }
            if listed[..i].contains(&j) {
                return Err(PrepError::SchemaMismatch(format!(
                    "view index {j} listed twice"
                )));
            }
        }

        let idx = if keep {
            listed
        } else {
            (0..schema.len()).filter(|j| !listed.contains(j)).collect()
        };
        if idx.is_empty() {
            return Err(PrepError::SchemaMismatch(format!(
                "view {self:?} keeps no observable of {schema}"
            )));
        }
        Ok(idx)
    }
}

/// Marginal view of a frozen dataset.
///
/// Subsets are renumbered densely within the view; `subset_labels` follows the new numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub schema: Schema,
    pub records: Vec<ObjectRecord>,
    pub subset_labels: Vec<String>,
}

impl View {
    fn from_records(
        schema: Schema,
        records: Vec<ObjectRecord>,
        labels: &[String],
    ) -> Self {
        let mut view = View {
            schema,
            records,
            subset_labels: Vec::new(),
        };
        let mut remap: Vec<Option<usize>> = vec![None; labels.len()];
        for record in &mut view.records {
            let old = record.subset;
            record.subset = match remap[old] {
                Some(new) => new,
                None => {
                    let new = view.subset_labels.len();
                    view.subset_labels.push(labels[old].clone());
                    remap[old] = Some(new);
                    new
                }
            };
        }
        view
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

    pub fn n_subsets(&self) -> usize {
        self.subset_labels.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Add `delta` to observable `index` of every record. The covariance is unchanged.
    pub fn shift(mut self, index: usize, delta: f64) -> Result<Self, PrepError> {
        if index >= self.schema.len() {
            return Err(PrepError::SchemaMismatch(format!(
                "shift index {index} out of range for view {}",
                self.schema
            )));
        }
        if !delta.is_finite() {
            return Err(PrepError::InvalidParameter(format!(
                "shift of observable {index} is not finite: {delta}"
            )));
        }
        for record in &mut self.records {
            record.values[index] += delta;
        }
        Ok(self)
    }

    /// [`View::shift`] by observable name.
    pub fn shift_named(self, name: &str, delta: f64) -> Result<Self, PrepError> {
        let index = self.schema.require(name)?;
        self.shift(index, delta)
    }
}

fn project_records(records: &[ObjectRecord], idx: &[usize]) -> Vec<ObjectRecord> {
    records
        .iter()
        .map(|r| ObjectRecord {
            values: select_entries(&r.values, idx),
            cov: principal_submatrix(&r.cov, idx),
            ..r.clone()
        })
        .collect()
}

/// Marginal view of a frozen dataset.
///
/// Return
/// ----------
/// * `Err(PrepError::OrderingError)` unless the dataset is `frozen`.
/// * `Err(PrepError::SchemaMismatch)` if `spec` does not resolve against the schema.
pub fn project(dataset: &ConsolidatedDataset, spec: &ViewSpec) -> Result<View, PrepError> {
    dataset.require_state("project", &[DatasetState::Frozen])?;
    let idx = spec.resolve(dataset.schema())?;
    Ok(View::from_records(
        dataset.schema().select(&idx),
        project_records(dataset.records(), &idx),
        dataset.subset_labels(),
    ))
}

/// Split threshold, in the units of the frozen dataset or before centering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// In the units of the input catalogs; the recorded centering offset is subtracted.
    Raw(f64),
    /// Directly compared with the stored values.
    Centered(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRule {
    /// Observable of the full dataset schema.
    pub index: usize,
    pub threshold: Threshold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitViews {
    /// Records with `v[index] < t`.
    pub low: View,
    /// Records with `v[index] >= t`.
    pub high: View,
    /// The threshold in stored units.
    pub threshold: f64,
}

/// Partition a frozen dataset on one observable and project both sides.
///
/// The split observable does not need to be part of the view. Every record lands on exactly one
/// side.
pub fn split(
    dataset: &ConsolidatedDataset,
    spec: &ViewSpec,
    rule: &SplitRule,
) -> Result<SplitViews, PrepError> {
    dataset.require_state("split", &[DatasetState::Frozen])?;
    if rule.index >= dataset.n_props() {
        return Err(PrepError::SchemaMismatch(format!(
            "split index {} out of range for schema {}",
            rule.index,
            dataset.schema()
        )));
    }
    let threshold = match rule.threshold {
        Threshold::Centered(t) => t,
        Threshold::Raw(t) => t - dataset.centering_offset(rule.index).unwrap_or(0.0),
    };
    if !threshold.is_finite() {
        return Err(PrepError::InvalidParameter(format!(
            "split threshold is not finite: {threshold}"
        )));
    }

    let idx = spec.resolve(dataset.schema())?;
    let schema = dataset.schema().select(&idx);
    let (low, high): (Vec<ObjectRecord>, Vec<ObjectRecord>) = dataset
        .records()
        .iter()
        .cloned()
        .partition(|r| r.values[rule.index] < threshold);
    tracing::info!(
        "split on {} at {threshold:.4}: {} low, {} high",
        schema_name(dataset.schema(), rule.index),
        low.len(),
        high.len()
    );

    Ok(SplitViews {
        low: View::from_records(
            schema.clone(),
            project_records(&low, &idx),
            dataset.subset_labels(),
        ),
        high: View::from_records(schema, project_records(&high, &idx), dataset.subset_labels()),
        threshold,
    })
}

fn schema_name(schema: &Schema, index: usize) -> &str {
    schema.name(index).unwrap_or("?")
}

/// Views of the host-property analyses for a `[mB, x1, c, logM, age_local, age_global]` schema:
/// the light-curve block plus every combination of the three host properties.
pub fn standard_host_views() -> Vec<(&'static str, ViewSpec)> {
    vec![
        ("mass_local_global", ViewSpec::all()),
        ("mass_local", ViewSpec::drop([5])),
        ("mass_global", ViewSpec::drop([4])),
        ("local_global", ViewSpec::drop([3])),
        ("mass", ViewSpec::drop([4, 5])),
        ("local", ViewSpec::drop([3, 5])),
        ("global", ViewSpec::drop([3, 4])),
        ("salt", ViewSpec::drop([3, 4, 5])),
    ]
}

#[cfg(test)]
mod projector_test {
    use super::*;
    use crate::catalog::Survey;
    use nalgebra::{DMatrix, DVector};

    fn frozen(masses: &[f64]) -> ConsolidatedDataset {
        let records = masses
            .iter()
            .enumerate()
            .map(|(i, &m)| ObjectRecord {
                name: format!("SN{i}"),
                survey: Survey::Jla,
                subset: i % 2,
                z_helio: 0.05,
                z_cmb: 0.05,
                mass_source: None,
                values: DVector::from_vec(vec![19.0, 0.1, -0.02, m]),
                cov: DMatrix::from_row_slice(
                    4,
                    4,
                    &[
                        0.010, 0.002, 0.001, 0.000, //
                        0.002, 0.040, 0.003, 0.000, //
                        0.001, 0.003, 0.002, 0.000, //
                        0.000, 0.000, 0.000, 0.050,
                    ],
                ),
            })
            .collect();
        let mut data = ConsolidatedDataset::new_raw(
            Schema::new(["mB", "x1", "c", "logM"]).unwrap(),
            records,
            vec!["JLA/1".into(), "JLA/2".into()],
        )
        .unwrap();
        data.set_state(DatasetState::Normalized);
        data.freeze().unwrap()
    }

    #[test]
    fn test_resolve() {
        let schema = Schema::new(["mB", "x1", "c", "logM"]).unwrap();
        assert_eq!(ViewSpec::keep([2, 0]).resolve(&schema).unwrap(), vec![2, 0]);
        assert_eq!(ViewSpec::drop([1]).resolve(&schema).unwrap(), vec![0, 2, 3]);
        assert_eq!(
            ViewSpec::keep_names(["logM", "mB"]).resolve(&schema).unwrap(),
            vec![3, 0]
        );
        assert!(ViewSpec::keep([4]).resolve(&schema).is_err());
        assert!(ViewSpec::keep([1, 1]).resolve(&schema).is_err());
        assert!(ViewSpec::drop([0, 1, 2, 3]).resolve(&schema).is_err());
        assert!(ViewSpec::drop_names(["age"]).resolve(&schema).is_err());
    }

    #[test]
    fn test_project_marginal() {
        let data = frozen(&[9.5, 10.5]);
        let view = project(&data, &ViewSpec::keep([2, 0])).unwrap();
        assert_eq!(view.schema.names(), &["c", "mB"]);
        let r = &view.records[0];
        assert_eq!(r.values.as_slice(), &[-0.02, 19.0]);
        assert_eq!(r.cov[(0, 0)], 0.002);
        assert_eq!(r.cov[(0, 1)], 0.001);
        assert_eq!(r.cov[(1, 0)], 0.001);
        assert_eq!(r.cov[(1, 1)], 0.010);
    }

    #[test]
    fn test_project_requires_frozen() {
        let mut data = ConsolidatedDataset::new_raw(
            Schema::new(["mB"]).unwrap(),
            vec![],
            vec![],
        )
        .unwrap();
        data.set_state(DatasetState::Normalized);
        assert!(matches!(
            project(&data, &ViewSpec::all()),
            Err(PrepError::OrderingError { stage: "project", .. })
        ));
    }

    #[test]
    fn test_split_and_shift() {
        let data = frozen(&[9.5, 10.5, 10.0, 8.0]);
        let rule = SplitRule {
            index: 3,
            threshold: Threshold::Centered(10.0),
        };
        let views = split(&data, &ViewSpec::drop([3]), &rule).unwrap();
        assert_eq!(views.low.names(), vec!["SN0", "SN3"]);
        assert_eq!(views.high.names(), vec!["SN1", "SN2"]);
        assert_eq!(views.low.n_props(), 3);
        // SN1 (subset 1) comes first on the high side
        assert_eq!(views.high.subset_labels, vec!["JLA/2", "JLA/1"]);

        let shifted = views.low.clone().shift(2, 0.1).unwrap();
        assert!((shifted.records[0].values[2] - 0.08).abs() < 1e-12);
        assert_eq!(shifted.records[0].cov, views.low.records[0].cov);
        assert!(views.low.shift(3, 0.1).is_err());

        let alternate = views
            .high
            .shift_named("c", crate::constants::ALTERNATE_COLOR_SHIFT)
            .unwrap();
        assert!((alternate.records[0].values[2] + 0.29).abs() < 1e-12);
    }

    #[test]
    fn test_standard_host_views() {
        let schema =
            Schema::new(["mB", "x1", "c", "logM", "age_local", "age_global"]).unwrap();
        let views = standard_host_views();
        assert_eq!(views.len(), 8);
        for (_, spec) in &views {
            assert!(spec.resolve(&schema).is_ok());
        }
        assert_eq!(views[7].1.resolve(&schema).unwrap(), vec![0, 1, 2]);
    }
}
