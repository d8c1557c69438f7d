#![allow(dead_code)]

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use unity_prep::{
    catalog::Survey,
    dedup::{deduplicate, SurveyPriority},
    normalize::{normalize, CenteringRule, NormalizeConfig},
    quality_cut::apply_cut,
    ConsolidatedDataset, ObjectRecord, Schema,
};

pub fn record(name: &str, survey: Survey, values: &[f64], cov: DMatrix<f64>) -> ObjectRecord {
    ObjectRecord {
        name: name.into(),
        survey,
        subset: 0,
        z_helio: 0.03,
        z_cmb: 0.0305,
        mass_source: None,
        values: DVector::from_column_slice(values),
        cov,
    }
}

pub fn diagonal(variances: &[f64]) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_column_slice(variances))
}

/// A 4×4 joint covariance with every pair correlated.
pub fn correlated_cov(scale: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            0.0100, 0.0020, -0.0004, 0.0010, //
            0.0020, 0.0900, 0.0030, -0.0050, //
            -0.0004, 0.0030, 0.0016, 0.0002, //
            0.0010, -0.0050, 0.0002, 0.0400,
        ],
    ) * scale
}

pub fn raw_dataset(names: &[&str], records: Vec<ObjectRecord>) -> ConsolidatedDataset {
    ConsolidatedDataset::new_raw(
        Schema::new(names.iter().copied()).unwrap(),
        records,
        vec!["all".to_string()],
    )
    .unwrap()
}

/// Run dedup, a pass-all cut, the given centering rules and freeze.
pub fn freeze_with(raw: ConsolidatedDataset, rules: Vec<CenteringRule>) -> ConsolidatedDataset {
    let (dedup, _) = deduplicate(raw, &SurveyPriority::default()).unwrap();
    let cut = apply_cut(dedup, &|_: &ObjectRecord| true).unwrap();
    normalize(cut.dataset, &NormalizeConfig::new(rules))
        .unwrap()
        .freeze()
        .unwrap()
}

pub fn assert_symmetric(dataset: &ConsolidatedDataset) {
    for record in dataset.records() {
        assert_matrix_close(&record.cov, &record.cov.transpose(), 1e-14);
    }
}

pub fn assert_matrix_close(actual: &DMatrix<f64>, expected: &DMatrix<f64>, epsilon: f64) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, epsilon = epsilon);
    }
}
