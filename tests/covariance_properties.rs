mod common;

use approx::assert_relative_eq;
use common::{
    assert_matrix_close, assert_symmetric, correlated_cov, freeze_with, raw_dataset, record,
};
use itertools::Itertools;
use unity_prep::{
    catalog::Survey,
    covariance::principal_submatrix,
    dedup::{deduplicate, SurveyPriority},
    normalize::{normalize, CenteringRule, InflationRule, NormalizeConfig},
    projector::{project, split, SplitRule, Threshold, ViewSpec},
    quality_cut::apply_cut,
    ConsolidatedDataset, DatasetState, PrepError,
};

const SCHEMA: [&str; 4] = ["mB", "x1", "c", "logM"];

fn sample() -> ConsolidatedDataset {
    let masses = [9.1, 10.4, 9.8, 11.2, 10.0, 8.7];
    let records = masses
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            record(
                &format!("SN{i}"),
                Survey::Jla,
                &[15.0 + i as f64 * 0.3, -1.0 + 0.4 * i as f64, 0.01 * i as f64, m],
                correlated_cov(1.0 + 0.1 * i as f64),
            )
        })
        .collect();
    raw_dataset(&SCHEMA, records)
}

#[test]
fn covariance_stays_symmetric_at_every_stage() {
    let raw = sample();
    assert_symmetric(&raw);
    let (dedup, _) = deduplicate(raw, &SurveyPriority::default()).unwrap();
    assert_symmetric(&dedup);
    let cut = apply_cut(dedup, &|r: &unity_prep::ObjectRecord| r.values[1] < 1.0).unwrap();
    assert_symmetric(&cut.dataset);
    let normalized = normalize(
        cut.dataset,
        &NormalizeConfig::new(vec![CenteringRule { index: 3, floor: 0.1 }]),
    )
    .unwrap();
    assert_symmetric(&normalized);
    let frozen = normalized.freeze().unwrap();
    assert_symmetric(&frozen);

    for size in 1..=SCHEMA.len() {
        for idx in (0..SCHEMA.len()).permutations(size) {
            let view = project(&frozen, &ViewSpec::keep(idx)).unwrap();
            for r in &view.records {
                assert_matrix_close(&r.cov, &r.cov.transpose(), 1e-15);
            }
        }
    }
}

#[test]
fn views_are_principal_submatrices_for_all_subsets() {
    let frozen = freeze_with(sample(), Vec::new());
    for size in 1..=SCHEMA.len() {
        for idx in (0..SCHEMA.len()).combinations(size) {
            let view = project(&frozen, &ViewSpec::keep(idx.clone())).unwrap();
            assert_eq!(view.n_props(), size);
            for (full, marginal) in frozen.records().iter().zip(&view.records) {
                for (a, &i) in idx.iter().enumerate() {
                    assert_eq!(marginal.values[a], full.values[i]);
                    for (b, &j) in idx.iter().enumerate() {
                        assert_eq!(marginal.cov[(a, b)], full.cov[(i, j)]);
                    }
                }
                assert_eq!(marginal.cov, principal_submatrix(&full.cov, &idx));
            }
        }
    }

    // drop is the complement of keep
    let dropped = project(&frozen, &ViewSpec::drop([1, 3])).unwrap();
    let kept = project(&frozen, &ViewSpec::keep([0, 2])).unwrap();
    assert_eq!(dropped, kept);
}

#[test]
fn split_partitions_every_object_once() {
    let frozen = freeze_with(
        sample(),
        vec![CenteringRule { index: 3, floor: 0.1 }],
    );
    for t in [8.0, 9.5, 9.8, 10.0, 10.5, 12.0] {
        let views = split(
            &frozen,
            &ViewSpec::drop([3]),
            &SplitRule {
                index: 3,
                threshold: Threshold::Raw(t),
            },
        )
        .unwrap();
        assert_eq!(views.low.len() + views.high.len(), frozen.len());
        let mut names = views.low.names();
        names.extend(views.high.names());
        names.sort_unstable();
        let mut expected = frozen.names();
        expected.sort_unstable();
        assert_eq!(names, expected);

        // raw threshold compared with un-centered masses
        let offset = frozen.centering_offset(3).unwrap();
        for r in &views.low.records {
            let full = frozen.records().iter().find(|f| f.name == r.name).unwrap();
            assert!(full.values[3] + offset < t);
        }
    }
}

#[test]
fn centering_zeroes_the_mean_and_inflates_in_quadrature() {
    let raw = sample();
    let before: Vec<f64> = raw.records().iter().map(|r| r.cov[(3, 3)]).collect();
    let frozen = freeze_with(raw, vec![CenteringRule { index: 3, floor: 0.1 }]);

    let mean = frozen.records().iter().map(|r| r.values[3]).sum::<f64>() / frozen.len() as f64;
    assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
    assert_relative_eq!(frozen.centering_offset(3).unwrap(), 59.2 / 6.0, epsilon = 1e-12);

    for (record, sigma0_sq) in frozen.records().iter().zip(before) {
        let inflated = record.cov[(3, 3)];
        assert_relative_eq!(inflated, sigma0_sq + 0.01, epsilon = 1e-15);
        assert!((inflated - (sigma0_sq.sqrt() + 0.1).powi(2)).abs() > 1e-4);
    }
}

#[test]
fn legacy_inflation_is_opt_in() {
    let (dedup, _) = deduplicate(sample(), &SurveyPriority::default()).unwrap();
    let cut = apply_cut(dedup, &|_: &unity_prep::ObjectRecord| true).unwrap();
    let before = cut.dataset.records()[0].cov[(3, 3)];
    let config = NormalizeConfig::new(vec![CenteringRule { index: 3, floor: 0.1 }])
        .with_inflation(InflationRule::LegacyEntry);
    let normalized = normalize(cut.dataset, &config).unwrap();
    assert_relative_eq!(
        normalized.records()[0].cov[(3, 3)],
        (before * before + 0.01).sqrt(),
        epsilon = 1e-15
    );
}

#[test]
fn stages_out_of_order_are_rejected() {
    let raw = sample();
    assert!(matches!(
        project(&raw, &ViewSpec::all()),
        Err(PrepError::OrderingError {
            found: DatasetState::Raw,
            ..
        })
    ));
    assert!(matches!(
        raw.clone().freeze(),
        Err(PrepError::OrderingError { .. })
    ));
    assert!(matches!(
        normalize(raw, &NormalizeConfig::default()),
        Err(PrepError::OrderingError { stage: "normalize", .. })
    ));

    let frozen = freeze_with(sample(), Vec::new());
    assert!(matches!(
        deduplicate(frozen.clone(), &SurveyPriority::default()),
        Err(PrepError::OrderingError { .. })
    ));
    assert!(matches!(
        apply_cut(frozen, &|_: &unity_prep::ObjectRecord| true),
        Err(PrepError::OrderingError { stage: "cut", .. })
    ));
}
