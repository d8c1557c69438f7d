mod common;

use approx::assert_relative_eq;
use common::{assert_symmetric, diagonal, raw_dataset, record};
use unity_prep::{
    catalog::Survey,
    dedup::{deduplicate, SurveyPriority},
    normalize::{normalize, CenteringRule, NormalizeConfig},
    projector::{project, ViewSpec},
    quality_cut::{apply_cut, ParameterBounds},
    DatasetState,
};

#[test]
fn three_objects_cut_center_project() {
    let cov = || diagonal(&[0.01, 0.09, 0.0016]);
    let raw = raw_dataset(
        &["mB", "x1", "color"],
        vec![
            record("SN2005el", Survey::Csp, &[14.80, -1.20, 0.01], cov()),
            record("SN2006ax", Survey::Csp, &[15.30, 0.40, 0.05], cov()),
            record("SN2004ef", Survey::Csp, &[16.90, 2.10, 0.00], cov()),
        ],
    );

    let (dedup, report) = deduplicate(raw, &SurveyPriority::default()).unwrap();
    assert!(report.dropped.is_empty());
    assert_symmetric(&dedup);

    // |x1| < 5 on index 1 only; σ bound large enough to never bite
    let bounds = ParameterBounds::new(1..2, 10.0);
    let cut = apply_cut(dedup, &bounds).unwrap();
    assert!(cut.report.removed.is_empty());
    assert_eq!(cut.manifest.count, 3);
    assert_symmetric(&cut.dataset);

    let before = cut.dataset.clone();
    let config = NormalizeConfig::new(vec![CenteringRule { index: 2, floor: 0.0 }]);
    let normalized = normalize(cut.dataset, &config).unwrap();
    assert_eq!(normalized.state(), DatasetState::Normalized);
    assert_relative_eq!(normalized.centering_offset(2).unwrap(), 0.02, epsilon = 1e-15);

    for (old, new) in before.records().iter().zip(normalized.records()) {
        assert_eq!(new.values[0], old.values[0]);
        assert_eq!(new.values[1], old.values[1]);
        assert_relative_eq!(new.values[2], old.values[2] - 0.02, epsilon = 1e-15);
        assert_eq!(new.cov, old.cov);
    }

    let frozen = normalized.freeze().unwrap();
    assert_symmetric(&frozen);
    let view = project(&frozen, &ViewSpec::keep([0, 1])).unwrap();
    assert_eq!(view.schema.names(), &["mB", "x1"]);
    for r in &view.records {
        assert_eq!(r.cov, diagonal(&[0.01, 0.09]));
    }
}
