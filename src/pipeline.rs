//! # Pipeline driver
//!
//! Runs every stage in order on a set of catalogs and metadata tables:
//!
//! ```text
//! merge → deduplicate → cut(s) → [collapse subsets] → normalize → freeze
//! ```
//!
//! and reports how many objects survived each stage ([`StageCounts`]). The frozen dataset is then
//! handed to the [`projector`](crate::projector) to produce the analysis views.
//!
//! Configuration goes through [`PipelineConfig::builder`], which validates the parameters before
//! anything runs.
use std::{collections::BTreeMap, fmt};

use crate::{
    catalog::Catalog,
    constants::{DEFAULT_MAX_UNCERTAINTY, HOST_MASS_FLOOR},
    dataset::ConsolidatedDataset,
    dedup::{deduplicate, DedupReport, SurveyPriority},
    merger::{
        merge, MergeConfig, MergeReport, MetadataSources, MissingMassPolicy,
        MissingMetadataPolicy,
    },
    normalize::{normalize, CenteringRule, InflationRule, NormalizeConfig},
    prep_errors::PrepError,
    quality_cut::{apply_cut, collapse_subsets, AuditManifest, CutReport, CutRule, ParameterBounds},
    record::ObjectRecord,
};

/// Configuration of a full preparation run.
///
/// Defaults
/// -----------------
/// * host mass observable `logM`, no extra host property
/// * missing mass: exclude; missing metadata: error
/// * deduplication priority `JLA < Foundation < CSP`
/// * shape/color cut `σ < 2`, `|v| < 5` on the observables between `mB` and `logM`
/// * no extra cut, subsets kept
/// * host mass centered with a `0.1` floor added in quadrature
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub merge: MergeConfig,
    pub priority: SurveyPriority,
    /// `T` of the shape/color cut, `None` to disable it.
    pub shape_cut: Option<f64>,
    /// Cuts applied after the shape/color cut, in order.
    pub cuts: Vec<CutRule>,
    pub collapse_subsets: bool,
    /// Observables centered by the normalizer, with their uncertainty floor.
    pub centered: Vec<(String, f64)>,
    pub inflation: InflationRule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let merge = MergeConfig::default();
        let centered = vec![(merge.mass_observable.clone(), HOST_MASS_FLOOR)];
        PipelineConfig {
            merge,
            priority: SurveyPriority::default(),
            shape_cut: Some(DEFAULT_MAX_UNCERTAINTY),
            cuts: Vec::new(),
            collapse_subsets: false,
            centered,
            inflation: InflationRule::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

/// Builder for [`PipelineConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    // --- Merge ---
    /// Rename the host mass observable; a default centering rule follows the new name.
    pub fn mass_observable(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        for (centered, _) in &mut self.config.centered {
            if *centered == self.config.merge.mass_observable {
                *centered = name.clone();
            }
        }
        self.config.merge.mass_observable = name;
        self
    }
    pub fn extra_properties<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.config.merge.extra_properties = names.into_iter().map(Into::into).collect();
        self
    }
    pub fn missing_mass(mut self, policy: MissingMassPolicy) -> Self {
        self.config.merge.missing_mass = policy;
        self
    }
    pub fn missing_metadata(mut self, policy: MissingMetadataPolicy) -> Self {
        self.config.merge.missing_metadata = policy;
        self
    }

    // --- Dedup / cuts ---
    pub fn priority(mut self, priority: SurveyPriority) -> Self {
        self.config.priority = priority;
        self
    }
    pub fn shape_cut(mut self, max_uncertainty: Option<f64>) -> Self {
        self.config.shape_cut = max_uncertainty;
        self
    }
    pub fn cut(mut self, rule: CutRule) -> Self {
        self.config.cuts.push(rule);
        self
    }
    pub fn collapse_subsets(mut self, v: bool) -> Self {
        self.config.collapse_subsets = v;
        self
    }

    // --- Normalization ---
    /// Replace the centered observables.
    pub fn centered<S: Into<String>>(mut self, rules: impl IntoIterator<Item = (S, f64)>) -> Self {
        self.config.centered = rules.into_iter().map(|(n, f)| (n.into(), f)).collect();
        self
    }
    pub fn inflation(mut self, rule: InflationRule) -> Self {
        self.config.inflation = rule;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// Validation rules
    /// -----------------
    /// * the mass observable name is not empty and differs from every extra property;
    /// * extra properties are unique;
    /// * the shape cut threshold, if any, is finite and positive;
    /// * centering floors are finite and non-negative, each observable is centered once.
    ///
    /// Returns
    /// -----------------
    /// * `Err(PrepError::InvalidConfig)` if a rule fails.
    pub fn build(self) -> Result<PipelineConfig, PrepError> {
        let c = &self.config;
        if c.merge.mass_observable.trim().is_empty() {
            return Err(PrepError::InvalidConfig(
                "mass observable name is empty".into(),
            ));
        }
        for (i, prop) in c.merge.extra_properties.iter().enumerate() {
            if *prop == c.merge.mass_observable || c.merge.extra_properties[..i].contains(prop) {
                return Err(PrepError::InvalidConfig(format!(
                    "host property `{prop}` is listed twice"
                )));
            }
        }
        if let Some(t) = c.shape_cut {
            if !(t.is_finite() && t > 0.0) {
                return Err(PrepError::InvalidConfig(format!(
                    "shape cut threshold must be positive, got {t}"
                )));
            }
        }
        for (i, (name, floor)) in c.centered.iter().enumerate() {
            if !(floor.is_finite() && *floor >= 0.0) {
                return Err(PrepError::InvalidConfig(format!(
                    "floor of `{name}` must be finite and non-negative, got {floor}"
                )));
            }
            if c.centered[..i].iter().any(|(n, _)| n == name) {
                return Err(PrepError::InvalidConfig(format!(
                    "`{name}` is centered twice"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Number of objects after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub fits: usize,
    pub merged: usize,
    pub deduplicated: usize,
    pub cut: usize,
    pub frozen: usize,
}

impl fmt::Display for StageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fits: {}, merged: {}, deduplicated: {}, cut: {}, frozen: {}",
            self.fits, self.merged, self.deduplicated, self.cut, self.frozen
        )
    }
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// The frozen dataset.
    pub dataset: ConsolidatedDataset,
    pub merge_report: MergeReport,
    pub dedup_report: DedupReport,
    pub cut_reports: Vec<CutReport>,
    /// Retained objects over all cuts.
    pub manifest: AuditManifest,
    pub counts: StageCounts,
}

/// Run the whole preparation.
///
/// Return
/// ----------
/// * `Ok(PipelineOutput)` with a frozen dataset.
/// * the first error of any stage.
pub fn run(
    catalogs: &[Catalog],
    sources: &MetadataSources,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PrepError> {
    let mut counts = StageCounts::default();

    let (dataset, merge_report) = merge(catalogs, sources, &config.merge)?;
    counts.fits = merge_report.fits;
    counts.merged = dataset.len();
    tracing::info!(
        "merge: {} of {} fits ({} excluded)",
        counts.merged,
        counts.fits,
        merge_report.excluded()
    );

    let (dataset, dedup_report) = deduplicate(dataset, &config.priority)?;
    counts.deduplicated = dataset.len();
    tracing::info!(
        "deduplicate: {} objects, {} duplicates dropped",
        counts.deduplicated,
        dedup_report.dropped.len()
    );

    let mut rules: Vec<CutRule> = Vec::with_capacity(config.cuts.len() + 1);
    if let Some(t) = config.shape_cut {
        rules.push(CutRule::Bounds(ParameterBounds::shape_block(
            dataset.schema(),
            &config.merge.mass_observable,
            t,
        )?));
    }
    rules.extend(config.cuts.iter().cloned());

    let mut status: BTreeMap<String, bool> = BTreeMap::new();
    let mut cut_reports = Vec::with_capacity(rules.len());
    let mut dataset = if rules.is_empty() {
        let keep_all = |_: &ObjectRecord| true;
        let outcome = apply_cut(dataset, &keep_all)?;
        status = outcome.manifest.status;
        outcome.dataset
    } else {
        let mut dataset = dataset;
        for rule in &rules {
            let outcome = apply_cut(dataset, rule)?;
            for (name, pass) in outcome.manifest.status {
                *status.entry(name).or_insert(true) &= pass;
            }
            cut_reports.push(outcome.report);
            dataset = outcome.dataset;
        }
        dataset
    };
    if config.collapse_subsets {
        dataset = collapse_subsets(dataset)?;
    }
    counts.cut = dataset.len();
    let manifest = AuditManifest {
        count: dataset.len(),
        names: dataset.names().into_iter().map(String::from).collect(),
        status,
    };
    manifest.check(&dataset)?;
    tracing::info!("cuts: {} objects retained", counts.cut);

    let normalize_config = NormalizeConfig::new(
        config
            .centered
            .iter()
            .map(|(name, floor)| {
                CenteringRule::for_observable(dataset.schema(), name).map(|r| r.with_floor(*floor))
            })
            .collect::<Result<Vec<_>, _>>()?,
    )
    .with_inflation(config.inflation);
    let dataset = normalize(dataset, &normalize_config)?.freeze()?;
    counts.frozen = dataset.len();

    tracing::info!("{counts}");
    Ok(PipelineOutput {
        dataset,
        merge_report,
        dedup_report,
        cut_reports,
        manifest,
        counts,
    })
}
