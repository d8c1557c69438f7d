//! # Record merger
//!
//! Joins the light-curve observables of every [`Catalog`] with the per-object metadata: both
//! redshifts, a host-galaxy mass and optional extra host properties. The output is a
//! [`ConsolidatedDataset`] in state `raw` whose schema is
//!
//! ```text
//! [mB, shape..., logM, extras...]
//! ```
//!
//! and whose covariance is `blockdiag(C_fit, σ_logM², σ_extra²...)`: metadata uncertainties are
//! independent of the light-curve fit.
//!
//! ## Source priority
//! -----------------
//! * **Metadata row**: the table of the fit's own survey is searched first, then the other tables
//!   in the order given.
//! * **Host mass**: the mass column of the matched metadata row when present, otherwise the host
//!   mass catalogs in declared order. The first source with a unique match wins and is recorded
//!   in [`ObjectRecord::mass_source`].
//!
//! ## Subsets
//! -----------------
//! The distinct `(survey, label)` pairs found in the metadata are sorted by survey then label and
//! numbered `0..K-1`.
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use nalgebra::DVector;

use crate::{
    catalog::{Catalog, FitObservables, Survey},
    constants::{ObjectName, Redshift, DEFAULT_MASS_ERR},
    covariance::append_diagonal,
    dataset::ConsolidatedDataset,
    metadata::{HostMassCatalog, MassEstimate, MassSource, MetadataEntry, NameMatch, SurveyMetadata},
    prep_errors::PrepError,
    record::{ObjectRecord, Schema},
    redshift::{cmb_to_helio, helio_to_cmb},
};

/// Default name of the host-mass observable.
pub const MASS_OBSERVABLE: &str = "logM";

/// What to do with an object for which no host mass can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMassPolicy {
    /// Drop the object, log it and count it in [`MergeReport::missing_mass`].
    #[default]
    Exclude,
    /// Fail with [`PrepError::UnresolvedReference`].
    Error,
}

/// What to do with an object absent from every metadata table, or whose metadata is incomplete
/// (no usable redshift pair, missing extra property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMetadataPolicy {
    /// Drop the object, log it and count it in [`MergeReport::missing_metadata`].
    Exclude,
    /// Fail with [`PrepError::UnresolvedReference`].
    #[default]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Schema name of the host-mass observable.
    pub mass_observable: String,
    /// Extra host properties appended after the mass, read from [`MetadataEntry::extras`].
    pub extra_properties: Vec<String>,
    pub missing_mass: MissingMassPolicy,
    pub missing_metadata: MissingMetadataPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            mass_observable: MASS_OBSERVABLE.into(),
            extra_properties: Vec::new(),
            missing_mass: MissingMassPolicy::default(),
            missing_metadata: MissingMetadataPolicy::default(),
        }
    }
}

/// Metadata tables available to the merger.
#[derive(Debug, Clone, Default)]
pub struct MetadataSources {
    pub surveys: Vec<SurveyMetadata>,
    /// Host mass catalogs in priority order.
    pub host_masses: Vec<HostMassCatalog>,
}

/// Bookkeeping of a merge: every object that did not make it, by reason.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Number of fits across all catalogs.
    pub fits: usize,
    pub conversion_failures: Vec<(ObjectName, PrepError)>,
    pub missing_metadata: Vec<ObjectName>,
    pub missing_mass: Vec<ObjectName>,
    /// Number of merged objects per mass source.
    pub mass_sources: BTreeMap<MassSource, usize>,
    pub merged: usize,
}

impl MergeReport {
    pub fn excluded(&self) -> usize {
        self.conversion_failures.len() + self.missing_metadata.len() + self.missing_mass.len()
    }
}

/// Why an object could not be merged.
enum Unresolved {
    Metadata(String),
    Mass(String),
}

/// Metadata row of an object: the fit's own survey table first, then the others.
fn find_metadata<'a>(
    name: &str,
    survey: Survey,
    tables: &'a [SurveyMetadata],
) -> Option<(Survey, &'a MetadataEntry)> {
    let ordered = tables
        .iter()
        .filter(|t| t.survey == survey)
        .chain(tables.iter().filter(|t| t.survey != survey));
    for table in ordered {
        match table.lookup(name) {
            NameMatch::Exact(entry) | NameMatch::Contains(entry) => {
                return Some((table.survey, entry))
            }
            NameMatch::Ambiguous(n) => {
                tracing::debug!("{name}: {n} candidates in the {} table, ignored", table.survey)
            }
            NameMatch::Missing => {}
        }
    }
    None
}

/// Heliocentric and CMB-frame redshifts, deriving a missing one from the sky position.
fn resolve_redshifts(entry: &MetadataEntry) -> Result<(Redshift, Redshift), String> {
    match (entry.z_helio, entry.z_cmb) {
        (Some(zh), Some(zc)) => Ok((zh, zc)),
        (Some(zh), None) => entry
            .sky_position()
            .map(|(ra, dec)| (zh, helio_to_cmb(ra, dec, zh)))
            .ok_or_else(|| "no CMB redshift and no usable sky position".to_string()),
        (None, Some(zc)) => entry
            .sky_position()
            .map(|(ra, dec)| (cmb_to_helio(ra, dec, zc), zc))
            .ok_or_else(|| "no heliocentric redshift and no usable sky position".to_string()),
        (None, None) => Err("no redshift".to_string()),
    }
}

fn resolve_mass(
    name: &str,
    table_survey: Survey,
    entry: &MetadataEntry,
    host_masses: &[HostMassCatalog],
) -> Option<MassEstimate> {
    if let Some(log_mass) = entry.log_mass {
        return Some(MassEstimate {
            log_mass,
            log_mass_err: entry.log_mass_err.unwrap_or(DEFAULT_MASS_ERR),
            source: MassSource::SurveyTable(table_survey),
        });
    }
    host_masses.iter().find_map(|catalog| match catalog.lookup(name) {
        NameMatch::Ambiguous(n) => {
            tracing::debug!("{name}: {n} candidates in host catalog {}, ignored", catalog.label);
            None
        }
        other => other.found(),
    })
}

/// Merged record before subset numbering, together with its subset key.
///
/// The key names the table that supplied the subset label, not the survey of the fit.
struct Merged {
    record: ObjectRecord,
    subset_key: (Survey, i64),
}

fn merge_one(
    obs: FitObservables,
    sources: &MetadataSources,
    config: &MergeConfig,
) -> Result<Merged, Unresolved> {
    let (table_survey, entry) = find_metadata(&obs.name, obs.survey, &sources.surveys)
        .ok_or_else(|| Unresolved::Metadata("absent from every metadata table".into()))?;
    let (z_helio, z_cmb) = resolve_redshifts(entry).map_err(Unresolved::Metadata)?;
    let mass = resolve_mass(&obs.name, table_survey, entry, &sources.host_masses)
        .ok_or_else(|| Unresolved::Mass("no host mass in any source".into()))?;

    let mut tail_values = vec![mass.log_mass];
    let mut tail_variances = vec![mass.log_mass_err.powi(2)];
    for prop in &config.extra_properties {
        let (value, err) = entry
            .extras
            .get(prop)
            .ok_or_else(|| Unresolved::Metadata(format!("no value for host property `{prop}`")))?;
        tail_values.push(*value);
        tail_variances.push(err.powi(2));
    }

    let values = obs.values.iter().copied().chain(tail_values).collect::<Vec<_>>();
    let cov = append_diagonal(&obs.cov, &tail_variances);

    Ok(Merged {
        record: ObjectRecord {
            name: obs.name,
            survey: obs.survey,
            subset: 0,
            z_helio,
            z_cmb,
            mass_source: Some(mass.source),
            values: DVector::from_vec(values),
            cov,
        },
        subset_key: (table_survey, entry.subset),
    })
}

/// Merge catalogs and metadata into a raw dataset.
///
/// Arguments
/// -----------------
/// * `catalogs`: light-curve catalogs, all with the same observable names, in reading order.
/// * `sources`: survey metadata tables and host-mass catalogs.
/// * `config`: schema naming and missing-data policies.
///
/// Return
/// ----------
/// * `Ok((dataset, report))` where `dataset` keeps the catalog order (duplicates across catalogs
///   are kept, see [`deduplicate`](crate::dedup::deduplicate)).
/// * `Err(PrepError::SchemaMismatch)` if the catalogs disagree on their observables or the schema
///   has a repeated name.
/// * `Err(PrepError::UnresolvedReference)` for missing metadata or mass under the `Error` policies.
/// * `Err(PrepError::CardinalityError)` if no catalog is given.
pub fn merge(
    catalogs: &[Catalog],
    sources: &MetadataSources,
    config: &MergeConfig,
) -> Result<(ConsolidatedDataset, MergeReport), PrepError> {
    let Some(first) = catalogs.first() else {
        return Err(PrepError::CardinalityError("no catalog to merge".into()));
    };
    let observables = first.observable_names();
    if let Some(other) = catalogs.iter().find(|c| c.observable_names() != observables) {
        return Err(PrepError::SchemaMismatch(format!(
            "{} {} produces [{}], {} {} produces [{}]",
            first.survey,
            first.model,
            observables.iter().join(", "),
            other.survey,
            other.model,
            other.observable_names().iter().join(", ")
        )));
    }
    let schema = Schema::new(
        observables
            .iter()
            .cloned()
            .chain(std::iter::once(config.mass_observable.clone()))
            .chain(config.extra_properties.iter().cloned()),
    )?;

    let mut report = MergeReport::default();
    let mut merged = Vec::new();
    for catalog in catalogs {
        report.fits += catalog.len();
        let outcome = catalog.to_observables()?;
        report.conversion_failures.extend(outcome.excluded);

        for obs in outcome.converted {
            let name = obs.name.clone();
            match merge_one(obs, sources, config) {
                Ok(m) => merged.push(m),
                Err(Unresolved::Metadata(reason)) => match config.missing_metadata {
                    MissingMetadataPolicy::Error => {
                        return Err(PrepError::unresolved(&name, reason))
                    }
                    MissingMetadataPolicy::Exclude => {
                        tracing::warn!("{} {name}: excluded, {reason}", catalog.survey);
                        report.missing_metadata.push(name);
                    }
                },
                Err(Unresolved::Mass(reason)) => match config.missing_mass {
                    MissingMassPolicy::Error => return Err(PrepError::unresolved(&name, reason)),
                    MissingMassPolicy::Exclude => {
                        tracing::warn!("{} {name}: excluded, {reason}", catalog.survey);
                        report.missing_mass.push(name);
                    }
                },
            }
        }
    }

    let keys: BTreeSet<(Survey, i64)> = merged.iter().map(|m| m.subset_key).collect();
    let subset_labels = keys
        .iter()
        .map(|(survey, label)| format!("{survey}/{label}"))
        .collect_vec();
    let records = merged
        .into_iter()
        .map(|m| {
            let mut record = m.record;
            record.subset = keys.range(..m.subset_key).count();
            record
        })
        .collect_vec();

    for record in &records {
        if let Some(source) = &record.mass_source {
            *report.mass_sources.entry(source.clone()).or_default() += 1;
        }
    }
    report.merged = records.len();

    tracing::debug!(
        "merged {} of {} fits into schema {schema}, {} subsets",
        report.merged,
        report.fits,
        subset_labels.len()
    );
    let dataset = ConsolidatedDataset::new_raw(schema, records, subset_labels)?;
    Ok((dataset, report))
}
