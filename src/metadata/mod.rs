//! # Per-object metadata
//!
//! Two kinds of tables complement the light-curve fits:
//!
//! * a [`SurveyMetadata`] table per survey, giving redshifts (or a sky position plus one
//!   redshift), the survey's own subsample label and, for some surveys, a host-galaxy mass;
//! * [`HostMassCatalog`]s, independent host-galaxy studies providing `log10(M/M☉)` and its
//!   uncertainty for objects of several surveys.
//!
//! Tables name objects inconsistently; lookups go through a [`NameIndex`] that first tries an
//! exact match on the canonical name and then a case-insensitive *contains* match, accepted only
//! when exactly one entry matches. Anything else is reported as [`NameMatch::Ambiguous`] or
//! [`NameMatch::Missing`], never resolved by iteration order.
pub mod reader;

use std::{collections::BTreeMap, fmt};

use ahash::AHashMap;
use serde::Serialize;

use crate::{
    catalog::survey::{canonical_name, Survey},
    constants::{Degree, Redshift},
    conversion::{parse_dec_to_deg, parse_ra_to_deg},
};

/// Origin of a host-mass estimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MassSource {
    /// The survey's own metadata table (e.g. the JLA `3rdvar` column).
    SurveyTable(Survey),
    /// An independent host-galaxy catalog, identified by its label.
    HostCatalog(String),
}

impl fmt::Display for MassSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MassSource::SurveyTable(survey) => write!(f, "{survey}"),
            MassSource::HostCatalog(label) => f.write_str(label),
        }
    }
}

/// A host-mass estimate and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MassEstimate {
    pub log_mass: f64,
    pub log_mass_err: f64,
    pub source: MassSource,
}

/// One row of a survey metadata table.
///
/// `ra`/`dec` are only needed when one of the two redshifts is missing; they accept decimal
/// degrees or sexagesimal strings (`HH:MM:SS.ss`, `±DD:MM:SS.s`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataEntry {
    pub name: String,
    pub z_helio: Option<Redshift>,
    pub z_cmb: Option<Redshift>,
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub subset: i64,
    pub log_mass: Option<f64>,
    pub log_mass_err: Option<f64>,
    /// Additional host properties (e.g. local and global age): name → (value, 1-σ).
    pub extras: BTreeMap<String, (f64, f64)>,
}

impl MetadataEntry {
    /// Sky position in decimal degrees.
    ///
    /// Decimal inputs are read as degrees; sexagesimal right ascensions are read as hours.
    pub fn sky_position(&self) -> Option<(Degree, Degree)> {
        let ra = self.ra.as_deref()?;
        let dec = self.dec.as_deref()?;
        let ra = ra.trim().parse::<f64>().ok().or_else(|| parse_ra_to_deg(ra))?;
        let dec = dec.trim().parse::<f64>().ok().or_else(|| parse_dec_to_deg(dec))?;
        Some((ra, dec))
    }
}

/// Metadata table of one survey.
#[derive(Debug, Clone)]
pub struct SurveyMetadata {
    pub survey: Survey,
    entries: Vec<MetadataEntry>,
    index: NameIndex,
}

impl SurveyMetadata {
    pub fn new(survey: Survey, entries: Vec<MetadataEntry>) -> Self {
        let index = NameIndex::new(entries.iter().map(|e| e.name.as_str()));
        SurveyMetadata {
            survey,
            entries,
            index,
        }
    }

    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, name: &str) -> NameMatch<&MetadataEntry> {
        self.index.lookup(name).map(|i| &self.entries[i])
    }
}

/// One row of a host-galaxy mass catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct HostMassEntry {
    pub name: String,
    pub log_mass: f64,
    pub log_mass_err: f64,
}

/// Independent host-galaxy mass catalog.
#[derive(Debug, Clone)]
pub struct HostMassCatalog {
    pub label: String,
    entries: Vec<HostMassEntry>,
    index: NameIndex,
}

impl HostMassCatalog {
    pub fn new(label: impl Into<String>, entries: Vec<HostMassEntry>) -> Self {
        let index = NameIndex::new(entries.iter().map(|e| e.name.as_str()));
        HostMassCatalog {
            label: label.into(),
            entries,
            index,
        }
    }

    pub fn entries(&self) -> &[HostMassEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a host mass, returning it as a [`MassEstimate`] on a unique match.
    pub fn lookup(&self, name: &str) -> NameMatch<MassEstimate> {
        self.index.lookup(name).map(|i| {
            let entry = &self.entries[i];
            MassEstimate {
                log_mass: entry.log_mass,
                log_mass_err: entry.log_mass_err,
                source: MassSource::HostCatalog(self.label.clone()),
            }
        })
    }
}

/// Outcome of a name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum NameMatch<T> {
    /// Canonical names are equal.
    Exact(T),
    /// Exactly one entry contains the queried name.
    Contains(T),
    /// Several entries contain the queried name; none is chosen.
    Ambiguous(usize),
    Missing,
}

impl<T> NameMatch<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NameMatch<U> {
        match self {
            NameMatch::Exact(t) => NameMatch::Exact(f(t)),
            NameMatch::Contains(t) => NameMatch::Contains(f(t)),
            NameMatch::Ambiguous(n) => NameMatch::Ambiguous(n),
            NameMatch::Missing => NameMatch::Missing,
        }
    }

    /// The matched value, if the match is unique.
    pub fn found(self) -> Option<T> {
        match self {
            NameMatch::Exact(t) | NameMatch::Contains(t) => Some(t),
            NameMatch::Ambiguous(_) | NameMatch::Missing => None,
        }
    }
}

/// Name lookup structure shared by the metadata tables.
///
/// Exact matches use the canonical form of both sides. Duplicated canonical names resolve to
/// the first row of the table.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    exact: AHashMap<String, usize>,
    lowered: Vec<String>,
}

impl NameIndex {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = NameIndex::default();
        for (i, raw) in names.into_iter().enumerate() {
            let canonical = canonical_name(raw);
            index.lowered.push(canonical.to_lowercase());
            if index.exact.contains_key(&canonical) {
                tracing::debug!("duplicated metadata name {canonical}, keeping the first row");
            } else {
                index.exact.insert(canonical, i);
            }
        }
        index
    }

    pub fn lookup(&self, name: &str) -> NameMatch<usize> {
        let canonical = canonical_name(name);
        if let Some(&i) = self.exact.get(&canonical) {
            return NameMatch::Exact(i);
        }

        let needle = canonical.to_lowercase();
        let mut hits = self
            .lowered
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.contains(&needle))
            .map(|(i, _)| i);
        match (hits.next(), hits.count()) {
            (None, _) => NameMatch::Missing,
            (Some(i), 0) => NameMatch::Contains(i),
            (Some(_), rest) => NameMatch::Ambiguous(rest + 1),
        }
    }
}
