//! Survey identifiers and canonical object names.
//!
//! Each survey names its supernovae differently: JLA uses bare integers for SDSS objects and a
//! lowercase `sn` prefix for nearby ones, CSP tables drop the `SN` prefix entirely, host-galaxy
//! tables write `ASASSN_15xx` instead of `ASASSN-15xx`. [`canonical_name`] maps all of them to a
//! single form so that names can be used as join keys.
use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{constants::ObjectName, prep_errors::PrepError};

/// Source survey of a light-curve catalog.
///
/// The declaration order is the order used to number subsets; deduplication priority is
/// configured separately (see [`SurveyPriority`](crate::dedup::SurveyPriority)).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Survey {
    Jla,
    Csp,
    Foundation,
}

impl Survey {
    pub const ALL: [Survey; 3] = [Survey::Jla, Survey::Csp, Survey::Foundation];

    pub fn label(&self) -> &'static str {
        match self {
            Survey::Jla => "JLA",
            Survey::Csp => "CSP",
            Survey::Foundation => "Foundation",
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Survey {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jla" => Ok(Survey::Jla),
            "csp" => Ok(Survey::Csp),
            "foundation" | "ps" | "ps1" => Ok(Survey::Foundation),
            _ => Err(PrepError::InvalidConfig(format!("Unknown survey: {s}"))),
        }
    }
}

static SDSS_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:SDSS)?0*(\d+)$").expect("valid SDSS regex"));

static BARE_IAU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[A-Za-z]{1,3}$").expect("valid IAU regex"));

static SN_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sn").expect("valid SN prefix regex"));

/// Normalize a supernova name to its canonical form.
///
/// Rules, applied in order:
/// 1. surrounding whitespace is removed;
/// 2. a bare integer (optionally zero padded or already `SDSS`-prefixed) becomes `SDSS<n>`;
/// 3. a bare IAU designation (`2004ef`) gets the `SN` prefix;
/// 4. an `sn` prefix in any case (`sn`, `Sn`, `sN`) becomes `SN`; the designation after it
///    keeps its case (`2005M` and `2005m` are different objects);
/// 5. `ASASSN_` names use a dash (`ASASSN-15bc`).
///
/// The function is idempotent: `canonical_name(canonical_name(x)) == canonical_name(x)`.
pub fn canonical_name(raw: &str) -> ObjectName {
    let name = raw.trim();

    if let Some(caps) = SDSS_NUMBER.captures(name) {
        return format!("SDSS{}", &caps[1]);
    }
    if BARE_IAU.is_match(name) {
        return format!("SN{name}");
    }
    if SN_PREFIX.is_match(name) {
        return SN_PREFIX.replace(name, "SN").into_owned();
    }
    if name.starts_with("ASASSN") {
        return name.replace('_', "-");
    }
    name.to_string()
}

/// Canonical name from a fit-result file name (`sn2005el.pkl`, `12856.json`).
pub fn name_from_file_name(file_name: &str) -> ObjectName {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    canonical_name(stem)
}
