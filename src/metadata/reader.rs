//! CSV readers for metadata tables.
//!
//! Survey tables come in different layouts (JLA `jla_lcparams.txt` is whitespace separated,
//! CSP DR3 tables are tab separated with `#` comments, host catalogs are plain CSV). The column
//! names are therefore configurable: [`SurveyColumns`] and [`HostMassColumns`] map table
//! headers onto [`MetadataEntry`] / [`HostMassEntry`] fields.
//!
//! Empty cells and the usual missing-value markers (`nan`, `NaN`, `--`, `-99`) are read as
//! missing values.
use std::fs;

use camino::Utf8Path;
use csv::StringRecord;

use crate::{
    catalog::survey::Survey,
    constants::DEFAULT_MASS_ERR,
    metadata::{HostMassCatalog, HostMassEntry, MetadataEntry, SurveyMetadata},
    prep_errors::PrepError,
};

/// Field separator of a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delimiter {
    Char(u8),
    /// Any run of spaces or tabs.
    Whitespace,
}

/// Column layout of a survey metadata table.
#[derive(Debug, Clone)]
pub struct SurveyColumns {
    pub name: String,
    pub z_helio: Option<String>,
    pub z_cmb: Option<String>,
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub subset: Option<String>,
    pub log_mass: Option<String>,
    pub log_mass_err: Option<String>,
    /// Extra host properties; the uncertainty is read from `<column>_err`.
    pub extras: Vec<String>,
    pub delimiter: Delimiter,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        SurveyColumns {
            name: "name".into(),
            z_helio: Some("z_helio".into()),
            z_cmb: Some("z_cmb".into()),
            ra: Some("ra".into()),
            dec: Some("dec".into()),
            subset: Some("subset".into()),
            log_mass: Some("log_mass".into()),
            log_mass_err: Some("log_mass_err".into()),
            extras: Vec::new(),
            delimiter: Delimiter::Char(b','),
        }
    }
}

impl SurveyColumns {
    /// Layout of the JLA light-curve parameter table (`jla_lcparams.txt`).
    pub fn jla() -> Self {
        SurveyColumns {
            name: "name".into(),
            z_helio: Some("zhel".into()),
            z_cmb: Some("zcmb".into()),
            ra: None,
            dec: None,
            subset: Some("set".into()),
            log_mass: Some("3rdvar".into()),
            log_mass_err: Some("d3rdvar".into()),
            extras: Vec::new(),
            delimiter: Delimiter::Whitespace,
        }
    }

    /// Layout of the CSP DR3 object table (heliocentric redshift and sexagesimal position).
    pub fn csp_dr3() -> Self {
        SurveyColumns {
            name: "SN".into(),
            z_helio: Some("zhelio".into()),
            z_cmb: None,
            ra: Some("RA".into()),
            dec: Some("DEC".into()),
            subset: None,
            log_mass: None,
            log_mass_err: None,
            extras: Vec::new(),
            delimiter: Delimiter::Char(b'\t'),
        }
    }
}

/// Uncertainty columns of a host-mass catalog.
#[derive(Debug, Clone)]
pub enum MassErrorColumns {
    Symmetric(String),
    /// Lower and upper 1-σ errors, both stored as positive widths and averaged as given.
    Asymmetric { lo: String, hi: String },
    /// No error column: every entry gets [`DEFAULT_MASS_ERR`].
    Missing,
}

/// Column layout of a host-mass catalog.
#[derive(Debug, Clone)]
pub struct HostMassColumns {
    pub name: String,
    pub log_mass: String,
    pub error: MassErrorColumns,
    pub delimiter: Delimiter,
}

impl Default for HostMassColumns {
    fn default() -> Self {
        HostMassColumns {
            name: "name".into(),
            log_mass: "log_mass".into(),
            error: MassErrorColumns::Symmetric("log_mass_err".into()),
            delimiter: Delimiter::Char(b','),
        }
    }
}

impl HostMassColumns {
    /// Whitespace-separated table with `Mass`, `Mass_lo`, `Mass_hi` columns.
    pub fn asymmetric_whitespace() -> Self {
        HostMassColumns {
            name: "name".into(),
            log_mass: "Mass".into(),
            error: MassErrorColumns::Asymmetric {
                lo: "Mass_lo".into(),
                hi: "Mass_hi".into(),
            },
            delimiter: Delimiter::Whitespace,
        }
    }

    /// SNANA FITRES-style table with `CID`, `HOST_LOGMASS`, `HOST_LOGMASS_ERR`.
    pub fn snana() -> Self {
        HostMassColumns {
            name: "CID".into(),
            log_mass: "HOST_LOGMASS".into(),
            error: MassErrorColumns::Symmetric("HOST_LOGMASS_ERR".into()),
            delimiter: Delimiter::Whitespace,
        }
    }
}

/// Header-aware access to the rows of one table.
struct Table {
    source: String,
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    fn parse(source: &str, text: &str, delimiter: Delimiter) -> Result<Self, PrepError> {
        let (text, sep) = match delimiter {
            Delimiter::Char(c) => (text.to_string(), c),
            Delimiter::Whitespace => (
                text.lines()
                    .map(|l| l.split_whitespace().collect::<Vec<_>>().join("\t"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                b'\t',
            ),
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(sep)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Table {
            source: source.to_string(),
            headers,
            rows,
        })
    }

    fn column(&self, name: &str) -> Result<usize, PrepError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                PrepError::SchemaMismatch(format!("{}: no column named `{name}`", self.source))
            })
    }

    fn optional_column(&self, name: Option<&String>) -> Result<Option<usize>, PrepError> {
        name.map(|n| self.column(n)).transpose()
    }

    fn text<'a>(&self, row: &'a StringRecord, col: usize) -> &'a str {
        row.get(col).unwrap_or("")
    }

    fn number(
        &self,
        row: &StringRecord,
        col: usize,
        line: usize,
    ) -> Result<Option<f64>, PrepError> {
        let raw = self.text(row, col);
        if matches!(raw, "" | "nan" | "NaN" | "--" | "-99" | "-99.0") {
            return Ok(None);
        }
        let value = raw.parse::<f64>().map_err(|_| {
            PrepError::InvalidParameter(format!(
                "{} row {line}: column `{}` holds `{raw}`, not a number",
                self.source,
                &self.headers[col]
            ))
        })?;
        Ok(value.is_finite().then_some(value))
    }
}

fn parse_survey_table(
    source: &str,
    text: &str,
    survey: Survey,
    columns: &SurveyColumns,
) -> Result<SurveyMetadata, PrepError> {
    let table = Table::parse(source, text, columns.delimiter)?;
    let name = table.column(&columns.name)?;
    let z_helio = table.optional_column(columns.z_helio.as_ref())?;
    let z_cmb = table.optional_column(columns.z_cmb.as_ref())?;
    let ra = table.optional_column(columns.ra.as_ref())?;
    let dec = table.optional_column(columns.dec.as_ref())?;
    let subset = table.optional_column(columns.subset.as_ref())?;
    let log_mass = table.optional_column(columns.log_mass.as_ref())?;
    let log_mass_err = table.optional_column(columns.log_mass_err.as_ref())?;
    let extras = columns
        .extras
        .iter()
        .map(|col| Ok((col.clone(), table.column(col)?, table.column(&format!("{col}_err"))?)))
        .collect::<Result<Vec<_>, PrepError>>()?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for (line, row) in table.rows.iter().enumerate() {
        let num = |col: Option<usize>| -> Result<Option<f64>, PrepError> {
            col.map(|c| table.number(row, c, line)).transpose().map(Option::flatten)
        };
        let mut entry = MetadataEntry {
            name: table.text(row, name).to_string(),
            z_helio: num(z_helio)?,
            z_cmb: num(z_cmb)?,
            ra: ra.map(|c| table.text(row, c).to_string()),
            dec: dec.map(|c| table.text(row, c).to_string()),
            subset: num(subset)?.map(|s| s as i64).unwrap_or(0),
            log_mass: num(log_mass)?,
            log_mass_err: num(log_mass_err)?,
            ..Default::default()
        };
        for (label, value, err) in &extras {
            if let (Some(v), Some(e)) = (num(Some(*value))?, num(Some(*err))?) {
                entry.extras.insert(label.clone(), (v, e));
            }
        }
        entries.push(entry);
    }

    tracing::debug!("{source}: read {} {survey} metadata rows", entries.len());
    Ok(SurveyMetadata::new(survey, entries))
}

fn parse_host_mass_table(
    source: &str,
    text: &str,
    label: &str,
    columns: &HostMassColumns,
) -> Result<HostMassCatalog, PrepError> {
    let table = Table::parse(source, text, columns.delimiter)?;
    let name = table.column(&columns.name)?;
    let mass = table.column(&columns.log_mass)?;
    let error = match &columns.error {
        MassErrorColumns::Symmetric(col) => vec![table.column(col)?],
        MassErrorColumns::Asymmetric { lo, hi } => vec![table.column(lo)?, table.column(hi)?],
        MassErrorColumns::Missing => Vec::new(),
    };

    let mut entries = Vec::with_capacity(table.rows.len());
    for (line, row) in table.rows.iter().enumerate() {
        let Some(log_mass) = table.number(row, mass, line)? else {
            tracing::debug!("{source} row {line}: no host mass, skipped");
            continue;
        };
        let errs = error
            .iter()
            .map(|&c| table.number(row, c, line))
            .collect::<Result<Option<Vec<f64>>, PrepError>>()?;
        let log_mass_err = match errs {
            Some(errs) if !errs.is_empty() => errs.iter().sum::<f64>() / errs.len() as f64,
            _ => DEFAULT_MASS_ERR,
        };
        entries.push(HostMassEntry {
            name: table.text(row, name).to_string(),
            log_mass,
            log_mass_err,
        });
    }

    tracing::debug!("{source}: read {} host masses for {label}", entries.len());
    Ok(HostMassCatalog::new(label, entries))
}

/// Read a survey metadata table.
pub fn read_survey_metadata(
    path: &Utf8Path,
    survey: Survey,
    columns: &SurveyColumns,
) -> Result<SurveyMetadata, PrepError> {
    let text = fs::read_to_string(path)?;
    parse_survey_table(path.as_str(), &text, survey, columns)
}

/// Read a host-galaxy mass catalog.
pub fn read_host_mass_catalog(
    path: &Utf8Path,
    label: &str,
    columns: &HostMassColumns,
) -> Result<HostMassCatalog, PrepError> {
    let text = fs::read_to_string(path)?;
    parse_host_mass_table(path.as_str(), &text, label, columns)
}
