use thiserror::Error;

use crate::dataset::DatasetState;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unresolved reference for object {name}: {reason}")]
    UnresolvedReference { name: String, reason: String },

    #[error("Stage `{stage}` requires a dataset in state {expected}, found {found}")]
    OrderingError {
        stage: &'static str,
        expected: String,
        found: DatasetState,
    },

    #[error("Cardinality error: {0}")]
    CardinalityError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV reader error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

impl PrepError {
    pub(crate) fn unresolved(name: &str, reason: impl Into<String>) -> Self {
        PrepError::UnresolvedReference {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn ordering(
        stage: &'static str,
        expected: &[DatasetState],
        found: DatasetState,
    ) -> Self {
        let expected = expected
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        PrepError::OrderingError {
            stage,
            expected,
            found,
        }
    }
}

impl PartialEq for PrepError {
    fn eq(&self, other: &Self) -> bool {
        use PrepError::*;
        match (self, other) {
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (SchemaMismatch(a), SchemaMismatch(b)) => a == b,
            (
                UnresolvedReference { name: a, reason: r },
                UnresolvedReference { name: b, reason: s },
            ) => a == b && r == s,
            (
                OrderingError {
                    stage: a,
                    expected: e,
                    found: f,
                },
                OrderingError {
                    stage: b,
                    expected: g,
                    found: h,
                },
            ) => a == b && e == g && f == h,
            (CardinalityError(a), CardinalityError(b)) => a == b,
            (InvalidConfig(a), InvalidConfig(b)) => a == b,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (TomlError(_), TomlError(_)) => true,
            (TomlParseError(_), TomlParseError(_)) => true,

            _ => false,
        }
    }
}
