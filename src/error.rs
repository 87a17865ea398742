use std::path::PathBuf;

use thiserror::Error;

use crate::filter::ValueKind;

/// Errors raised while binding, compiling or paginating a filter.
///
/// Unknown filter fields are deliberately absent: they are skipped, not
/// rejected.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("cannot sort by '{field}': entity '{entity}' has no such property")]
    UnresolvableSortField { entity: String, field: String },

    #[error("invalid sort specification '{0}', expected \"<field>[ asc|desc]\"")]
    InvalidSortSpec(String),

    #[error("cannot compare property '{property}' as {expected}: found {found}")]
    TypeCoercionFailure {
        property: String,
        expected: ValueKind,
        found: String,
    },

    #[error("invalid page request: {field} must be positive, got {value}")]
    InvalidPageRequest { field: &'static str, value: i64 },

    #[error("expected {0} to serialize as a mapping")]
    NotAMapping(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

impl FilterError {
    pub(crate) fn coercion(property: &str, expected: ValueKind, found: impl Into<String>) -> Self {
        FilterError::TypeCoercionFailure {
            property: property.to_string(),
            expected,
            found: found.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("filter prefix '{0}' is not configured")]
    MissingPrefix(&'static str),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
