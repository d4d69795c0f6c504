//! Error types for the polystore crate
//!
//! Every failure surfaced by the connection manager, the introspection engine
//! and the resolver is one of these variants. Driver errors stay attached as
//! the source.

use config::{BackendKind, ConfigError};
use dialect::{DialectError, ValidationError};
use thiserror::Error;
use type_mapping::ConversionError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection to {backend} at {target} failed: {source}")]
    ConnectionFailed {
        backend: BackendKind,
        target: String,
        source: DialectError,
    },

    #[error("Database unreachable: {0}")]
    Unreachable(#[source] DialectError),

    #[error("Query failed: {0}")]
    QueryFailed(#[source] DialectError),

    #[error("Introspection of {table} failed: {source}")]
    IntrospectionFailed { table: String, source: DialectError },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unsupported column type {type_name} in column {column}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error("Conversion overflow: {0}")]
    ConversionOverflow(#[source] ConversionError),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[source] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cyclic foreign key dependency among: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
}

impl StoreError {
    /// Classify an adapter error raised while running a statement
    pub(crate) fn from_query(err: DialectError) -> Self {
        match err {
            DialectError::Conversion(source @ ConversionError::Overflow { .. }) => {
                StoreError::ConversionOverflow(source)
            }
            DialectError::UnsupportedColumnType { column, type_name } => {
                StoreError::UnsupportedColumnType { column, type_name }
            }
            other => StoreError::QueryFailed(other),
        }
    }

    pub(crate) fn introspection(table: impl Into<String>, source: DialectError) -> Self {
        StoreError::IntrospectionFailed {
            table: table.into(),
            source,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownTable(name) => StoreError::UnknownTable(name),
            other => StoreError::InvalidIdentifier(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_mapping::IntWidth;

    #[test]
    fn test_unknown_table_keeps_its_own_variant() {
        let err: StoreError = ValidationError::UnknownTable("nope".into()).into();
        assert!(matches!(err, StoreError::UnknownTable(ref name) if name == "nope"));

        let err: StoreError = ValidationError::Empty.into();
        assert!(matches!(err, StoreError::InvalidIdentifier(ValidationError::Empty)));
    }

    #[test]
    fn test_overflow_is_classified() {
        let err = StoreError::from_query(DialectError::Conversion(ConversionError::Overflow {
            value: 5_000_000_000,
            width: IntWidth::Bits32,
        }));
        assert!(matches!(err, StoreError::ConversionOverflow(_)));
        assert!(err.to_string().contains("5000000000"));
    }

    #[test]
    fn test_unsupported_column_keeps_its_name() {
        let err = StoreError::from_query(DialectError::UnsupportedColumnType {
            column: "payload".into(),
            type_name: "BLOB".into(),
        });
        assert_eq!(
            err.to_string(),
            "Unsupported column type BLOB in column payload"
        );
    }

    #[test]
    fn test_cycle_message_lists_tables() {
        let err = StoreError::CyclicDependency(vec!["roles".into(), "users".into()]);
        assert_eq!(
            err.to_string(),
            "Cyclic foreign key dependency among: roles, users"
        );
    }
}
