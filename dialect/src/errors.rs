use config::BackendKind;
use thiserror::Error;
use type_mapping::ConversionError;

/// Errors raised inside an adapter; every driver error is kept as the source
#[derive(Error, Debug)]
pub enum DialectError {
    #[error("Failed to connect to {backend} at {target}: {source}")]
    Connect {
        backend: BackendKind,
        target: String,
        source: sqlx::Error,
    },

    #[error("Liveness check failed on {backend}: {source}")]
    Ping {
        backend: BackendKind,
        source: sqlx::Error,
    },

    #[error("Query failed ({context}): {source}")]
    Query {
        context: String,
        source: sqlx::Error,
    },

    #[error("Introspection of {table} failed during {operation}: {source}")]
    Introspection {
        table: String,
        operation: &'static str,
        source: sqlx::Error,
    },

    #[error("Table {0} does not exist in the active schema")]
    MissingTable(String),

    #[error("Unsupported column type {type_name} in column {column}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl DialectError {
    pub(crate) fn query(context: impl Into<String>, source: sqlx::Error) -> Self {
        DialectError::Query {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn introspection(
        table: impl Into<String>,
        operation: &'static str,
        source: sqlx::Error,
    ) -> Self {
        DialectError::Introspection {
            table: table.into(),
            operation,
            source,
        }
    }

    pub(crate) fn unsupported(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        DialectError::UnsupportedColumnType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }
}
