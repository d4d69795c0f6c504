//! Engine adapters and the driver selection step

/// Bind native parameters onto a sqlx query in order
macro_rules! bind_native {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                type_mapping::NativeValue::Int32(v) => query.bind(*v),
                type_mapping::NativeValue::Int64(v) => query.bind(*v),
                type_mapping::NativeValue::Text(v) => query.bind(v.clone()),
                type_mapping::NativeValue::Bool(v) => query.bind(*v),
                type_mapping::NativeValue::Naive(v) => query.bind(*v),
                type_mapping::NativeValue::Zoned(v) => query.bind(*v),
            };
        }
        query
    }};
}

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use config::{BackendKind, DatabaseConfig};
use sqlx::pool::PoolOptions;
use std::time::Duration;
use type_mapping::{CanonicalType, ScalarKind};

use crate::errors::DialectError;
use crate::traits::DialectAdapter;

/// Open the adapter selected by `config.backend`
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn DialectAdapter>, DialectError> {
    let adapter: Box<dyn DialectAdapter> = match config.backend {
        BackendKind::Embedded => Box::new(SqliteAdapter::connect(config).await?),
        BackendKind::ServerA => Box::new(MySqlAdapter::connect(config).await?),
        BackendKind::ServerB => Box::new(PostgresAdapter::connect(config).await?),
    };
    Ok(adapter)
}

/// Pool sizing and timeouts shared by every engine
pub(crate) fn pool_options<DB: sqlx::Database>(config: &DatabaseConfig) -> PoolOptions<DB> {
    let mut options = PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

    if config.max_lifetime_seconds > 0 {
        options = options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
    }

    options
}

pub(crate) fn connect_error(config: &DatabaseConfig, source: sqlx::Error) -> DialectError {
    DialectError::Connect {
        backend: config.backend,
        target: config.target(),
        source,
    }
}

/// Driver error for a missing configuration value, surfaced as a connect failure
pub(crate) fn missing_setting(config: &DatabaseConfig, setting: &str) -> DialectError {
    connect_error(
        config,
        sqlx::Error::Configuration(format!("missing {} for {}", setting, config.backend).into()),
    )
}

/// 1-based ordinal from an engine-reported position
pub(crate) fn ordinal(table: &str, position: i64) -> Result<u32, DialectError> {
    u32::try_from(position).map_err(|e| {
        DialectError::introspection(table, "read ordinal position", sqlx::Error::Decode(Box::new(e)))
    })
}

pub(crate) fn decode_error(column: &str, source: sqlx::Error) -> DialectError {
    DialectError::query(format!("decode column {}", column), source)
}

/// Per result column: nullable unless the engine reports it NOT NULL
///
/// `known(i)` is the driver's answer for column `i`; `None` (an expression
/// the engine cannot trace to a table column) counts as nullable.
pub(crate) fn nullable_columns(width: usize, known: impl Fn(usize) -> Option<bool>) -> Vec<bool> {
    (0..width).map(|index| known(index) != Some(false)).collect()
}

/// Canonical target for a present cell of result column `index`
pub(crate) fn column_type(kind: ScalarKind, nullable: &[bool], index: usize) -> CanonicalType {
    if nullable.get(index).copied().unwrap_or(true) {
        CanonicalType::nullable(kind)
    } else {
        CanonicalType::required(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_nullability_counts_as_nullable() {
        let reported = [Some(false), Some(true), None];
        let nullable = nullable_columns(reported.len(), |i| reported[i]);
        assert_eq!(nullable, vec![false, true, true]);
    }

    #[test]
    fn test_column_type_follows_the_column_not_the_cell() {
        let nullable = [false, true];
        assert_eq!(
            column_type(ScalarKind::Integer, &nullable, 0),
            CanonicalType::required(ScalarKind::Integer)
        );
        assert_eq!(
            column_type(ScalarKind::Text, &nullable, 1),
            CanonicalType::nullable(ScalarKind::Text)
        );
        // Past the described width the conservative shape applies
        assert_eq!(
            column_type(ScalarKind::Text, &nullable, 5),
            CanonicalType::nullable(ScalarKind::Text)
        );
    }
}
