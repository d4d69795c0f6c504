//! ServerB engine (PostgreSQL)
//!
//! Metadata comes from `information_schema`, scoped to `current_schema()`.
//! Identifier-typed columns are cast to `text` so they decode as strings.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use config::{BackendKind, DatabaseConfig};
use sqlx::postgres::{PgConnectOptions, PgPool, PgRow};
use sqlx::{Column, Executor, Postgres, Row, TypeInfo, ValueRef};
use type_mapping::{
    widen, CanonicalRow, CanonicalType, CanonicalValue, CellShape, NativeProfile, NativeValue,
    ScalarKind,
};

use super::{
    column_type, connect_error, decode_error, missing_setting, nullable_columns, ordinal,
    pool_options,
};
use crate::errors::DialectError;
use crate::schema::{ColumnDescriptor, ForeignKeyEdge};
use crate::table::DbTable;
use crate::traits::DialectAdapter;
use crate::validation::ValidatedColumnName;

const COLUMNS_SQL: &str = r#"
SELECT
    column_name::text AS column_name,
    data_type::text AS data_type,
    ordinal_position::int4 AS ordinal_position
FROM information_schema.columns
WHERE table_schema = current_schema() AND table_name = $1
ORDER BY ordinal_position
"#;

const FOREIGN_KEYS_SELECT: &str = r#"
SELECT
    kcu.table_name::text AS source_table,
    kcu.column_name::text AS source_column,
    pk.table_name::text AS target_table,
    pk.column_name::text AS target_column,
    rc.update_rule::text AS on_update,
    rc.delete_rule::text AS on_delete,
    rc.match_option::text AS match_type
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
    ON kcu.constraint_schema = tc.constraint_schema
    AND kcu.constraint_name = tc.constraint_name
JOIN information_schema.referential_constraints rc
    ON rc.constraint_schema = tc.constraint_schema
    AND rc.constraint_name = tc.constraint_name
JOIN information_schema.key_column_usage pk
    ON pk.constraint_schema = rc.unique_constraint_schema
    AND pk.constraint_name = rc.unique_constraint_name
    AND pk.ordinal_position = kcu.position_in_unique_constraint
WHERE tc.constraint_type = 'FOREIGN KEY'
    AND tc.table_schema = current_schema()
    AND tc.table_name = $1
"#;

const COLUMN_FILTER: &str = "    AND kcu.column_name = $2\n";

const FOREIGN_KEYS_ORDER: &str = "ORDER BY tc.constraint_name, kcu.ordinal_position\n";

/// Composite keys pair each referencing column with the referenced column at
/// the same position, one row per pair
fn foreign_keys_sql(filtered: bool) -> String {
    let filter = if filtered { COLUMN_FILTER } else { "" };
    format!("{}{}{}", FOREIGN_KEYS_SELECT, filter, FOREIGN_KEYS_ORDER)
}

const TABLE_EXISTS_SQL: &str = r#"
SELECT COUNT(*) FROM information_schema.tables
WHERE table_schema = current_schema() AND table_name = $1
"#;

const TABLES_SQL: &str = r#"
SELECT table_name::text
FROM information_schema.tables
WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

/// Adapter over a PostgreSQL database
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
    profile: NativeProfile,
}

impl PostgresAdapter {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DialectError> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| missing_setting(config, "host"))?;
        let port = config
            .effective_port()
            .ok_or_else(|| missing_setting(config, "port"))?;

        let mut options = PgConnectOptions::new().host(host).port(port);
        if let Some(username) = config.username.as_deref() {
            options = options.username(username);
        }
        if let Some(password) = config.password.as_deref() {
            options = options.password(password);
        }
        if let Some(database) = config.database.as_deref() {
            options = options.database(database);
        }

        let pool = pool_options::<Postgres>(config)
            .connect_with(options)
            .await
            .map_err(|e| connect_error(config, e))?;

        tracing::info!(db = %config.target(), "Connected to PostgreSQL");

        Ok(Self {
            pool,
            profile: NativeProfile::for_backend(BackendKind::ServerB, config.narrowing),
        })
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Nullability of every result column of `sql`, as the server reports it
    ///
    /// A statement the engine cannot describe on its own (untyped
    /// placeholders) is read back with every column nullable.
    async fn nullability(&self, sql: &str, width: usize) -> Vec<bool> {
        match (&self.pool).describe(sql).await {
            Ok(described) => nullable_columns(width, |i| described.nullable(i)),
            Err(_e) => {
                debug_log!("describe failed on postgres, reading columns as nullable: {}", _e);
                vec![true; width]
            }
        }
    }

    fn decode_row(&self, row: &PgRow, nullable: &[bool]) -> Result<CanonicalRow, DialectError> {
        let mut columns = Vec::with_capacity(row.len());
        for (index, column) in row.columns().iter().enumerate() {
            let name = column.name().to_string();
            let target = column_type(
                ScalarKind::from_type_name(column.type_info().name()),
                nullable,
                index,
            );
            let value = self.decode_cell(row, index, &name, column.type_info().name(), target)?;
            columns.push((name, value));
        }
        Ok(CanonicalRow::new(columns))
    }

    fn decode_cell(
        &self,
        row: &PgRow,
        index: usize,
        name: &str,
        type_name: &str,
        target: CanonicalType,
    ) -> Result<CanonicalValue, DialectError> {
        let kind = target.kind;
        let is_null = row
            .try_get_raw(index)
            .map(|raw| raw.is_null())
            .map_err(|e| decode_error(name, e))?;
        if is_null {
            return Ok(CanonicalValue::null_of(kind));
        }

        let fail = |e| decode_error(name, e);
        let native = match kind {
            ScalarKind::Integer => read_integer(row, index, name, type_name)?,
            ScalarKind::Boolean => NativeValue::Bool(Some(row.try_get::<bool, _>(index).map_err(fail)?)),
            ScalarKind::Timestamp => NativeValue::Zoned(Some(read_instant(row, index, name, type_name)?)),
            ScalarKind::Real => {
                let value = match type_name {
                    "FLOAT4" => row.try_get::<f32, _>(index).map_err(fail)?.to_string(),
                    "FLOAT8" => row.try_get::<f64, _>(index).map_err(fail)?.to_string(),
                    _ => return Err(DialectError::unsupported(name, type_name)),
                };
                NativeValue::Text(Some(value))
            }
            ScalarKind::Text => {
                let value = row
                    .try_get::<String, _>(index)
                    .map_err(|_| DialectError::unsupported(name, type_name))?;
                NativeValue::Text(Some(value))
            }
            ScalarKind::Blob => return Err(DialectError::unsupported(name, type_name)),
        };

        Ok(self.profile.from_native(native, target)?)
    }

    fn cell_shape(row: &PgRow) -> Result<CellShape, DialectError> {
        let Some(column) = row.columns().first() else {
            return Ok(CellShape::Unsupported {
                type_name: "NULL".to_string(),
            });
        };
        let name = column.name();
        let type_name = column.type_info().name();

        let is_null = row
            .try_get_raw(0)
            .map(|raw| raw.is_null())
            .map_err(|e| decode_error(name, e))?;
        if is_null {
            return Ok(CellShape::Unsupported {
                type_name: "NULL".to_string(),
            });
        }

        match ScalarKind::from_type_name(type_name) {
            ScalarKind::Integer => match read_integer(row, 0, name, type_name)? {
                NativeValue::Int32(Some(v)) => Ok(CellShape::Integer(widen(v))),
                NativeValue::Int64(Some(v)) => Ok(CellShape::Integer(v)),
                _ => Ok(CellShape::Unsupported {
                    type_name: type_name.to_string(),
                }),
            },
            ScalarKind::Text => match row.try_get::<String, _>(0) {
                Ok(value) => Ok(CellShape::Text(value)),
                Err(_) => Ok(CellShape::Unsupported {
                    type_name: type_name.to_string(),
                }),
            },
            _ => Ok(CellShape::Unsupported {
                type_name: type_name.to_string(),
            }),
        }
    }
}

fn read_integer(
    row: &PgRow,
    index: usize,
    name: &str,
    type_name: &str,
) -> Result<NativeValue, DialectError> {
    let fail = |e| decode_error(name, e);
    match type_name {
        "INT8" => row
            .try_get::<i64, _>(index)
            .map(|v| NativeValue::Int64(Some(v)))
            .map_err(fail),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| NativeValue::Int32(Some(i32::from(v))))
            .map_err(fail),
        _ => row
            .try_get::<i32, _>(index)
            .map(|v| NativeValue::Int32(Some(v)))
            .map_err(fail),
    }
}

/// Zone-less values are taken as UTC
fn read_instant(
    row: &PgRow,
    index: usize,
    name: &str,
    type_name: &str,
) -> Result<DateTime<Utc>, DialectError> {
    let fail = |e| decode_error(name, e);
    match type_name {
        "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(index).map_err(fail),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|naive| naive.and_utc())
            .map_err(fail),
        "DATE" => {
            let date = row.try_get::<NaiveDate, _>(index).map_err(fail)?;
            date.and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .ok_or_else(|| DialectError::unsupported(name, type_name))
        }
        _ => Err(DialectError::unsupported(name, type_name)),
    }
}

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::ServerB
    }

    fn profile(&self) -> &NativeProfile {
        &self.profile
    }

    async fn ping(&self) -> Result<(), DialectError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DialectError::Ping {
                backend: BackendKind::ServerB,
                source,
            })?;
        Ok(())
    }

    async fn execute_statement(&self, sql: &str) -> Result<u64, DialectError> {
        debug_log!("Executing on postgres: {}", sql);
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| DialectError::query(sql, e))?;
        Ok(result.rows_affected())
    }

    async fn fetch(
        &self,
        sql: &str,
        params: &[NativeValue],
    ) -> Result<Vec<CanonicalRow>, DialectError> {
        debug_log!("Fetching on postgres with {} params: {}", params.len(), sql);
        let rows = bind_native!(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::query(sql, e))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let nullable = self.nullability(sql, rows[0].len()).await;
        rows.iter().map(|row| self.decode_row(row, &nullable)).collect()
    }

    async fn fetch_cells(
        &self,
        sql: &str,
    ) -> Result<Vec<Result<CellShape, DialectError>>, DialectError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::query(sql, e))?;
        Ok(rows.iter().map(Self::cell_shape).collect())
    }

    async fn columns(&self, table: DbTable) -> Result<Vec<ColumnDescriptor>, DialectError> {
        debug_log!("Listing columns of {} on postgres", table);
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "list columns", e))?;

        rows.iter()
            .map(|row| {
                let fail = |e| DialectError::introspection(table.as_str(), "list columns", e);
                let position = row.try_get::<i32, _>("ordinal_position").map_err(fail)?;
                Ok(ColumnDescriptor {
                    name: row.try_get("column_name").map_err(fail)?,
                    declared_type: row.try_get("data_type").map_err(fail)?,
                    ordinal_position: ordinal(table.as_str(), i64::from(position))?,
                })
            })
            .collect()
    }

    async fn foreign_keys(
        &self,
        table: DbTable,
        column: Option<&ValidatedColumnName>,
    ) -> Result<Vec<ForeignKeyEdge>, DialectError> {
        debug_log!("Listing foreign keys of {} ({:?}) on postgres", table, column);
        let sql = foreign_keys_sql(column.is_some());
        let mut query = sqlx::query(&sql).bind(table.as_str());
        if let Some(column) = column {
            query = query.bind(column.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "list foreign keys", e))?;

        rows.iter()
            .map(|row| {
                let read = |field: &str| {
                    row.try_get::<String, _>(field).map_err(|e| {
                        DialectError::introspection(table.as_str(), "list foreign keys", e)
                    })
                };
                Ok(ForeignKeyEdge {
                    source_table: read("source_table")?,
                    source_column: read("source_column")?,
                    target_table: read("target_table")?,
                    target_column: read("target_column")?,
                    on_update_action: read("on_update")?,
                    on_delete_action: read("on_delete")?,
                    match_type: read("match_type")?,
                })
            })
            .collect()
    }

    async fn table_exists(&self, table: DbTable) -> Result<bool, DialectError> {
        let found: i64 = sqlx::query_scalar(TABLE_EXISTS_SQL)
            .bind(table.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "check existence", e))?;
        Ok(found > 0)
    }

    async fn tables(&self) -> Result<Vec<String>, DialectError> {
        sqlx::query_scalar(TABLES_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection("*", "list tables", e))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed PostgreSQL pool");
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_rows_are_ordered_after_the_filter() {
        let all = foreign_keys_sql(false);
        assert!(!all.contains("$2"));
        assert!(all.trim_end().ends_with("ORDER BY tc.constraint_name, kcu.ordinal_position"));

        let one = foreign_keys_sql(true);
        let filter = one.find("kcu.column_name = $2").unwrap();
        assert!(filter < one.find("ORDER BY").unwrap());
    }

    #[test]
    fn test_referenced_columns_pair_by_position() {
        let sql = foreign_keys_sql(false);
        assert!(sql.contains("pk.ordinal_position = kcu.position_in_unique_constraint"));
        assert!(!sql.contains("constraint_column_usage"));
    }
}
