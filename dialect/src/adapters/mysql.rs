//! ServerA engine (MySQL)
//!
//! Metadata comes from `INFORMATION_SCHEMA`, scoped to `DATABASE()`. Text
//! columns of the metadata relations are cast to `CHAR` so they decode as
//! strings regardless of the server's collation.

use async_trait::async_trait;
use config::{BackendKind, DatabaseConfig};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlRow};
use sqlx::{Column, Executor, MySql, Row, TypeInfo, ValueRef};
use type_mapping::{
    CanonicalRow, CanonicalType, CanonicalValue, CellShape, NativeProfile, NativeValue, ScalarKind,
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
    CAST(COLUMN_NAME AS CHAR(255)) AS column_name,
    CAST(COLUMN_TYPE AS CHAR(255)) AS column_type,
    CAST(ORDINAL_POSITION AS SIGNED) AS ordinal_position
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEYS_SELECT: &str = r#"
SELECT
    CAST(kcu.TABLE_NAME AS CHAR(255)) AS source_table,
    CAST(kcu.COLUMN_NAME AS CHAR(255)) AS source_column,
    CAST(kcu.REFERENCED_TABLE_NAME AS CHAR(255)) AS target_table,
    CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR(255)) AS target_column,
    CAST(rc.UPDATE_RULE AS CHAR(64)) AS on_update,
    CAST(rc.DELETE_RULE AS CHAR(64)) AS on_delete,
    CAST(rc.MATCH_OPTION AS CHAR(64)) AS match_type
FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
    ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
    AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
    AND kcu.TABLE_NAME = tc.TABLE_NAME
JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
    ON rc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
    AND rc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
WHERE tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
    AND tc.TABLE_SCHEMA = DATABASE()
    AND tc.TABLE_NAME = ?
"#;

const COLUMN_FILTER: &str = "    AND kcu.COLUMN_NAME = ?\n";

const FOREIGN_KEYS_ORDER: &str = "ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION\n";

fn foreign_keys_sql(filtered: bool) -> String {
    let filter = if filtered { COLUMN_FILTER } else { "" };
    format!("{}{}{}", FOREIGN_KEYS_SELECT, filter, FOREIGN_KEYS_ORDER)
}

const TABLE_EXISTS_SQL: &str = r#"
SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
"#;

const TABLES_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR(255)) AS table_name
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME
"#;

/// Adapter over a MySQL server database
#[derive(Debug, Clone)]
pub struct MySqlAdapter {
    pool: MySqlPool,
    profile: NativeProfile,
}

impl MySqlAdapter {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DialectError> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| missing_setting(config, "host"))?;
        let port = config
            .effective_port()
            .ok_or_else(|| missing_setting(config, "port"))?;

        let mut options = MySqlConnectOptions::new().host(host).port(port);
        if let Some(username) = config.username.as_deref() {
            options = options.username(username);
        }
        if let Some(password) = config.password.as_deref() {
            options = options.password(password);
        }
        if let Some(database) = config.database.as_deref() {
            options = options.database(database);
        }

        let pool = pool_options::<MySql>(config)
            .connect_with(options)
            .await
            .map_err(|e| connect_error(config, e))?;

        tracing::info!(db = %config.target(), "Connected to MySQL");

        Ok(Self {
            pool,
            profile: NativeProfile::for_backend(BackendKind::ServerA, config.narrowing),
        })
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &MySqlPool {
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
                debug_log!("describe failed on mysql, reading columns as nullable: {}", _e);
                vec![true; width]
            }
        }
    }

    fn decode_row(&self, row: &MySqlRow, nullable: &[bool]) -> Result<CanonicalRow, DialectError> {
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
        row: &MySqlRow,
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
            ScalarKind::Timestamp => {
                let value = if type_name == "DATE" {
                    row.try_get::<chrono::NaiveDate, _>(index)
                        .map_err(fail)?
                        .and_hms_opt(0, 0, 0)
                } else {
                    Some(row.try_get::<chrono::NaiveDateTime, _>(index).map_err(fail)?)
                };
                NativeValue::Naive(value)
            }
            ScalarKind::Real => {
                let value = match type_name {
                    "FLOAT" => row.try_get::<f32, _>(index).map_err(fail)?.to_string(),
                    "DOUBLE" => row.try_get::<f64, _>(index).map_err(fail)?.to_string(),
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

    fn cell_shape(row: &MySqlRow) -> Result<CellShape, DialectError> {
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
                NativeValue::Int32(Some(v)) => Ok(CellShape::Integer(type_mapping::widen(v))),
                NativeValue::Int64(Some(v)) => Ok(CellShape::Integer(v)),
                _ => Ok(CellShape::Unsupported {
                    type_name: type_name.to_string(),
                }),
            },
            ScalarKind::Text => row
                .try_get::<String, _>(0)
                .map(CellShape::Text)
                .map_err(|e| decode_error(name, e)),
            _ => Ok(CellShape::Unsupported {
                type_name: type_name.to_string(),
            }),
        }
    }
}

/// Read a non-NULL integer cell at the width MySQL reports for it
fn read_integer(
    row: &MySqlRow,
    index: usize,
    name: &str,
    type_name: &str,
) -> Result<NativeValue, DialectError> {
    let fail = |e| decode_error(name, e);
    match type_name {
        "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(|v| NativeValue::Int64(Some(v)))
            .map_err(fail),
        "BIGINT UNSIGNED" => {
            let value = row.try_get::<u64, _>(index).map_err(fail)?;
            i64::try_from(value)
                .map(|v| NativeValue::Int64(Some(v)))
                .map_err(|e| decode_error(name, sqlx::Error::Decode(Box::new(e))))
        }
        unsigned if unsigned.ends_with("UNSIGNED") => row
            .try_get::<u32, _>(index)
            .map(|v| NativeValue::Int64(Some(i64::from(v))))
            .map_err(fail),
        _ => row
            .try_get::<i32, _>(index)
            .map(|v| NativeValue::Int32(Some(v)))
            .map_err(fail),
    }
}

#[async_trait]
impl DialectAdapter for MySqlAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::ServerA
    }

    fn profile(&self) -> &NativeProfile {
        &self.profile
    }

    async fn ping(&self) -> Result<(), DialectError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DialectError::Ping {
                backend: BackendKind::ServerA,
                source,
            })?;
        Ok(())
    }

    async fn execute_statement(&self, sql: &str) -> Result<u64, DialectError> {
        debug_log!("Executing on mysql: {}", sql);
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
        debug_log!("Fetching on mysql with {} params: {}", params.len(), sql);
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
        debug_log!("Listing columns of {} on mysql", table);
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "list columns", e))?;

        rows.iter()
            .map(|row| {
                let fail = |e| DialectError::introspection(table.as_str(), "list columns", e);
                let position = row.try_get::<i64, _>("ordinal_position").map_err(fail)?;
                Ok(ColumnDescriptor {
                    name: row.try_get("column_name").map_err(fail)?,
                    declared_type: row.try_get("column_type").map_err(fail)?,
                    ordinal_position: ordinal(table.as_str(), position)?,
                })
            })
            .collect()
    }

    async fn foreign_keys(
        &self,
        table: DbTable,
        column: Option<&ValidatedColumnName>,
    ) -> Result<Vec<ForeignKeyEdge>, DialectError> {
        debug_log!("Listing foreign keys of {} ({:?}) on mysql", table, column);
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
        tracing::info!("Closed MySQL pool");
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
