//! Embedded engine (SQLite)
//!
//! Metadata comes from the `pragma_table_info` and `pragma_foreign_key_list`
//! table-valued functions; no joins are needed. Foreign key enforcement is
//! off by default in SQLite, so every pooled connection turns it on.

use async_trait::async_trait;
use config::{BackendKind, DatabaseConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use type_mapping::{
    parse_timestamp, CanonicalRow, CanonicalValue, CellShape, NativeProfile, NativeValue,
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

const MEMORY_PATH: &str = ":memory:";

const COLUMNS_SQL: &str = "SELECT cid, name, type FROM pragma_table_info(?1) ORDER BY cid";

const FOREIGN_KEYS_SQL: &str = r#"SELECT id, seq, "table", "from", "to", on_update, on_delete, "match"
FROM pragma_foreign_key_list(?1)
ORDER BY id, seq"#;

const FOREIGN_KEYS_FOR_COLUMN_SQL: &str = r#"SELECT id, seq, "table", "from", "to", on_update, on_delete, "match"
FROM pragma_foreign_key_list(?1)
WHERE "from" = ?2
ORDER BY id, seq"#;

const PRIMARY_KEY_SQL: &str = "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk";

const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) AS found FROM sqlite_master WHERE type = 'table' AND name = ?1";

const TABLES_SQL: &str = r"SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY name";

/// Adapter over a single-file (or in-memory) SQLite database
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
    pool: SqlitePool,
    profile: NativeProfile,
}

impl SqliteAdapter {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DialectError> {
        let path = config
            .file_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| missing_setting(config, "file_path"))?;
        let in_memory = path == MEMORY_PATH;

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| connect_error(config, e))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        let options = options.foreign_keys(true);

        let mut pool_options = pool_options::<Sqlite>(config);
        if in_memory {
            // An in-memory database lives and dies with its one connection
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| connect_error(config, e))?;

        tracing::info!(db = %config.target(), "Opened embedded database");

        Ok(Self {
            pool,
            profile: NativeProfile::for_backend(BackendKind::Embedded, config.narrowing),
        })
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Nullability of every result column of `sql`, from the table schema
    ///
    /// A statement the engine cannot describe on its own (untyped
    /// placeholders) is read back with every column nullable.
    async fn nullability(&self, sql: &str, width: usize) -> Vec<bool> {
        match (&self.pool).describe(sql).await {
            Ok(described) => nullable_columns(width, |i| described.nullable(i)),
            Err(_e) => {
                debug_log!("describe failed on sqlite, reading columns as nullable: {}", _e);
                vec![true; width]
            }
        }
    }

    fn decode_row(&self, row: &SqliteRow, nullable: &[bool]) -> Result<CanonicalRow, DialectError> {
        let mut columns = Vec::with_capacity(row.len());
        for (index, column) in row.columns().iter().enumerate() {
            let name = column.name().to_string();
            let declared = ScalarKind::from_type_name(column.type_info().name());
            let value = self.decode_cell(row, index, &name, declared, nullable)?;
            columns.push((name, value));
        }
        Ok(CanonicalRow::new(columns))
    }

    /// Decode by storage class, then refine by the declared column type
    ///
    /// The nullable or required shape comes from the column, never the cell.
    fn decode_cell(
        &self,
        row: &SqliteRow,
        index: usize,
        name: &str,
        declared: ScalarKind,
        nullable: &[bool],
    ) -> Result<CanonicalValue, DialectError> {
        let raw = row.try_get_raw(index).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            return Ok(CanonicalValue::null_of(declared));
        }
        let storage = ScalarKind::from_type_name(raw.type_info().name());

        let (native, kind) = match storage {
            ScalarKind::Integer => {
                let value = row.try_get::<i64, _>(index).map_err(|e| decode_error(name, e))?;
                let kind = if declared == ScalarKind::Boolean {
                    ScalarKind::Boolean
                } else {
                    ScalarKind::Integer
                };
                (NativeValue::Int64(Some(value)), kind)
            }
            ScalarKind::Real => {
                let value = row.try_get::<f64, _>(index).map_err(|e| decode_error(name, e))?;
                (NativeValue::Text(Some(value.to_string())), ScalarKind::Real)
            }
            ScalarKind::Blob => return Err(DialectError::unsupported(name, "BLOB")),
            _ => {
                let value = row
                    .try_get::<String, _>(index)
                    .map_err(|e| decode_error(name, e))?;
                if declared == ScalarKind::Timestamp {
                    // Normalizes engine defaults such as CURRENT_TIMESTAMP text
                    let instant = parse_timestamp(&value)?;
                    (NativeValue::Zoned(Some(instant)), ScalarKind::Timestamp)
                } else {
                    (NativeValue::Text(Some(value)), ScalarKind::Text)
                }
            }
        };

        Ok(self
            .profile
            .from_native(native, column_type(kind, nullable, index))?)
    }

    fn cell_shape(row: &SqliteRow) -> Result<CellShape, DialectError> {
        let name = row.columns().first().map(|c| c.name()).unwrap_or("?");
        let raw = row.try_get_raw(0).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            return Ok(CellShape::Unsupported {
                type_name: "NULL".to_string(),
            });
        }
        let type_name = raw.type_info().name().to_string();

        match ScalarKind::from_type_name(&type_name) {
            ScalarKind::Integer => row
                .try_get::<i64, _>(0)
                .map(CellShape::Integer)
                .map_err(|e| decode_error(name, e)),
            ScalarKind::Text => row
                .try_get::<String, _>(0)
                .map(CellShape::Text)
                .map_err(|e| decode_error(name, e)),
            _ => Ok(CellShape::Unsupported { type_name }),
        }
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, DialectError> {
        let rows = sqlx::query(PRIMARY_KEY_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table, "resolve primary key", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|e| DialectError::introspection(table, "resolve primary key", e))
            })
            .collect()
    }

    async fn decode_edge(
        &self,
        table: DbTable,
        row: &SqliteRow,
    ) -> Result<ForeignKeyEdge, DialectError> {
        let read = |column: &str| {
            row.try_get::<String, _>(column)
                .map_err(|e| DialectError::introspection(table.as_str(), "list foreign keys", e))
        };

        let target_table = read("table")?;
        let declared_target = row
            .try_get::<Option<String>, _>("to")
            .map_err(|e| DialectError::introspection(table.as_str(), "list foreign keys", e))?;

        let target_column = match declared_target {
            Some(column) => column,
            None => {
                // REFERENCES parent without a column list means the parent's primary key
                let seq = row
                    .try_get::<i64, _>("seq")
                    .map_err(|e| DialectError::introspection(table.as_str(), "list foreign keys", e))?;
                let key = self.primary_key(&target_table).await?;
                usize::try_from(seq)
                    .ok()
                    .and_then(|seq| key.get(seq).cloned())
                    .unwrap_or_default()
            }
        };

        Ok(ForeignKeyEdge {
            source_table: table.as_str().to_string(),
            source_column: read("from")?,
            target_table,
            target_column,
            on_update_action: read("on_update")?,
            on_delete_action: read("on_delete")?,
            match_type: read("match")?,
        })
    }
}

#[async_trait]
impl DialectAdapter for SqliteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn profile(&self) -> &NativeProfile {
        &self.profile
    }

    async fn ping(&self) -> Result<(), DialectError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DialectError::Ping {
                backend: BackendKind::Embedded,
                source,
            })?;
        Ok(())
    }

    async fn execute_statement(&self, sql: &str) -> Result<u64, DialectError> {
        debug_log!("Executing on sqlite: {}", sql);
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
        debug_log!("Fetching on sqlite with {} params: {}", params.len(), sql);
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
        debug_log!("Listing columns of {} on sqlite", table);
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "list columns", e))?;

        rows.iter()
            .map(|row| {
                let fail = |e| DialectError::introspection(table.as_str(), "list columns", e);
                let cid = row.try_get::<i64, _>("cid").map_err(fail)?;
                Ok(ColumnDescriptor {
                    name: row.try_get("name").map_err(fail)?,
                    declared_type: row.try_get("type").map_err(fail)?,
                    ordinal_position: ordinal(table.as_str(), cid + 1)?,
                })
            })
            .collect()
    }

    async fn foreign_keys(
        &self,
        table: DbTable,
        column: Option<&ValidatedColumnName>,
    ) -> Result<Vec<ForeignKeyEdge>, DialectError> {
        debug_log!("Listing foreign keys of {} ({:?}) on sqlite", table, column);
        let query = match column {
            None => sqlx::query(FOREIGN_KEYS_SQL).bind(table.as_str()),
            Some(column) => sqlx::query(FOREIGN_KEYS_FOR_COLUMN_SQL)
                .bind(table.as_str())
                .bind(column.as_str()),
        };
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DialectError::introspection(table.as_str(), "list foreign keys", e))?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            edges.push(self.decode_edge(table, row).await?);
        }
        Ok(edges)
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
        tracing::info!("Closed embedded database");
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
