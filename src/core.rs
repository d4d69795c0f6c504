//! Connection manager
//!
//! `ConnectionHandle` owns the one adapter (and so the one pool) for a
//! configured database. Introspection and resolution borrow it per call.

use config::{BackendKind, DatabaseConfig, SchemaBundle};
use dialect::{DbTable, DialectAdapter};
use type_mapping::{CanonicalRow, CanonicalValue, NativeProfile};

use crate::errors::StoreError;

/// An open database selected by its configured backend
#[derive(Debug)]
pub struct ConnectionHandle {
    adapter: Box<dyn DialectAdapter>,
    target: String,
}

impl ConnectionHandle {
    /// Open the configured backend and apply `schema_file` when one is set
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let handle = Self::connect(config).await?;
        if let Some(path) = config.schema_file.as_deref() {
            let bundle = SchemaBundle::from_file(path)?;
            handle.apply_schema(&bundle).await?;
        }
        Ok(handle)
    }

    /// Open the configured backend and bootstrap it from an already loaded bundle
    pub async fn open_with_schema(
        config: &DatabaseConfig,
        bundle: &SchemaBundle,
    ) -> Result<Self, StoreError> {
        let handle = Self::connect(config).await?;
        handle.apply_schema(bundle).await?;
        Ok(handle)
    }

    async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let target = config.target();

        match dialect::connect(config).await {
            Ok(adapter) => {
                tracing::info!(backend = %config.backend, db = %target, "Database connection opened");
                Ok(Self { adapter, target })
            }
            Err(source) => {
                tracing::error!(
                    backend = %config.backend,
                    db = %target,
                    error = %source,
                    "Failed to open database connection"
                );
                Err(StoreError::ConnectionFailed {
                    backend: config.backend,
                    target,
                    source,
                })
            }
        }
    }

    async fn apply_schema(&self, bundle: &SchemaBundle) -> Result<(), StoreError> {
        for statement in bundle.statements() {
            self.adapter
                .execute_statement(statement)
                .await
                .map_err(StoreError::QueryFailed)?;
        }
        tracing::info!(statements = bundle.len(), "Applied schema bundle");
        Ok(())
    }

    pub fn kind(&self) -> BackendKind {
        self.adapter.kind()
    }

    /// Where this handle points; never contains credentials
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn profile(&self) -> &NativeProfile {
        self.adapter.profile()
    }

    pub(crate) fn adapter(&self) -> &dyn DialectAdapter {
        self.adapter.as_ref()
    }

    /// Liveness probe; safe to repeat
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.adapter.ping().await.map_err(|e| {
            tracing::warn!(backend = %self.kind(), error = %e, "Ping failed");
            StoreError::Unreachable(e)
        })
    }

    /// Run `raw` with the canonical name of `table` appended
    ///
    /// Only the table name is checked. The statement text is the caller's
    /// responsibility.
    pub async fn execute(&self, raw: &str, table: DbTable) -> Result<RowCursor, StoreError> {
        let sql = format!("{} {}", raw.trim_end(), table.as_str());
        debug_log!("Execute: {}", sql);
        let rows = self
            .adapter
            .fetch(&sql, &[])
            .await
            .map_err(StoreError::from_query)?;
        Ok(RowCursor::new(rows))
    }

    /// Run a parameterized statement; parameters are normalized for this backend
    ///
    /// Use [`BackendKind::placeholder`] to write placeholders portably.
    pub async fn query(
        &self,
        sql: &str,
        params: &[CanonicalValue],
    ) -> Result<Vec<CanonicalRow>, StoreError> {
        let natives = self
            .adapter
            .bind_values(params)
            .map_err(StoreError::from_query)?;
        trace_log!("Query with {} params: {}", natives.len(), sql);
        self.adapter
            .fetch(sql, &natives)
            .await
            .map_err(StoreError::from_query)
    }

    /// Raw names of every base table in the active schema
    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.adapter
            .tables()
            .await
            .map_err(|e| StoreError::introspection("*", e))
    }

    /// Close the pool; later calls fail with the driver's closed-pool error
    pub async fn close(&self) {
        if !self.adapter.is_closed() {
            self.adapter.close().await;
            tracing::info!(backend = %self.kind(), "Database connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.adapter.is_closed()
    }
}

/// Rows returned by [`ConnectionHandle::execute`], in result order
#[derive(Debug)]
pub struct RowCursor {
    rows: std::vec::IntoIter<CanonicalRow>,
}

impl RowCursor {
    fn new(rows: Vec<CanonicalRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Remaining rows, collected
    pub fn into_rows(self) -> Vec<CanonicalRow> {
        self.rows.collect()
    }
}

impl Iterator for RowCursor {
    type Item = CanonicalRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RowCursor {}
