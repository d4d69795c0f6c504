//! The adapter contract shared by every engine

use async_trait::async_trait;
use config::BackendKind;
use std::fmt::Debug;
use type_mapping::{CanonicalRow, CanonicalValue, CellShape, NativeProfile, NativeValue};

use crate::errors::DialectError;
use crate::schema::{ColumnDescriptor, ForeignKeyEdge};
use crate::table::DbTable;
use crate::validation::ValidatedColumnName;

/// One engine behind the canonical contract
///
/// Implementations own their pool and the literal text of their metadata
/// queries. Nothing engine-native crosses this boundary: parameters arrive
/// already normalized by [`NativeProfile`] and rows leave as
/// [`CanonicalRow`]s.
#[async_trait]
pub trait DialectAdapter: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    /// Coercion parameters for this engine
    fn profile(&self) -> &NativeProfile;

    /// `SELECT 1` round trip
    async fn ping(&self) -> Result<(), DialectError>;

    /// Run a statement that returns no rows; yields the affected row count
    async fn execute_statement(&self, sql: &str) -> Result<u64, DialectError>;

    /// Run a statement with natively bound parameters and decode every row
    async fn fetch(
        &self,
        sql: &str,
        params: &[NativeValue],
    ) -> Result<Vec<CanonicalRow>, DialectError>;

    /// Classify the first cell of every row returned by `sql`
    ///
    /// The whole result set is read before returning. A row whose cell fails
    /// to decode keeps its position as an `Err`; only a failed statement
    /// fails the call.
    async fn fetch_cells(
        &self,
        sql: &str,
    ) -> Result<Vec<Result<CellShape, DialectError>>, DialectError>;

    /// Column inventory of `table` in physical order
    async fn columns(&self, table: DbTable) -> Result<Vec<ColumnDescriptor>, DialectError>;

    /// Outgoing edges of `table`, restricted to `column` when given
    async fn foreign_keys(
        &self,
        table: DbTable,
        column: Option<&ValidatedColumnName>,
    ) -> Result<Vec<ForeignKeyEdge>, DialectError>;

    async fn table_exists(&self, table: DbTable) -> Result<bool, DialectError>;

    /// Base tables of the active schema, sorted by name
    async fn tables(&self) -> Result<Vec<String>, DialectError>;

    async fn close(&self);

    fn is_closed(&self) -> bool;

    /// Normalize canonical parameters into this engine's native shapes
    fn bind_values(&self, params: &[CanonicalValue]) -> Result<Vec<NativeValue>, DialectError> {
        params
            .iter()
            .map(|param| self.profile().to_native(param).map_err(DialectError::from))
            .collect()
    }
}
