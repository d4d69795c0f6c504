//! Schema introspection
//!
//! Column inventories and foreign key edges for tables known only at
//! runtime, plus the dependency ordering built on top of the edges.

use dialect::{ColumnDescriptor, DbTable, DialectError, ForeignKeyEdge, ValidatedColumnName};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::ConnectionHandle;
use crate::errors::StoreError;

/// Column name to declared type
pub type ColumnNameType = HashMap<String, String>;

/// 1-based ordinal to column name, in physical order
pub type ColumnIndexName = BTreeMap<u32, String>;

impl ConnectionHandle {
    /// Column descriptors of `table` in physical order
    pub async fn describe_columns(
        &self,
        table: DbTable,
    ) -> Result<Vec<ColumnDescriptor>, StoreError> {
        let columns = self
            .adapter()
            .columns(table)
            .await
            .map_err(|e| StoreError::introspection(table.as_str(), e))?;

        // Every real table has at least one column
        if columns.is_empty() {
            return Err(StoreError::introspection(
                table.as_str(),
                DialectError::MissingTable(table.to_string()),
            ));
        }
        Ok(columns)
    }

    /// Name-to-type and ordinal-to-name mappings for `table`
    pub async fn list_columns(
        &self,
        table: DbTable,
    ) -> Result<(ColumnNameType, ColumnIndexName), StoreError> {
        let columns = self.describe_columns(table).await?;
        Ok(split_columns(columns))
    }

    /// Outgoing foreign keys of `table`, optionally restricted to one column
    ///
    /// `None` lists every edge of the table on every backend. Edges come back
    /// in the engine's native order.
    pub async fn list_foreign_keys(
        &self,
        table: DbTable,
        column: Option<&str>,
    ) -> Result<Vec<ForeignKeyEdge>, StoreError> {
        let column = column.map(ValidatedColumnName::new).transpose()?;
        let edges = self
            .adapter()
            .foreign_keys(table, column.as_ref())
            .await
            .map_err(|e| StoreError::introspection(table.as_str(), e))?;

        if edges.is_empty() {
            let exists = self
                .adapter()
                .table_exists(table)
                .await
                .map_err(|e| StoreError::introspection(table.as_str(), e))?;
            if !exists {
                return Err(StoreError::introspection(
                    table.as_str(),
                    DialectError::MissingTable(table.to_string()),
                ));
            }
        }

        debug_log!("{} foreign keys on {}", edges.len(), table);
        Ok(edges)
    }

    /// Order `tables` so every table follows the tables it references
    pub async fn dependency_order(&self, tables: &[DbTable]) -> Result<Vec<DbTable>, StoreError> {
        let mut edges = Vec::with_capacity(tables.len());
        for table in tables {
            edges.push((*table, self.list_foreign_keys(*table, None).await?));
        }
        order_by_dependencies(tables, &edges)
    }

    /// Edges from any of `among` that point at `target`
    pub async fn referencing_edges(
        &self,
        target: DbTable,
        among: &[DbTable],
    ) -> Result<Vec<ForeignKeyEdge>, StoreError> {
        let mut referencing = Vec::new();
        for table in among {
            let edges = self.list_foreign_keys(*table, None).await?;
            referencing.extend(
                edges
                    .into_iter()
                    .filter(|edge| edge.target_table == target.as_str()),
            );
        }
        Ok(referencing)
    }
}

/// Split descriptors into the two lookup shapes
pub fn split_columns(columns: Vec<ColumnDescriptor>) -> (ColumnNameType, ColumnIndexName) {
    let mut name_type = ColumnNameType::with_capacity(columns.len());
    let mut index_name = ColumnIndexName::new();
    for column in columns {
        index_name.insert(column.ordinal_position, column.name.clone());
        name_type.insert(column.name, column.declared_type);
    }
    (name_type, index_name)
}

/// Stable topological order over the given tables
///
/// Ties keep input order. Self references and edges to tables outside the
/// set are ignored.
pub fn order_by_dependencies(
    tables: &[DbTable],
    edges: &[(DbTable, Vec<ForeignKeyEdge>)],
) -> Result<Vec<DbTable>, StoreError> {
    let mut pending: Vec<DbTable> = Vec::with_capacity(tables.len());
    for table in tables {
        if !pending.contains(table) {
            pending.push(*table);
        }
    }

    let in_set: HashSet<&str> = pending.iter().map(DbTable::as_str).collect();
    let dependencies: HashMap<DbTable, HashSet<&str>> = edges
        .iter()
        .map(|(table, edges)| {
            let targets = edges
                .iter()
                .filter(|edge| !edge.is_self_reference())
                .map(|edge| edge.target_table.as_str())
                .filter(|target| in_set.contains(target))
                .collect();
            (*table, targets)
        })
        .collect();

    let mut placed: HashSet<&str> = HashSet::with_capacity(pending.len());
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|table| {
            dependencies
                .get(table)
                .is_none_or(|deps| deps.iter().all(|dep| placed.contains(dep)))
        });

        match ready {
            Some(index) => {
                let table = pending.remove(index);
                placed.insert(table.as_str());
                ordered.push(table);
            }
            None => {
                return Err(StoreError::CyclicDependency(
                    pending.iter().map(|t| t.to_string()).collect(),
                ));
            }
        }
    }

    Ok(ordered)
}
