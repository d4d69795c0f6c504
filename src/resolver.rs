//! Generic table and column resolution
//!
//! Runtime table names become [`DbTable`]s here or nowhere; this is the only
//! path by which a caller-supplied name reaches SQL text.

use dialect::{DbTable, DialectError, ValidatedColumnName, ValidationError};
use type_mapping::{CellShape, ConversionError};

use crate::core::ConnectionHandle;
use crate::errors::StoreError;

/// Resolve a runtime name against the closed table enumeration
///
/// Never touches a database.
pub fn resolve_table(name: &str) -> Result<DbTable, StoreError> {
    name.parse::<DbTable>().map_err(|e| {
        debug_log!("Rejected table name {:?}", name);
        StoreError::from(e)
    })
}

impl ConnectionHandle {
    pub fn resolve_table(&self, name: &str) -> Result<DbTable, StoreError> {
        resolve_table(name)
    }

    /// Every value of `column` in `table` as a display string
    ///
    /// The select runs once, up front, and its rows are held in memory; only
    /// formatting is deferred to iteration. Each call re-executes the select.
    /// A row that fails to decode is reported in place and ends the sequence,
    /// so values before it are still delivered.
    pub async fn list_column_values(
        &self,
        table: DbTable,
        column: &str,
    ) -> Result<ColumnValues, StoreError> {
        let column = ValidatedColumnName::new(column)?;
        let known = self
            .describe_columns(table)
            .await?
            .iter()
            .any(|descriptor| descriptor.name == column.as_str());
        if !known {
            return Err(StoreError::InvalidIdentifier(ValidationError::UnknownColumn {
                table: table.to_string(),
                column: column.into_string(),
            }));
        }

        let kind = self.kind();
        let sql = format!("SELECT {} FROM {}", column.quoted(kind), table.quoted(kind));
        let cells = self
            .adapter()
            .fetch_cells(&sql)
            .await
            .map_err(StoreError::from_query)?;
        debug_log!("Buffered {} values of {}.{}", cells.len(), table, column);

        Ok(ColumnValues::new(column.into_string(), cells))
    }
}

/// Buffered column values, formatted on demand
///
/// The first cell that is neither an integer nor text yields
/// `UnsupportedColumnType` and ends the sequence. So does a row that failed
/// to decode.
#[derive(Debug)]
pub struct ColumnValues {
    column: String,
    cells: std::vec::IntoIter<Result<CellShape, DialectError>>,
    failed: bool,
}

impl ColumnValues {
    fn new(column: String, cells: Vec<Result<CellShape, DialectError>>) -> Self {
        Self {
            column,
            cells: cells.into_iter(),
            failed: false,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Rows not yet yielded
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.cells.len()
        }
    }

    fn display(&self, cell: CellShape) -> Result<String, StoreError> {
        cell.into_display().map_err(|err| match err {
            ConversionError::UnsupportedCell { type_name } => StoreError::UnsupportedColumnType {
                column: self.column.clone(),
                type_name,
            },
            other => StoreError::from_query(DialectError::Conversion(other)),
        })
    }
}

impl Iterator for ColumnValues {
    type Item = Result<String, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.cells.next()? {
            Ok(cell) => self.display(cell),
            Err(err) => Err(StoreError::from_query(err)),
        };
        self.failed = item.is_err();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}
