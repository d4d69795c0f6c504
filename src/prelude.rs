//! Convenience re-exports for common polystore usage
//!
//! # Example
//!
//! ```rust
//! use polystore::prelude::*;
//!
//! let table = resolve_table("routes").unwrap();
//! assert_eq!(table, DbTable::Routes);
//! ```

// Connection manager, resolver and errors
pub use crate::core::{ConnectionHandle, RowCursor};
pub use crate::errors::StoreError;
pub use crate::introspection::{ColumnIndexName, ColumnNameType};
pub use crate::resolver::{resolve_table, ColumnValues};

// Centralized config
pub use config::{AppConfig, BackendKind, DatabaseConfig, NarrowingPolicy, SchemaBundle};

// Schema descriptors and identifiers
pub use dialect::{ColumnDescriptor, DbTable, ForeignKeyEdge, ValidatedColumnName};

// Canonical type model
pub use type_mapping::{
    CanonicalRow, CanonicalType, CanonicalValue, NullBool, NullInt64, NullString, Nullable,
    ScalarKind,
};
