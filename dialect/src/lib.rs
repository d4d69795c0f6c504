//! Dialect adapters for the supported SQL engines
//!
//! This crate provides the closed table enumeration, identifier validation,
//! schema descriptors and one [`DialectAdapter`] implementation per engine.
//! Every adapter speaks the canonical type model at its boundary.

#[cfg(feature = "debug-logging")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub mod adapters;
pub mod errors;
pub mod schema;
pub mod table;
pub mod traits;
pub mod validation;

pub use adapters::{connect, MySqlAdapter, PostgresAdapter, SqliteAdapter};
pub use errors::DialectError;
pub use schema::{ColumnDescriptor, ForeignKeyEdge};
pub use table::DbTable;
pub use traits::DialectAdapter;
pub use validation::{quote_identifier, ValidatedColumnName, ValidationError};

pub use config::BackendKind;
