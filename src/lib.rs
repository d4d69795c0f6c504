//! # polystore
//!
//! Cross-dialect storage core: one connection contract, one canonical type
//! model and runtime schema introspection over SQLite, MySQL and PostgreSQL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polystore::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::embedded("content.db");
//!     let handle = ConnectionHandle::open(&config).await?;
//!     handle.ping().await?;
//!
//!     let table = resolve_table("routes")?;
//!     let (types, order) = handle.list_columns(table).await?;
//!     for (ordinal, name) in &order {
//!         println!("{ordinal}: {name} {}", types[name]);
//!     }
//!
//!     for edge in handle.list_foreign_keys(DbTable::ContentData, None).await? {
//!         println!("{} -> {}.{}", edge.source_column, edge.target_table, edge.target_column);
//!     }
//!
//!     for slug in handle.list_column_values(table, "slug").await? {
//!         println!("{}", slug?);
//!     }
//!
//!     handle.close().await;
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod introspection;
pub mod prelude;
pub mod resolver;

// Re-export the main public types for convenience
pub use core::{ConnectionHandle, RowCursor};
pub use errors::StoreError;
pub use introspection::{order_by_dependencies, ColumnIndexName, ColumnNameType};
pub use resolver::{resolve_table, ColumnValues};

// Re-export centralized config
pub use config::{AppConfig, BackendKind, DatabaseConfig, NarrowingPolicy, SchemaBundle};

// Re-export member crates used in the public API
pub use config;
pub use dialect;
pub use type_mapping;

pub use sqlx;
