//! Canonical type model and per-engine coercion rules
//! This crate provides the mapping between engine-independent values and the
//! native shapes each supported engine binds and returns.

#[cfg(feature = "debug-logging")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod canonical;
pub mod coerce;
pub mod errors;
pub mod native;

pub use canonical::{
    CanonicalRow, CanonicalType, CanonicalValue, CellShape, NullBool, NullInt64, NullString,
    Nullable, ScalarKind,
};
pub use coerce::{format_timestamp, parse_timestamp, widen};
pub use errors::ConversionError;
pub use native::{BoolRepr, IntWidth, NativeProfile, NativeValue, TimestampRepr};
