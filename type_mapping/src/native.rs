//! Native value shapes
//!
//! Each engine binds and returns values in its own width and with its own
//! null wrapper. `NativeValue` names those shapes without tying this crate to
//! a driver; the dialect adapters bind them onto sqlx queries.

use chrono::{DateTime, NaiveDateTime, Utc};
use config::{BackendKind, NarrowingPolicy};
use std::fmt;

/// Width of the engine's generated integer identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Bits32,
    Bits64,
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntWidth::Bits32 => f.write_str("32-bit"),
            IntWidth::Bits64 => f.write_str("64-bit"),
        }
    }
}

/// How booleans travel on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolRepr {
    Native,
    /// 0/1 integers
    Integer,
}

/// How timestamps travel on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampRepr {
    /// Stored as text; passed through unchanged
    Text,
    /// Zone-less date-time, interpreted as UTC
    Naive,
    /// Zone-aware date-time
    Zoned,
}

/// A value in one engine's native shape; `None` is that engine's NULL
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Int32(Option<i32>),
    Int64(Option<i64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Naive(Option<NaiveDateTime>),
    Zoned(Option<DateTime<Utc>>),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        match self {
            NativeValue::Int32(v) => v.is_none(),
            NativeValue::Int64(v) => v.is_none(),
            NativeValue::Text(v) => v.is_none(),
            NativeValue::Bool(v) => v.is_none(),
            NativeValue::Naive(v) => v.is_none(),
            NativeValue::Zoned(v) => v.is_none(),
        }
    }
}

/// Per-engine coercion parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeProfile {
    pub backend: BackendKind,
    pub id_width: IntWidth,
    pub bool_repr: BoolRepr,
    pub timestamp_repr: TimestampRepr,
    pub narrowing: NarrowingPolicy,
}

impl NativeProfile {
    pub fn for_backend(backend: BackendKind, narrowing: NarrowingPolicy) -> Self {
        let (id_width, bool_repr, timestamp_repr) = match backend {
            BackendKind::Embedded => (IntWidth::Bits64, BoolRepr::Integer, TimestampRepr::Text),
            BackendKind::ServerA => (IntWidth::Bits32, BoolRepr::Native, TimestampRepr::Naive),
            BackendKind::ServerB => (IntWidth::Bits32, BoolRepr::Native, TimestampRepr::Zoned),
        };
        Self {
            backend,
            id_width,
            bool_repr,
            timestamp_repr,
            narrowing,
        }
    }
}
