//! Error types for canonical/native conversion

use thiserror::Error;

use crate::canonical::ScalarKind;
use crate::native::IntWidth;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Integer {value} does not fit a {width} native integer")]
    Overflow { value: i64, width: IntWidth },

    #[error("NULL read for non-nullable {kind} value")]
    UnexpectedNull { kind: ScalarKind },

    #[error("Cannot read native {found} value as canonical {expected}")]
    KindMismatch {
        expected: ScalarKind,
        found: &'static str,
    },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Unsupported cell type: {type_name}")]
    UnsupportedCell { type_name: String },
}
