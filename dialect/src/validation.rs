//! Identifier validation
//!
//! Column names reaching dynamic SQL are checked here and always quoted for
//! the target engine on use.

use config::BackendKind;
use std::fmt;
use thiserror::Error;

/// Rejected identifier or unknown schema object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Identifier '{name}' is {length} bytes long (engines accept at most {max})", max = ValidatedColumnName::MAX_LENGTH)]
    TooLong { name: String, length: usize },

    /// First character is neither an ASCII letter nor `_`
    #[error("Identifier '{name}' cannot start with {found:?}")]
    BadStart { name: String, found: char },

    /// Only ASCII letters, digits and `_` are allowed
    #[error("Identifier '{name}' contains {found:?} at byte {position}")]
    BadCharacter {
        name: String,
        found: char,
        position: usize,
    },

    #[error("'{0}' is not a known table")]
    UnknownTable(String),

    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },
}

/// A column name that is safe to place inside a quoted identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedColumnName(String);

impl ValidatedColumnName {
    /// Shortest identifier limit among the supported engines (PostgreSQL)
    pub const MAX_LENGTH: usize = 63;

    pub fn new(name: &str) -> Result<Self, ValidationError> {
        validate_identifier(name).map(|()| Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The name quoted for `backend`
    pub fn quoted(&self, backend: BackendKind) -> String {
        quote_identifier(backend, &self.0)
    }
}

impl fmt::Display for ValidatedColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedColumnName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to [`ValidatedColumnName::MAX_LENGTH`] bytes
///
/// Reserved words pass: every use site quotes the identifier.
pub(crate) fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.char_indices();
    let Some((_, first)) = chars.next() else {
        return Err(ValidationError::Empty);
    };

    if name.len() > ValidatedColumnName::MAX_LENGTH {
        return Err(ValidationError::TooLong {
            name: name.to_owned(),
            length: name.len(),
        });
    }

    if first != '_' && !first.is_ascii_alphabetic() {
        return Err(ValidationError::BadStart {
            name: name.to_owned(),
            found: first,
        });
    }

    match chars.find(|(_, c)| *c != '_' && !c.is_ascii_alphanumeric()) {
        Some((position, found)) => Err(ValidationError::BadCharacter {
            name: name.to_owned(),
            found,
            position,
        }),
        None => Ok(()),
    }
}

/// Quote an already validated identifier in the engine's own syntax
///
/// MySQL uses backticks; SQLite and PostgreSQL use double quotes.
pub fn quote_identifier(backend: BackendKind, name: &str) -> String {
    match backend {
        BackendKind::ServerA => format!("`{}`", name),
        BackendKind::Embedded | BackendKind::ServerB => format!("\"{}\"", name),
    }
}
