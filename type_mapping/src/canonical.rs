//! Canonical type model
//!
//! Engine-independent representations of scalars and rows. Adapters convert
//! their native values into these types at the boundary and nothing
//! engine-specific travels past that point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional scalar carried as an explicit validity flag plus a value
///
/// When `valid` is false the value is always the type's zero value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Nullable<T> {
    pub value: T,
    pub valid: bool,
}

pub type NullString = Nullable<String>;
pub type NullInt64 = Nullable<i64>;
pub type NullBool = Nullable<bool>;

impl<T: Default> Nullable<T> {
    pub fn null() -> Self {
        Self {
            value: T::default(),
            valid: false,
        }
    }

    pub fn some(value: T) -> Self {
        Self { value, valid: true }
    }

    pub fn as_option(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }

    pub fn into_option(self) -> Option<T> {
        if self.valid {
            Some(self.value)
        } else {
            None
        }
    }
}

impl<T: Default> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Nullable::some(v),
            None => Nullable::null(),
        }
    }
}

/// Family of a canonical scalar, independent of nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Integer,
    Text,
    Boolean,
    Timestamp,
    /// Floating point or fixed precision numbers; canonically carried as text
    Real,
    /// Binary payloads; no canonical representation
    Blob,
}

impl ScalarKind {
    /// Classify a declared or reported column type name
    pub fn from_type_name(type_name: &str) -> Self {
        let name = type_name.trim().to_ascii_lowercase();
        let base = name.split('(').next().unwrap_or("").trim();

        if name == "tinyint(1)" || matches!(base, "bool" | "boolean") {
            return ScalarKind::Boolean;
        }
        let first = base.split_whitespace().next().unwrap_or("");
        if matches!(
            first,
            "int" | "integer" | "int2" | "int4" | "int8" | "tinyint" | "smallint" | "mediumint"
                | "bigint" | "serial" | "smallserial" | "bigserial"
        ) {
            return ScalarKind::Integer;
        }
        if base.contains("timestamp") || base.contains("datetime") || base == "date" {
            return ScalarKind::Timestamp;
        }
        if matches!(
            base,
            "real" | "float" | "float4" | "float8" | "double" | "double precision" | "numeric" | "decimal"
        ) {
            return ScalarKind::Real;
        }
        if base.contains("blob") || base == "bytea" || base.contains("binary") {
            return ScalarKind::Blob;
        }
        ScalarKind::Text
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Integer => "integer",
            ScalarKind::Text => "text",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Real => "real",
            ScalarKind::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// Target shape for reading a native value back into the canonical model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalType {
    pub kind: ScalarKind,
    pub nullable: bool,
}

impl CanonicalType {
    pub fn required(kind: ScalarKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: ScalarKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }
}

/// A canonical scalar
///
/// Booleans only exist in nullable form. Timestamps are RFC 3339 UTC strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalValue {
    Integer(i64),
    Text(String),
    Timestamp(String),
    NullableText(NullString),
    NullableInteger(NullInt64),
    NullableBool(NullBool),
    NullableTimestamp(NullString),
}

impl CanonicalValue {
    /// An absent value of the given family
    pub fn null_of(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Integer => CanonicalValue::NullableInteger(Nullable::null()),
            ScalarKind::Boolean => CanonicalValue::NullableBool(Nullable::null()),
            ScalarKind::Timestamp => CanonicalValue::NullableTimestamp(Nullable::null()),
            ScalarKind::Text | ScalarKind::Real | ScalarKind::Blob => {
                CanonicalValue::NullableText(Nullable::null())
            }
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            CanonicalValue::Integer(_) | CanonicalValue::NullableInteger(_) => ScalarKind::Integer,
            CanonicalValue::Text(_) | CanonicalValue::NullableText(_) => ScalarKind::Text,
            CanonicalValue::Timestamp(_) | CanonicalValue::NullableTimestamp(_) => {
                ScalarKind::Timestamp
            }
            CanonicalValue::NullableBool(_) => ScalarKind::Boolean,
        }
    }

    pub fn canonical_type(&self) -> CanonicalType {
        let nullable = matches!(
            self,
            CanonicalValue::NullableText(_)
                | CanonicalValue::NullableInteger(_)
                | CanonicalValue::NullableBool(_)
                | CanonicalValue::NullableTimestamp(_)
        );
        CanonicalType {
            kind: self.kind(),
            nullable,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            CanonicalValue::NullableText(n) | CanonicalValue::NullableTimestamp(n) => !n.valid,
            CanonicalValue::NullableInteger(n) => !n.valid,
            CanonicalValue::NullableBool(n) => !n.valid,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CanonicalValue::Integer(v) => Some(*v),
            CanonicalValue::NullableInteger(n) => n.as_option().copied(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::Text(s) | CanonicalValue::Timestamp(s) => Some(s),
            CanonicalValue::NullableText(n) | CanonicalValue::NullableTimestamp(n) => {
                n.as_option().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CanonicalValue::NullableBool(n) => n.as_option().copied(),
            _ => None,
        }
    }

    /// Plain JSON rendering used by export tooling; absent values become `null`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CanonicalValue::Integer(v) => serde_json::Value::from(*v),
            CanonicalValue::Text(s) | CanonicalValue::Timestamp(s) => {
                serde_json::Value::String(s.clone())
            }
            CanonicalValue::NullableText(n) | CanonicalValue::NullableTimestamp(n) => n
                .as_option()
                .map_or(serde_json::Value::Null, |s| serde_json::Value::String(s.clone())),
            CanonicalValue::NullableInteger(n) => n
                .as_option()
                .map_or(serde_json::Value::Null, |v| serde_json::Value::from(*v)),
            CanonicalValue::NullableBool(n) => n
                .as_option()
                .map_or(serde_json::Value::Null, |v| serde_json::Value::Bool(*v)),
        }
    }
}

impl From<i64> for CanonicalValue {
    fn from(val: i64) -> Self {
        CanonicalValue::Integer(val)
    }
}

impl From<i32> for CanonicalValue {
    fn from(val: i32) -> Self {
        CanonicalValue::Integer(i64::from(val))
    }
}

impl From<String> for CanonicalValue {
    fn from(val: String) -> Self {
        CanonicalValue::Text(val)
    }
}

impl From<&str> for CanonicalValue {
    fn from(val: &str) -> Self {
        CanonicalValue::Text(val.to_string())
    }
}

impl From<bool> for CanonicalValue {
    fn from(val: bool) -> Self {
        CanonicalValue::NullableBool(Nullable::some(val))
    }
}

impl From<Option<i64>> for CanonicalValue {
    fn from(val: Option<i64>) -> Self {
        CanonicalValue::NullableInteger(val.into())
    }
}

impl From<Option<String>> for CanonicalValue {
    fn from(val: Option<String>) -> Self {
        CanonicalValue::NullableText(val.into())
    }
}

impl From<Option<bool>> for CanonicalValue {
    fn from(val: Option<bool>) -> Self {
        CanonicalValue::NullableBool(val.into())
    }
}

/// Ordered mapping from column name to canonical scalar
///
/// Built once by an adapter and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRow {
    columns: Vec<(String, CanonicalValue)>,
}

impl CanonicalRow {
    pub fn new(columns: Vec<(String, CanonicalValue)>) -> Self {
        Self { columns }
    }

    /// First value stored under `name`
    pub fn get(&self, name: &str) -> Option<&CanonicalValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn get_index(&self, index: usize) -> Option<&CanonicalValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CanonicalValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Shape of a single cell as seen by the generic column lister
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellShape {
    Integer(i64),
    Text(String),
    Unsupported { type_name: String },
}

impl CellShape {
    /// Display string: integers as decimal text, text as-is
    pub fn into_display(self) -> Result<String, crate::ConversionError> {
        match self {
            CellShape::Integer(v) => Ok(v.to_string()),
            CellShape::Text(s) => Ok(s),
            CellShape::Unsupported { type_name } => {
                Err(crate::ConversionError::UnsupportedCell { type_name })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_zero_value() {
        let absent: NullString = Nullable::null();
        assert!(!absent.valid);
        assert_eq!(absent.value, "");

        let absent: NullInt64 = None.into();
        assert_eq!(absent, Nullable { value: 0, valid: false });
        assert_eq!(absent.into_option(), None);
    }

    #[test]
    fn test_classify_type_names() {
        assert_eq!(ScalarKind::from_type_name("INTEGER"), ScalarKind::Integer);
        assert_eq!(ScalarKind::from_type_name("bigint unsigned"), ScalarKind::Integer);
        assert_eq!(ScalarKind::from_type_name("INT4"), ScalarKind::Integer);
        assert_eq!(ScalarKind::from_type_name("tinyint(1)"), ScalarKind::Boolean);
        assert_eq!(ScalarKind::from_type_name("BOOLEAN"), ScalarKind::Boolean);
        assert_eq!(ScalarKind::from_type_name("TIMESTAMPTZ"), ScalarKind::Timestamp);
        assert_eq!(ScalarKind::from_type_name("DATETIME"), ScalarKind::Timestamp);
        assert_eq!(ScalarKind::from_type_name("varchar(255)"), ScalarKind::Text);
        assert_eq!(ScalarKind::from_type_name(""), ScalarKind::Text);
        assert_eq!(ScalarKind::from_type_name("double precision"), ScalarKind::Real);
        assert_eq!(ScalarKind::from_type_name("BYTEA"), ScalarKind::Blob);
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row = CanonicalRow::new(vec![
            ("route_id".to_string(), CanonicalValue::Integer(7)),
            ("slug".to_string(), CanonicalValue::from("home")),
            ("author_id".to_string(), CanonicalValue::from(None::<i64>)),
        ]);

        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["route_id", "slug", "author_id"]);
        assert_eq!(row.get("route_id").and_then(CanonicalValue::as_i64), Some(7));
        assert!(row.get("author_id").is_some_and(CanonicalValue::is_null));
        assert_eq!(
            row.to_json(),
            serde_json::json!({"route_id": 7, "slug": "home", "author_id": null})
        );
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellShape::Integer(-42).into_display().unwrap(), "-42");
        assert_eq!(CellShape::Text("abc".into()).into_display().unwrap(), "abc");
        assert!(CellShape::Unsupported {
            type_name: "BLOB".into()
        }
        .into_display()
        .is_err());
    }
}
