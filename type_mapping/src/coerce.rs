//! Coercion rules between canonical and native values
//!
//! Integers are canonically 64-bit. Writing to a 32-bit engine narrows under
//! the profile's [`NarrowingPolicy`]; reading always widens exactly. Absent
//! values keep their family across the boundary so an invalid nullable comes
//! back invalid with the same zero value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use config::NarrowingPolicy;

use crate::canonical::{CanonicalType, CanonicalValue, Nullable, ScalarKind};
use crate::errors::ConversionError;
use crate::native::{BoolRepr, IntWidth, NativeProfile, NativeValue, TimestampRepr};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Widen a 32-bit native integer; always exact
#[inline]
pub fn widen(value: i32) -> i64 {
    i64::from(value)
}

/// Render a UTC instant as a canonical timestamp string
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a canonical (or engine default) timestamp string as UTC
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` and bare dates; zone-less
/// forms are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ConversionError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ConversionError::InvalidTimestamp(value.to_string()))
}

fn finish<T: Default>(
    value: Option<T>,
    target: CanonicalType,
    required: fn(T) -> CanonicalValue,
    nullable: fn(Nullable<T>) -> CanonicalValue,
) -> Result<CanonicalValue, ConversionError> {
    match (value, target.nullable) {
        (value, true) => Ok(nullable(value.into())),
        (Some(v), false) => Ok(required(v)),
        (None, false) => Err(ConversionError::UnexpectedNull { kind: target.kind }),
    }
}

fn variant_name(value: &NativeValue) -> &'static str {
    match value {
        NativeValue::Int32(_) => "int32",
        NativeValue::Int64(_) => "int64",
        NativeValue::Text(_) => "text",
        NativeValue::Bool(_) => "bool",
        NativeValue::Naive(_) => "naive datetime",
        NativeValue::Zoned(_) => "zoned datetime",
    }
}

impl NativeProfile {
    /// Native integer for a canonical one, honouring the narrowing policy
    pub fn narrow(&self, value: Option<i64>) -> Result<NativeValue, ConversionError> {
        match self.id_width {
            IntWidth::Bits64 => Ok(NativeValue::Int64(value)),
            IntWidth::Bits32 => {
                let narrowed = match value {
                    None => None,
                    Some(v) => match (i32::try_from(v), self.narrowing) {
                        (Ok(n), _) => Some(n),
                        (Err(_), NarrowingPolicy::Truncate) => {
                            tracing::warn!(value = v, backend = %self.backend, "truncating integer to 32 bits");
                            Some(v as i32)
                        }
                        (Err(_), NarrowingPolicy::Reject) => {
                            return Err(ConversionError::Overflow {
                                value: v,
                                width: self.id_width,
                            });
                        }
                    },
                };
                Ok(NativeValue::Int32(narrowed))
            }
        }
    }

    fn timestamp_native(&self, value: Option<&str>) -> Result<NativeValue, ConversionError> {
        match self.timestamp_repr {
            TimestampRepr::Text => Ok(NativeValue::Text(value.map(str::to_string))),
            TimestampRepr::Naive => value
                .map(parse_timestamp)
                .transpose()
                .map(|dt| NativeValue::Naive(dt.map(|dt| dt.naive_utc()))),
            TimestampRepr::Zoned => value
                .map(parse_timestamp)
                .transpose()
                .map(NativeValue::Zoned),
        }
    }

    fn bool_native(&self, value: Option<bool>) -> NativeValue {
        match self.bool_repr {
            BoolRepr::Native => NativeValue::Bool(value),
            BoolRepr::Integer => NativeValue::Int64(value.map(i64::from)),
        }
    }

    /// Convert a canonical value into this engine's native shape for binding
    pub fn to_native(&self, value: &CanonicalValue) -> Result<NativeValue, ConversionError> {
        trace_log!("to_native {:?} for {}", value, self.backend);
        match value {
            CanonicalValue::Integer(v) => self.narrow(Some(*v)),
            CanonicalValue::NullableInteger(n) => self.narrow(n.as_option().copied()),
            CanonicalValue::Text(s) => Ok(NativeValue::Text(Some(s.clone()))),
            CanonicalValue::NullableText(n) => Ok(NativeValue::Text(n.as_option().cloned())),
            CanonicalValue::NullableBool(n) => Ok(self.bool_native(n.as_option().copied())),
            CanonicalValue::Timestamp(s) => self.timestamp_native(Some(s)),
            CanonicalValue::NullableTimestamp(n) => {
                self.timestamp_native(n.as_option().map(String::as_str))
            }
        }
    }

    /// Convert a native value read from this engine into the requested canonical shape
    pub fn from_native(
        &self,
        value: NativeValue,
        target: CanonicalType,
    ) -> Result<CanonicalValue, ConversionError> {
        let found = variant_name(&value);
        let mismatch = || ConversionError::KindMismatch {
            expected: target.kind,
            found,
        };

        match target.kind {
            ScalarKind::Integer => {
                let v = match value {
                    NativeValue::Int32(v) => v.map(widen),
                    NativeValue::Int64(v) => v,
                    _ => return Err(mismatch()),
                };
                finish(v, target, CanonicalValue::Integer, CanonicalValue::NullableInteger)
            }
            ScalarKind::Boolean => {
                let v = match value {
                    NativeValue::Bool(v) => v,
                    NativeValue::Int64(v) => v.map(|n| n != 0),
                    NativeValue::Int32(v) => v.map(|n| n != 0),
                    _ => return Err(mismatch()),
                };
                finish(
                    v,
                    target,
                    |b| CanonicalValue::NullableBool(Nullable::some(b)),
                    CanonicalValue::NullableBool,
                )
            }
            ScalarKind::Timestamp => {
                let v = match value {
                    NativeValue::Text(v) => v,
                    NativeValue::Naive(v) => v.map(|naive| format_timestamp(naive.and_utc())),
                    NativeValue::Zoned(v) => v.map(format_timestamp),
                    _ => return Err(mismatch()),
                };
                finish(
                    v,
                    target,
                    CanonicalValue::Timestamp,
                    CanonicalValue::NullableTimestamp,
                )
            }
            ScalarKind::Text | ScalarKind::Real => {
                let v = match value {
                    NativeValue::Text(v) => v,
                    _ => return Err(mismatch()),
                };
                finish(v, target, CanonicalValue::Text, CanonicalValue::NullableText)
            }
            ScalarKind::Blob => Err(ConversionError::UnsupportedCell {
                type_name: "BLOB".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::BackendKind;

    fn profiles(narrowing: NarrowingPolicy) -> Vec<NativeProfile> {
        BackendKind::ALL
            .iter()
            .map(|kind| NativeProfile::for_backend(*kind, narrowing))
            .collect()
    }

    #[test]
    fn test_absent_nullables_round_trip_on_every_backend() {
        let absent = [
            CanonicalValue::NullableText(Nullable::null()),
            CanonicalValue::NullableInteger(Nullable::null()),
            CanonicalValue::NullableBool(Nullable::null()),
            CanonicalValue::NullableTimestamp(Nullable::null()),
        ];

        for profile in profiles(NarrowingPolicy::Reject) {
            for value in &absent {
                let native = profile.to_native(value).unwrap();
                assert!(native.is_null(), "{:?} on {}", value, profile.backend);
                let back = profile.from_native(native, value.canonical_type()).unwrap();
                assert_eq!(&back, value, "round trip on {}", profile.backend);
            }
        }
    }

    #[test]
    fn test_present_nullables_round_trip() {
        let present = [
            CanonicalValue::NullableText(Nullable::some("draft".to_string())),
            CanonicalValue::NullableInteger(Nullable::some(42)),
            CanonicalValue::NullableBool(Nullable::some(true)),
            CanonicalValue::NullableTimestamp(Nullable::some("2024-03-01T12:30:00Z".to_string())),
        ];

        for profile in profiles(NarrowingPolicy::Reject) {
            for value in &present {
                let native = profile.to_native(value).unwrap();
                let back = profile.from_native(native, value.canonical_type()).unwrap();
                assert_eq!(&back, value, "round trip on {}", profile.backend);
            }
        }
    }

    #[test]
    fn test_native_widths() {
        let embedded = NativeProfile::for_backend(BackendKind::Embedded, NarrowingPolicy::Reject);
        let mysql = NativeProfile::for_backend(BackendKind::ServerA, NarrowingPolicy::Reject);
        let postgres = NativeProfile::for_backend(BackendKind::ServerB, NarrowingPolicy::Reject);

        assert_eq!(embedded.to_native(&7i64.into()).unwrap(), NativeValue::Int64(Some(7)));
        assert_eq!(mysql.to_native(&7i64.into()).unwrap(), NativeValue::Int32(Some(7)));
        assert_eq!(postgres.to_native(&7i64.into()).unwrap(), NativeValue::Int32(Some(7)));
        assert_eq!(
            mysql.to_native(&CanonicalValue::from(None::<i64>)).unwrap(),
            NativeValue::Int32(None)
        );
    }

    #[test]
    fn test_narrowing_rejects_out_of_range_by_default() {
        let mysql = NativeProfile::for_backend(BackendKind::ServerA, NarrowingPolicy::Reject);
        let err = mysql.to_native(&CanonicalValue::Integer(5_000_000_000)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::Overflow {
                value: 5_000_000_000,
                width: IntWidth::Bits32
            }
        );

        let embedded = NativeProfile::for_backend(BackendKind::Embedded, NarrowingPolicy::Reject);
        assert_eq!(
            embedded.to_native(&CanonicalValue::Integer(5_000_000_000)).unwrap(),
            NativeValue::Int64(Some(5_000_000_000))
        );
    }

    #[test]
    fn test_narrowing_truncates_when_opted_in() {
        let postgres = NativeProfile::for_backend(BackendKind::ServerB, NarrowingPolicy::Truncate);
        let native = postgres.to_native(&CanonicalValue::Integer(5_000_000_000)).unwrap();
        assert_eq!(native, NativeValue::Int32(Some(705_032_704)));

        // Reading back widens the truncated value, not the original
        let back = postgres
            .from_native(native, CanonicalType::required(ScalarKind::Integer))
            .unwrap();
        assert_eq!(back, CanonicalValue::Integer(705_032_704));
    }

    #[test]
    fn test_widening_is_exact() {
        assert_eq!(widen(i32::MAX), 2_147_483_647);
        assert_eq!(widen(i32::MIN), -2_147_483_648);
    }

    #[test]
    fn test_embedded_booleans_are_integers() {
        let embedded = NativeProfile::for_backend(BackendKind::Embedded, NarrowingPolicy::Reject);
        assert_eq!(
            embedded.to_native(&CanonicalValue::from(true)).unwrap(),
            NativeValue::Int64(Some(1))
        );
        let back = embedded
            .from_native(NativeValue::Int64(Some(0)), CanonicalType::required(ScalarKind::Boolean))
            .unwrap();
        assert_eq!(back, CanonicalValue::NullableBool(Nullable::some(false)));
    }

    #[test]
    fn test_timestamps_per_engine() {
        let ts = CanonicalValue::Timestamp("2024-03-01T12:30:00.250Z".to_string());

        let embedded = NativeProfile::for_backend(BackendKind::Embedded, NarrowingPolicy::Reject);
        assert_eq!(
            embedded.to_native(&ts).unwrap(),
            NativeValue::Text(Some("2024-03-01T12:30:00.250Z".to_string()))
        );

        let mysql = NativeProfile::for_backend(BackendKind::ServerA, NarrowingPolicy::Reject);
        let native = mysql.to_native(&ts).unwrap();
        assert!(matches!(native, NativeValue::Naive(Some(_))));
        assert_eq!(mysql.from_native(native, ts.canonical_type()).unwrap(), ts);

        let postgres = NativeProfile::for_backend(BackendKind::ServerB, NarrowingPolicy::Reject);
        let native = postgres.to_native(&ts).unwrap();
        assert!(matches!(native, NativeValue::Zoned(Some(_))));
        assert_eq!(postgres.from_native(native, ts.canonical_type()).unwrap(), ts);
    }

    #[test]
    fn test_parse_engine_default_timestamp_forms() {
        assert_eq!(
            format_timestamp(parse_timestamp("2024-03-01 12:30:00").unwrap()),
            "2024-03-01T12:30:00Z"
        );
        assert_eq!(
            format_timestamp(parse_timestamp("2024-03-01").unwrap()),
            "2024-03-01T00:00:00Z"
        );
        assert_eq!(
            format_timestamp(parse_timestamp("2024-03-01T14:30:00+02:00").unwrap()),
            "2024-03-01T12:30:00Z"
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_null_for_required_is_an_error() {
        let mysql = NativeProfile::for_backend(BackendKind::ServerA, NarrowingPolicy::Reject);
        let err = mysql
            .from_native(NativeValue::Int32(None), CanonicalType::required(ScalarKind::Integer))
            .unwrap_err();
        assert_eq!(err, ConversionError::UnexpectedNull { kind: ScalarKind::Integer });
    }

    #[test]
    fn test_kind_mismatch() {
        let postgres = NativeProfile::for_backend(BackendKind::ServerB, NarrowingPolicy::Reject);
        let err = postgres
            .from_native(
                NativeValue::Text(Some("x".into())),
                CanonicalType::required(ScalarKind::Integer),
            )
            .unwrap_err();
        assert!(matches!(err, ConversionError::KindMismatch { .. }));
    }
}
