//! Serde helpers for loosely-typed v1 numeric fields.
//!
//! The legacy store encodes numbers inconsistently: the same column may
//! arrive as a JSON number, a JSON string, an empty string, or be absent
//! entirely. Every numeric field on the raw v1 structs deserializes through
//! [`flexible_i64`], which accepts all of those encodings and produces a
//! plain `i64`.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};

/// Deserializes an `i64` from a JSON number, a JSON string, `null`, or an
/// empty string.
///
/// Rules:
/// - JSON integer: used as-is.
/// - JSON float: truncated toward zero.
/// - JSON string: parsed as a base-10 integer; the empty string is `0`.
/// - `null` or absent (with `#[serde(default)]`): `0`.
/// - Anything else is a deserialization error, which rejects the whole
///   record as malformed.
pub fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(FlexibleI64Visitor)
}

struct FlexibleI64Visitor;

impl<'de> Visitor<'de> for FlexibleI64Visitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an integer, a numeric string, or null")
    }

    fn visit_i64<E>(self, value: i64) -> Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<i64, E>
    where
        E: de::Error,
    {
        i64::try_from(value)
            .map_err(|_| E::custom(format!("numeric field out of range: {value}")))
    }

    #[allow(clippy::cast_possible_truncation)] // truncation toward zero is the intended rule
    fn visit_f64<E>(self, value: f64) -> Result<i64, E> {
        Ok(value as i64)
    }

    fn visit_str<E>(self, value: &str) -> Result<i64, E>
    where
        E: de::Error,
    {
        if value.is_empty() {
            return Ok(0);
        }
        value
            .parse::<i64>()
            .map_err(|_| E::custom(format!("invalid numeric string: {value:?}")))
    }

    fn visit_unit<E>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_none<E>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FlexibleI64Visitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::flexible_i64")]
        value: i64,
    }

    fn decode(json: &str) -> Result<i64, serde_json::Error> {
        serde_json::from_str::<Probe>(json).map(|p| p.value)
    }

    #[test]
    fn accepts_json_number() {
        assert_eq!(decode(r#"{"value": 42}"#).expect("number"), 42);
    }

    #[test]
    fn accepts_numeric_string() {
        assert_eq!(decode(r#"{"value": "42"}"#).expect("string"), 42);
    }

    #[test]
    fn string_and_number_encodings_agree() {
        for n in [0i64, 1, -7, 8, 1000, i64::from(i32::MAX)] {
            let from_number = decode(&format!(r#"{{"value": {n}}}"#)).expect("number");
            let from_string = decode(&format!(r#"{{"value": "{n}"}}"#)).expect("string");
            assert_eq!(from_number, from_string);
        }
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(decode(r#"{"value": ""}"#).expect("empty string"), 0);
    }

    #[test]
    fn null_is_zero() {
        assert_eq!(decode(r#"{"value": null}"#).expect("null"), 0);
    }

    #[test]
    fn missing_field_is_zero() {
        assert_eq!(decode("{}").expect("missing"), 0);
    }

    #[test]
    fn float_truncates_toward_zero() {
        assert_eq!(decode(r#"{"value": 8.9}"#).expect("float"), 8);
    }

    #[test]
    fn negative_numeric_string_parses() {
        assert_eq!(decode(r#"{"value": "-3"}"#).expect("negative"), -3);
    }

    #[test]
    fn non_numeric_string_is_an_error() {
        assert!(decode(r#"{"value": "abc"}"#).is_err());
    }

    #[test]
    fn unexpected_json_type_is_an_error() {
        assert!(decode(r#"{"value": [1]}"#).is_err());
        assert!(decode(r#"{"value": {"n": 1}}"#).is_err());
    }
}
