//! Attribute value types
//!
//! This module defines:
//! - AttributeValue: the typed scalar stored under a metacard attribute
//! - Attribute: an ordered, possibly multi-valued list of AttributeValues
//!
//! ## Type Rules
//!
//! - Different types are never equal: `Int(1) != Float(1.0)`
//! - `Binary` is not `String`, even when the bytes are valid UTF-8
//! - Float equality is bitwise, so every value equals itself (including NaN).
//!   Attribute comparison is used to detect edits, and an unchanged record
//!   must always compare equal to itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single typed attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// UTF-8 string
    String(String),
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTC timestamp
    Date(DateTime<Utc>),
    /// Raw bytes, base64 encoded when serialized
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => a == b,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Int(a), AttributeValue::Int(b)) => a == b,
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Date(a), AttributeValue::Date(b)) => a == b,
            (AttributeValue::Binary(a), AttributeValue::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl AttributeValue {
    /// Returns the type name
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "String",
            AttributeValue::Bool(_) => "Bool",
            AttributeValue::Int(_) => "Int",
            AttributeValue::Float(_) => "Float",
            AttributeValue::Date(_) => "Date",
            AttributeValue::Binary(_) => "Binary",
        }
    }

    /// Returns the string slice if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a Date
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the bytes if this is Binary
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Textual form used by equality filters
    ///
    /// Dates render as RFC 3339 with millisecond precision, binary as base64.
    pub fn to_text(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Float(f) => f.to_string(),
            AttributeValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            AttributeValue::Binary(b) => STANDARD.encode(b),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Float(f)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(d: DateTime<Utc>) -> Self {
        AttributeValue::Date(d)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(b: Vec<u8>) -> Self {
        AttributeValue::Binary(b)
    }
}

/// An ordered list of values stored under one attribute name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute {
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Single-valued attribute
    pub fn single(value: impl Into<AttributeValue>) -> Self {
        Attribute {
            values: vec![value.into()],
        }
    }

    /// Multi-valued attribute, preserving order
    pub fn multi<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Attribute {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// First value, if any
    pub fn value(&self) -> Option<&AttributeValue> {
        self.values.first()
    }

    /// All values in order
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// True if no values are present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_different_types_never_equal() {
        assert_ne!(AttributeValue::Int(1), AttributeValue::Float(1.0));
        assert_ne!(
            AttributeValue::String("abc".into()),
            AttributeValue::Binary(b"abc".to_vec())
        );
    }

    #[test]
    fn test_nan_equals_itself() {
        let nan = AttributeValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
    }

    #[test]
    fn test_binary_serializes_as_base64() {
        let value = AttributeValue::Binary(vec![0, 1, 2, 255]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"binary","value":"AAEC/w=="}"#);
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_date_text_is_rfc3339_millis() {
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            AttributeValue::Date(date).to_text(),
            "2020-01-02T03:04:05.000Z"
        );
    }

    #[test]
    fn test_attribute_multi_preserves_order() {
        let attr = Attribute::multi(["b", "a", "c"]);
        let texts: Vec<_> = attr.values().iter().map(|v| v.to_text()).collect();
        assert_eq!(texts, vec!["b", "a", "c"]);
        assert_eq!(attr.value().and_then(|v| v.as_str()), Some("b"));
    }
}
