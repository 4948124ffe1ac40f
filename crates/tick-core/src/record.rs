//! Parsed tick record.
//!
//! A `Record` is an ordered mapping from field name to a number or a string.
//! Field order follows the raw line (serde_json is built with `preserve_order`),
//! so the JSON form relayed to viewers lists fields the way the producer did.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Field holding the instrument symbol.
pub const SYMBOL_FIELD: &str = "symbol";

/// Value of a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Numeric literal. Integers stay integers on the wire.
    Number(Number),
    /// Anything that does not lex as a number.
    Text(String),
}

impl FieldValue {
    /// Build a numeric value from a float. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self::Number)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s.as_str()),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::Text(s) => Value::String(s),
        }
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Number(n) => Ok(Self::Number(n)),
            Value::String(s) => Ok(Self::Text(s)),
            other => Err(CoreError::InvalidRecord(format!(
                "field value must be a number or a string, got {other}"
            ))),
        }
    }
}

/// Parsed tick record.
///
/// Invariant: every stored value is a JSON number or a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. A duplicate key keeps its original position and takes
    /// the new value; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields
            .insert(key.into(), value.into())
            .and_then(|prev| FieldValue::try_from(prev).ok())
    }

    pub fn get(&self, key: &str) -> Option<FieldValue> {
        self.fields
            .get(key)
            .cloned()
            .and_then(|v| FieldValue::try_from(v).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Instrument symbol, if the record carries one as text.
    pub fn symbol(&self) -> Option<&str> {
        self.get_str(SYMBOL_FIELD)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in wire order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode as a flat JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a flat JSON object of numbers and strings.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Object(map) => Self::try_from(map),
            other => Err(CoreError::InvalidRecord(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = CoreError;

    fn try_from(fields: Map<String, Value>) -> Result<Self> {
        if let Some((key, _)) = fields
            .iter()
            .find(|(_, v)| !matches!(v, Value::Number(_) | Value::String(_)))
        {
            return Err(CoreError::InvalidRecord(format!(
                "field {key:?} is neither a number nor a string"
            )));
        }
        Ok(Self { fields })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_key_last_wins_keeps_position() {
        let mut record = Record::new();
        record.insert("a", FieldValue::from(1_i64));
        record.insert("b", FieldValue::from("x"));
        let prev = record.insert("a", FieldValue::from(2_i64));

        assert_eq!(prev, Some(FieldValue::from(1_i64)));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get_f64("a"), Some(2.0));
    }

    #[test]
    fn test_json_preserves_field_order_and_integers() {
        let mut record = Record::new();
        record.insert("symbol", FieldValue::from("MAINIDX11JUL2419000CE"));
        record.insert("LTQ", FieldValue::from(10_i64));
        record.insert("LTP", FieldValue::from_f64(120.5).unwrap());

        let json = record.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"symbol":"MAINIDX11JUL2419000CE","LTQ":10,"LTP":120.5}"#
        );
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        let err = Record::from_json(r#"{"symbol":"X","depth":[1,2]}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));

        let err = Record::from_json("[1,2,3]").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));

        assert!(Record::from_json("not json").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Record = serde_json::from_value(json!({"symbol": "X", "LTP": 1.5})).unwrap();
        assert_eq!(ok.symbol(), Some("X"));

        let bad = serde_json::from_value::<Record>(json!({"flag": true}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let record = Record::from_json(r#"{"symbol":"X","LTP":99}"#).unwrap();
        assert_eq!(record.get_str("LTP"), None);
        assert_eq!(record.get_f64("symbol"), None);
        assert!(record.get("LTP").unwrap().is_number());
        assert!(record.get("missing").is_none());
    }
}
