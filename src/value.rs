//! Attribute values - typed values for the user-editable metadata schema
//!
//! Custom metadata attributes are declared at runtime by the structure
//! registry, so their values travel as a tagged union rather than as fields
//! on a struct. The registry supplies the expected tag per attribute, which
//! is what lets the serializer bind values correctly without introspection.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Datatype tags the structure registry can declare for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    /// Fixed or floating decimal; carried as f64.
    Decimal,
    Date,
    Time,
    DateTime,
    String,
}

impl DataType {
    /// Get the string representation of the datatype
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Decimal => "decimal",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::DateTime => "datetime",
            DataType::String => "string",
        }
    }

    /// SQL column type used when the registry adds a column for this datatype
    pub fn sql_type(&self) -> &'static str {
        match self {
            DataType::Bool | DataType::Int => "INTEGER",
            DataType::Decimal => "REAL",
            DataType::Date | DataType::Time | DataType::DateTime | DataType::String => "TEXT",
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bool" | "boolean" => Ok(DataType::Bool),
            "int" | "integer" => Ok(DataType::Int),
            "decimal" | "double" | "real" | "float" => Ok(DataType::Decimal),
            "date" => Ok(DataType::Date),
            "time" => Ok(DataType::Time),
            "datetime" | "timestamp" => Ok(DataType::DateTime),
            "string" | "text" => Ok(DataType::String),
            _ => Err(Error::InvalidDataType(s.to_string())),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dynamically typed attribute value.
///
/// Temporal values are naive (no timezone): the store keeps them as ISO-8601
/// text and corpora carry local wall-clock metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl AttributeValue {
    /// The registry datatype tag this value binds as
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::String(_) => DataType::String,
            AttributeValue::Bool(_) => DataType::Bool,
            AttributeValue::Int(_) => DataType::Int,
            AttributeValue::Double(_) => DataType::Decimal,
            AttributeValue::Date(_) => DataType::Date,
            AttributeValue::Time(_) => DataType::Time,
            AttributeValue::DateTime(_) => DataType::DateTime,
        }
    }

    /// Borrow as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert into an owned SQLite value for parameter binding
    pub fn to_sql_value(&self) -> rusqlite::types::Value {
        use rusqlite::types::Value;
        match self {
            AttributeValue::String(s) => Value::Text(s.clone()),
            AttributeValue::Bool(b) => Value::Integer(*b as i64),
            AttributeValue::Int(i) => Value::Integer(*i),
            AttributeValue::Double(d) => Value::Real(*d),
            AttributeValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            AttributeValue::Time(t) => Value::Text(t.format("%H:%M:%S").to_string()),
            AttributeValue::DateTime(dt) => {
                Value::Text(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }

    /// Read a column back into a value, guided by the declared datatype.
    ///
    /// Returns `None` for SQL NULL so absent attributes stay absent in memory.
    pub fn from_sql_ref(
        data_type: DataType,
        value: rusqlite::types::ValueRef<'_>,
    ) -> Result<Option<Self>> {
        use rusqlite::types::ValueRef;

        if matches!(value, ValueRef::Null) {
            return Ok(None);
        }

        let parsed = match data_type {
            DataType::Bool => AttributeValue::Bool(ref_as_i64(value)? != 0),
            DataType::Int => AttributeValue::Int(ref_as_i64(value)?),
            DataType::Decimal => match value {
                ValueRef::Real(r) => AttributeValue::Double(r),
                ValueRef::Integer(i) => AttributeValue::Double(i as f64),
                other => return Err(type_mismatch(data_type, other)),
            },
            DataType::Date => {
                let text = ref_as_str(value)?;
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| Error::InvalidDataType(format!("date '{}': {}", text, e)))?;
                AttributeValue::Date(date)
            }
            DataType::Time => {
                let text = ref_as_str(value)?;
                let time = NaiveTime::parse_from_str(text, "%H:%M:%S")
                    .map_err(|e| Error::InvalidDataType(format!("time '{}': {}", text, e)))?;
                AttributeValue::Time(time)
            }
            DataType::DateTime => {
                let text = ref_as_str(value)?;
                let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                    .map_err(|e| Error::InvalidDataType(format!("datetime '{}': {}", text, e)))?;
                AttributeValue::DateTime(dt)
            }
            DataType::String => AttributeValue::String(ref_as_str(value)?.to_string()),
        };

        Ok(Some(parsed))
    }
}

fn ref_as_i64(value: rusqlite::types::ValueRef<'_>) -> Result<i64> {
    match value {
        rusqlite::types::ValueRef::Integer(i) => Ok(i),
        other => Err(type_mismatch(DataType::Int, other)),
    }
}

fn ref_as_str(value: rusqlite::types::ValueRef<'_>) -> Result<&str> {
    match value {
        rusqlite::types::ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidDataType(format!("non-utf8 text column: {}", e))),
        other => Err(type_mismatch(DataType::String, other)),
    }
}

fn type_mismatch(expected: DataType, got: rusqlite::types::ValueRef<'_>) -> Error {
    Error::InvalidDataType(format!("expected {}, column holds {:?}", expected, got.data_type()))
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

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<f64> for AttributeValue {
    fn from(d: f64) -> Self {
        AttributeValue::Double(d)
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            AttributeValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::{Value, ValueRef};

    #[test]
    fn test_datatype_roundtrip() {
        for dt in [
            DataType::Bool,
            DataType::Int,
            DataType::Decimal,
            DataType::Date,
            DataType::Time,
            DataType::DateTime,
            DataType::String,
        ] {
            let parsed: DataType = dt.as_str().parse().unwrap();
            assert_eq!(dt, parsed);
        }
    }

    #[test]
    fn test_datatype_aliases() {
        assert_eq!(DataType::from_str("boolean").unwrap(), DataType::Bool);
        assert_eq!(DataType::from_str("double").unwrap(), DataType::Decimal);
        assert_eq!(DataType::from_str("text").unwrap(), DataType::String);
        assert!(DataType::from_str("blob").is_err());
    }

    #[test]
    fn test_sql_binding_shapes() {
        assert_eq!(AttributeValue::Bool(true).to_sql_value(), Value::Integer(1));
        assert_eq!(AttributeValue::Int(42).to_sql_value(), Value::Integer(42));
        assert_eq!(
            AttributeValue::from("news").to_sql_value(),
            Value::Text("news".to_string())
        );

        let date = NaiveDate::from_ymd_opt(2013, 5, 7).unwrap();
        assert_eq!(
            AttributeValue::Date(date).to_sql_value(),
            Value::Text("2013-05-07".to_string())
        );
    }

    #[test]
    fn test_read_back_by_declared_tag() {
        let v = AttributeValue::from_sql_ref(DataType::Bool, ValueRef::Integer(1))
            .unwrap()
            .unwrap();
        assert_eq!(v, AttributeValue::Bool(true));

        let v = AttributeValue::from_sql_ref(DataType::Date, ValueRef::Text(b"2013-05-07"))
            .unwrap()
            .unwrap();
        assert_eq!(v.data_type(), DataType::Date);

        // NULL columns surface as absent, not as an error
        assert!(AttributeValue::from_sql_ref(DataType::Int, ValueRef::Null)
            .unwrap()
            .is_none());

        // declared tag wins: text in an int column is a mismatch
        assert!(AttributeValue::from_sql_ref(DataType::Int, ValueRef::Text(b"x")).is_err());
    }
}
