use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tagged value union for property literals and row values.
///
/// Deserialization covers what the wire can carry (null, bool, numbers,
/// strings, lists). DateTime and Geometry only appear on the way out:
/// criterion literals for datetime-typed properties arrive as strings
/// and are coerced at compile time, geometry never travels as a bare
/// comparison literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    List(Vec<PropertyValue>),
    #[serde(serialize_with = "serialize_datetime", skip_deserializing)]
    DateTime(NaiveDateTime),
    /// Canonical footprint JSON, emitted verbatim as a string value
    #[serde(skip_deserializing)]
    Geometry(String),
}

fn serialize_datetime<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Null
    }
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str_opt(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list_opt(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Int(_) => "int",
            PropertyValue::Long(_) => "long",
            PropertyValue::Double(_) => "double",
            PropertyValue::Str(_) => "string",
            PropertyValue::List(_) => "list",
            PropertyValue::DateTime(_) => "datetime",
            PropertyValue::Geometry(_) => "geometry",
        }
    }

    /// SQL literal rendering, used only for logging compiled queries.
    /// Execution always binds values as named parameters.
    pub fn render_for_log(&self) -> String {
        match self {
            PropertyValue::Null => "NULL".to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Long(l) => l.to_string(),
            PropertyValue::Double(d) => d.to_string(),
            PropertyValue::Str(s) => format!("'{}'", s),
            PropertyValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|i| i.render_for_log()).collect();
                format!("({})", rendered.join(", "))
            }
            PropertyValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%dT%H:%M:%S")),
            PropertyValue::Geometry(g) => format!("'{}'", g),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_for_log())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}
