use crate::core::data_type::ColumnType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Format used when a timestamp is rendered as text (CSV cells, log lines).
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A closed `[begin, end)` interval of timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Range {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Range {
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        Range { begin, end }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
    Range(Range),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null and empty strings carry no type information.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// True when the value's decimal representation has a fractional part.
    ///
    /// `10.0` renders as `10` and therefore counts as integral, the same way a
    /// whole number read back from a FLOAT column does.
    pub fn has_fraction(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite() && v.to_string().contains('.'),
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(v) => v.parse::<f64>().ok(),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::String(v) => v.parse::<i64>().ok(),
            Value::Boolean(v) => Some(i64::from(*v)),
            Value::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::String(v) => match v.to_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            Value::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Plain-text rendering; `None` for null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::String(v) => Some(v.clone()),
            Value::Timestamp(v) => Some(v.format(TIMESTAMP_TEXT_FORMAT).to_string()),
            Value::Range(r) => Some(format!(
                "[\"{}\",\"{}\")",
                r.begin.format(TIMESTAMP_TEXT_FORMAT),
                r.end.format(TIMESTAMP_TEXT_FORMAT)
            )),
            Value::Json(v) => Some(v.to_string()),
        }
    }

    /// The column type this single value would suggest, if any.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Int(_) => Some(ColumnType::Integer),
            Value::Float(_) if self.has_fraction() => Some(ColumnType::Float),
            Value::Float(_) => Some(ColumnType::Integer),
            Value::String(s) if s.is_empty() => None,
            Value::String(_) => Some(ColumnType::Text),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Range(_) => Some(ColumnType::Range),
            Value::Json(_) => Some(ColumnType::Json),
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Range(a), Range(b)) => Some((a.begin, a.end).cmp(&(b.begin, b.end))),
            _ => None,
        }
    }

    /// Converts the value into the representation a column of `column_type`
    /// stores. Returns `None` when the value cannot be represented.
    pub fn coerce_to(&self, column_type: ColumnType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }

        match column_type {
            ColumnType::Boolean => self.as_bool().map(Value::Boolean),
            ColumnType::Integer => match self {
                Value::Float(v) if v.fract() != 0.0 => None,
                Value::String(s) if s.is_empty() => Some(Value::Null),
                other => other.as_i64().map(Value::Int),
            },
            ColumnType::Float => match self {
                Value::String(s) if s.is_empty() => Some(Value::Null),
                other => other.as_f64().map(Value::Float),
            },
            ColumnType::Timestamp => match self {
                Value::Timestamp(_) => Some(self.clone()),
                Value::String(s) if s.is_empty() => Some(Value::Null),
                Value::String(s) => parse_timestamp(s).map(Value::Timestamp),
                _ => None,
            },
            ColumnType::Range => match self {
                Value::Range(_) => Some(self.clone()),
                _ => None,
            },
            ColumnType::Json => match self {
                Value::Json(_) => Some(self.clone()),
                other => serde_json::to_value(other.as_text()).ok().map(Value::Json),
            },
            ColumnType::Text => self.as_text().map(Value::String),
        }
    }
}

/// Parses the timestamp layouts commonly found in text exports.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];

    let text = text.trim();
    for layout in LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(ts);
        }
    }

    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }

    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "NULL"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Range> for Value {
    fn from(v: Range) -> Self {
        Value::Range(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
