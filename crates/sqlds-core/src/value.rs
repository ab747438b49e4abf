//! Bound parameter values and typed result values.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::field::FieldType;
use crate::response::Response;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

// ============================================================================
// SQL parameters
// ============================================================================

/// A value bound to a `?` placeholder, or decoded from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// NULL, carrying the declared type when known so drivers can bind it typed.
    Null(Option<FieldType>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Converts a JSON payload value to a parameter for a field of the given type.
    ///
    /// Without a declared type the JSON value's own shape decides.
    pub fn from_json(value: &Value, field_type: Option<FieldType>) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::Null(field_type));
        }

        let Some(ty) = field_type else {
            return Self::from_untyped_json(value);
        };

        match ty {
            FieldType::Text | FieldType::Enum => match value {
                Value::String(s) => Ok(Self::Text(s.clone())),
                Value::Number(n) => Ok(Self::Text(n.to_string())),
                Value::Bool(b) => Ok(Self::Text(b.to_string())),
                _ => Err(format!("expected text, got {value}")),
            },
            FieldType::Integer | FieldType::IntEnum | FieldType::Sequence => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .map(Self::Integer)
                    .ok_or_else(|| format!("expected integer, got {n}")),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Self::Integer)
                    .map_err(|_| format!("expected integer, got '{s}'")),
                _ => Err(format!("expected integer, got {value}")),
            },
            FieldType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| format!("expected number, got {n}")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Self::Float)
                    .map_err(|_| format!("expected number, got '{s}'")),
                _ => Err(format!("expected number, got {value}")),
            },
            FieldType::Boolean => match value {
                Value::Bool(b) => Ok(Self::Boolean(*b)),
                Value::String(s) => parse_bool(s)
                    .map(Self::Boolean)
                    .ok_or_else(|| format!("expected boolean, got '{s}'")),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Self::Boolean(false)),
                    Some(1) => Ok(Self::Boolean(true)),
                    _ => Err(format!("expected boolean, got {n}")),
                },
                _ => Err(format!("expected boolean, got {value}")),
            },
            FieldType::Date => match value {
                Value::String(s) => parse_date(s)
                    .map(Self::Date)
                    .ok_or_else(|| format!("expected date (YYYY-MM-DD), got '{s}'")),
                _ => Err(format!("expected date, got {value}")),
            },
            FieldType::DateTime => match value {
                Value::String(s) => parse_datetime(s)
                    .map(Self::DateTime)
                    .ok_or_else(|| format!("expected datetime, got '{s}'")),
                _ => Err(format!("expected datetime, got {value}")),
            },
            FieldType::Time => match value {
                Value::String(s) => parse_time(s)
                    .map(Self::Time)
                    .ok_or_else(|| format!("expected time (HH:MM:SS), got '{s}'")),
                _ => Err(format!("expected time, got {value}")),
            },
            FieldType::Entity => Self::from_untyped_json(value),
        }
    }

    fn from_untyped_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Null(None)),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| format!("unsupported number {n}")),
            },
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => {
                Err(format!("expected a scalar value, got {value}"))
            }
        }
    }

    /// Renders the value for logs and error messages.
    pub fn as_display_str(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
            Self::DateTime(dt) => dt.format(DATETIME_FORMATS[0]).to_string(),
            Self::Time(t) => t.format(TIME_FORMATS[0]).to_string(),
            Self::Null(_) => "NULL".to_string(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{s}'"),
            other => f.write_str(&other.as_display_str()),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

// ============================================================================
// Result values
// ============================================================================

/// A typed value in a response row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Records of a sub-entity fetch.
    Records(Box<Response>),
}

impl FieldValue {
    /// Coerces a decoded column value to the field's declared type.
    ///
    /// Drivers with dynamic typing hand back dates as text and booleans as
    /// integers; the declared type restores them. Undeclared fields keep the
    /// native value.
    pub fn from_sql(value: SqlValue, field_type: Option<FieldType>) -> Result<Self, String> {
        let native = match value {
            SqlValue::Null(_) => return Ok(Self::Null),
            SqlValue::Text(s) => Self::Text(s),
            SqlValue::Integer(i) => Self::Integer(i),
            SqlValue::Float(f) => Self::Float(f),
            SqlValue::Boolean(b) => Self::Boolean(b),
            SqlValue::Date(d) => Self::Date(d),
            SqlValue::DateTime(dt) => Self::DateTime(dt),
            SqlValue::Time(t) => Self::Time(t),
        };

        let Some(ty) = field_type else {
            return Ok(native);
        };

        match (ty, native) {
            (FieldType::Text | FieldType::Enum, Self::Text(s)) => Ok(Self::Text(s)),
            (FieldType::Text | FieldType::Enum, other) => Ok(Self::Text(other.to_display())),

            (FieldType::Integer | FieldType::IntEnum | FieldType::Sequence, Self::Integer(i)) => {
                Ok(Self::Integer(i))
            }
            (FieldType::Integer | FieldType::IntEnum | FieldType::Sequence, Self::Float(f))
                if f.fract() == 0.0 =>
            {
                Ok(Self::Integer(f as i64))
            }
            (FieldType::Integer | FieldType::IntEnum | FieldType::Sequence, Self::Text(s)) => s
                .trim()
                .parse()
                .map(Self::Integer)
                .map_err(|_| format!("cannot read '{s}' as integer")),

            (FieldType::Float, Self::Float(f)) => Ok(Self::Float(f)),
            (FieldType::Float, Self::Integer(i)) => Ok(Self::Float(i as f64)),
            (FieldType::Float, Self::Text(s)) => s
                .trim()
                .parse()
                .map(Self::Float)
                .map_err(|_| format!("cannot read '{s}' as number")),

            (FieldType::Boolean, Self::Boolean(b)) => Ok(Self::Boolean(b)),
            (FieldType::Boolean, Self::Integer(i)) => Ok(Self::Boolean(i != 0)),
            (FieldType::Boolean, Self::Text(s)) => parse_bool(&s)
                .map(Self::Boolean)
                .ok_or_else(|| format!("cannot read '{s}' as boolean")),

            (FieldType::Date, Self::Date(d)) => Ok(Self::Date(d)),
            (FieldType::Date, Self::DateTime(dt)) => Ok(Self::Date(dt.date())),
            (FieldType::Date, Self::Text(s)) => parse_date(&s)
                .map(Self::Date)
                .ok_or_else(|| format!("cannot read '{s}' as date")),

            (FieldType::DateTime, Self::DateTime(dt)) => Ok(Self::DateTime(dt)),
            (FieldType::DateTime, Self::Date(d)) => d
                .and_hms_opt(0, 0, 0)
                .map(Self::DateTime)
                .ok_or_else(|| format!("cannot read {d} as datetime")),
            (FieldType::DateTime, Self::Text(s)) => parse_datetime(&s)
                .map(Self::DateTime)
                .ok_or_else(|| format!("cannot read '{s}' as datetime")),

            (FieldType::Time, Self::Time(t)) => Ok(Self::Time(t)),
            (FieldType::Time, Self::Text(s)) => parse_time(&s)
                .map(Self::Time)
                .ok_or_else(|| format!("cannot read '{s}' as time")),

            (FieldType::Entity, other) => Ok(other),

            (ty, other) => Err(format!("cannot read {other:?} as {ty:?}")),
        }
    }

    /// Converts a scalar back into a bindable parameter; sub-entity records have none.
    pub fn to_sql(&self) -> Option<SqlValue> {
        Some(match self {
            Self::Null => SqlValue::Null(None),
            Self::Boolean(b) => SqlValue::Boolean(*b),
            Self::Integer(i) => SqlValue::Integer(*i),
            Self::Float(f) => SqlValue::Float(*f),
            Self::Text(s) => SqlValue::Text(s.clone()),
            Self::Date(d) => SqlValue::Date(*d),
            Self::DateTime(dt) => SqlValue::DateTime(*dt),
            Self::Time(t) => SqlValue::Time(*t),
            Self::Records(_) => return None,
        })
    }

    /// JSON form, as it appears on the wire.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Records(records) => {
                serde_json::to_value(records.as_ref()).unwrap_or(Value::Null)
            }
            other => Value::String(other.to_display()),
        }
    }

    fn to_display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
            Self::DateTime(dt) => dt.format(DATETIME_FORMATS[0]).to_string(),
            Self::Time(t) => t.format(TIME_FORMATS[0]).to_string(),
            Self::Records(r) => format!("[{} records]", r.data.len()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&Response> {
        match self {
            Self::Records(r) => Some(r),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Records(records) => records.serialize(serializer),
            other => serializer.serialize_str(&other.to_display()),
        }
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

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
