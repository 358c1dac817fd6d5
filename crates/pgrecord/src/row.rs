//! Row mapping traits and utilities

use crate::error::{OrmError, OrmResult};
use crate::value::{Attributes, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Conversion from a single dynamically-typed [`Value`].
///
/// Integer targets narrow with overflow checks; `Option<T>` maps `Value::Null` to `None`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, found {}", value.type_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_i64().ok_or_else(|| mismatch("int", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|e| e.to_string())
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let v = i64::from_value(value)?;
        i16::try_from(v).map_err(|e| e.to_string())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("text", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            other => Err(mismatch("json", other)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(v) => Ok(*v),
            Value::Text(s) => uuid::Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => Err(mismatch("uuid", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(v) => Ok(*v),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::TimestampTz(v) => Ok(*v),
            other => Err(mismatch("timestamptz", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Trait for types that can be constructed from a database row.
///
/// # Example
///
/// ```ignore
/// use pgrecord::{Attributes, FromRow, OrmResult, RowExt};
///
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Attributes) -> OrmResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             name: row.try_get_column("name")?,
///             email: row.try_get_column("email")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Attributes) -> OrmResult<Self>;
}

impl FromRow for Attributes {
    fn from_row(row: &Attributes) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

/// Extension trait for rows to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning OrmError::Decode on failure.
    ///
    /// A missing column decodes like SQL NULL, so it succeeds only for `Option<T>`.
    fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T>;
}

impl RowExt for Attributes {
    fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self.get(column).unwrap_or(&Value::Null);
        T::from_value(value).map_err(|message| OrmError::decode(column, message))
    }
}
