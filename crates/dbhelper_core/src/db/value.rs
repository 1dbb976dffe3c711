//! Dynamically typed values exchanged with the data store.
//!
//! # Responsibility
//! - Represent bound statement parameters and fetched column values.
//! - Normalize date/time parameters to the canonical storage format.
//!
//! # Invariants
//! - `DbValue::DateTime` is never written as-is: it is bound as
//!   `YYYY-MM-DD HH:MM:SS` text.
//! - Values read back from the driver are never `DateTime`.

use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Storage format for date/time parameters and date columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One fetched row: column name -> raw value.
pub type Row = BTreeMap<String, DbValue>;

/// Named statement parameters. Keys may be given with or without the
/// leading `:`.
pub type Params = BTreeMap<String, DbValue>;

/// A single column value or bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String form of the value, `None` for SQL `NULL`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(Cow::Owned(value.to_string())),
            Self::Real(value) => Some(Cow::Owned(value.to_string())),
            Self::Text(value) => Some(Cow::Borrowed(value.as_str())),
            Self::Blob(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::DateTime(value) => Some(Cow::Owned(value.format(DATETIME_FORMAT).to_string())),
        }
    }

    /// Integer interpretation of the value.
    ///
    /// Text is accepted when it holds an integer or a decimal number
    /// (truncated toward zero).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Real(value) => Some(value.trunc() as i64),
            Self::Text(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().map(|value| value.trunc() as i64))
            }
            Self::Null | Self::Blob(_) | Self::DateTime(_) => None,
        }
    }

    /// Compares the string forms of two values, treating `NULL` as the
    /// empty string.
    pub fn text_eq(&self, other: &DbValue) -> bool {
        let left = self.as_text().unwrap_or(Cow::Borrowed(""));
        let right = other.as_text().unwrap_or(Cow::Borrowed(""));
        left == right
    }

    /// Quoted literal used when simulating bound values for display.
    ///
    /// Never used to build executable SQL.
    pub fn to_display_literal(&self) -> String {
        match self.as_text() {
            None => "NULL".to_string(),
            Some(text) => format!("'{text}'"),
        }
    }

    /// Content key used to share one placeholder between equal values.
    pub(crate) fn content_key(&self) -> String {
        let tag = match self {
            Self::Null => 'n',
            Self::Integer(_) => 'i',
            Self::Real(_) => 'r',
            Self::Text(_) => 't',
            Self::Blob(_) => 'b',
            Self::DateTime(_) => 'd',
        };
        format!("{tag}:{}", self.as_text().unwrap_or_default())
    }
}

impl Display for DbValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl ToSql for DbValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            Self::DateTime(value) => {
                ToSqlOutput::Owned(Value::Text(value.format(DATETIME_FORMAT).to_string()))
            }
        })
    }
}

impl From<ValueRef<'_>> for DbValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

impl From<i64> for DbValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DbValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for DbValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for DbValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for DbValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for DbValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DbValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for DbValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds a [`Params`] map from `name => value` pairs.
///
/// ```
/// let params = dbhelper_core::db_params! { "label" => "Product one", "price" => 100 };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! db_params {
    () => {
        $crate::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $(
            params.insert(::std::string::String::from($name), $crate::DbValue::from($value));
        )+
        params
    }};
}

/// Looks up a parameter by placeholder name, accepting keys stored with
/// or without the leading `:`.
pub(crate) fn lookup_param<'p>(params: &'p Params, placeholder: &str) -> Option<&'p DbValue> {
    let bare = placeholder.trim_start_matches(':');
    params
        .get(bare)
        .or_else(|| params.get(format!(":{bare}").as_str()))
}
