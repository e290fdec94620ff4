#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Dialect-aware SQL abstraction layer.
//!
//! Queries are built as data structures instead of hand-written SQL strings,
//! compiled to backend-specific SQL (MySQL, PostgreSQL, or SQLite), and
//! executed through a parameterized-statement connection. Result rows and
//! schema metadata come back in a uniform, backend-independent shape.
//!
//! ```rust,ignore
//! use dbal::{Adapter, Backend, Config, Value};
//!
//! let mut db = Adapter::factory(Backend::Sqlite, Config::new().file(":memory:"))?;
//!
//! let mut insert = db.insert(&[("username", ":username")], "users");
//! insert.run(&mut db, &[(":username", Value::from("lie2815"))])?;
//!
//! let mut select = db.select(&["*"], Some("users"));
//! select.order = vec!["username ASC".to_string()];
//! let rows = select.run(&mut db, &[])?;
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod query;
pub mod schema;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod rusqlite;

use chrono::NaiveDateTime;
use thiserror::Error;

pub use adapter::Adapter;
pub use config::Config;
pub use connection::{Connection, ExecResult, QueryLog};
pub use query::ReplaceOutcome;
pub use schema::{Column, ColumnInfo, ColumnType, IndexDef, IndexInfo, TableInfo};

/// The supported database backends.
///
/// Resolved once, at adapter construction time, through
/// [`Adapter::factory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    #[cfg(feature = "mysql")]
    MySql,
    #[cfg(feature = "postgres")]
    PgSql,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl Backend {
    #[must_use]
    pub const fn driver_name(self) -> &'static str {
        match self {
            #[cfg(feature = "mysql")]
            Self::MySql => "mysql",
            #[cfg(feature = "postgres")]
            Self::PgSql => "pgsql",
            #[cfg(feature = "sqlite")]
            Self::Sqlite => "sqlite",
        }
    }
}

/// A value bound to a statement parameter or read back from a result row.
///
/// `Array` never reaches a driver: the adapter expands an array-valued named
/// parameter into a parenthesized placeholder list (`:ids` becomes
/// `(:ids0, :ids1, ...)`) before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    DateTime(NaiveDateTime),
    Array(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(value) => Some(*value),
            Self::Int(value) if *value >= 0 => Some(*value as u64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Coerces the value to text, the way drivers report catalog metadata.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::String(value) => Some(value.clone()),
            Self::Bytes(value) => Some(String::from_utf8_lossy(value).into_owned()),
            Self::Bool(value) => Some(i64::from(*value).to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::UInt(value) => Some(value.to_string()),
            Self::Real(value) => Some(value.to_string()),
            Self::DateTime(value) => Some(value.to_string()),
            Self::Null | Self::Array(_) => None,
        }
    }

    /// Coerces the value to an integer, parsing text-protocol numbers.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            Self::Bool(value) => Some(i64::from(*value)),
            Self::String(value) => value.parse().ok(),
            Self::Bytes(value) => String::from_utf8_lossy(value).parse().ok(),
            _ => None,
        }
    }

    /// Coerces the value to a boolean, accepting the various spellings the
    /// backend catalogs use (`t`, `true`, `YES`, `1`, ...).
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(value) => Some(*value != 0),
            Self::UInt(value) => Some(*value != 0),
            Self::String(value) => match value.as_str() {
                "t" | "true" | "TRUE" | "yes" | "YES" | "1" => Some(true),
                "f" | "false" | "FALSE" | "no" | "NO" | "0" => Some(false),
                _ => None,
            },
            Self::Bytes(value) => {
                Self::String(String::from_utf8_lossy(value).into_owned()).to_bool()
            }
            _ => None,
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Self::String(val.to_string())
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Self::String(val)
    }
}

impl From<i8> for Value {
    fn from(val: i8) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i16> for Value {
    fn from(val: i16) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Self::Int(val)
    }
}

impl From<u8> for Value {
    fn from(val: u8) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u16> for Value {
    fn from(val: u16) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u32> for Value {
    fn from(val: u32) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u64> for Value {
    fn from(val: u64) -> Self {
        Self::UInt(val)
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Self::Real(f64::from(val))
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Self::Real(val)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(val: NaiveDateTime) -> Self {
        Self::DateTime(val)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        Self::Array(val.into_iter().map(Into::into).collect())
    }
}

/// A single result row: ordered `(column name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<Value> {
        self.columns
            .iter()
            .find(|c| c.0 == column_name)
            .map(|c| c.1.clone())
    }

    #[must_use]
    pub fn get_text(&self, column_name: &str) -> Option<String> {
        self.get(column_name).and_then(|v| v.to_text())
    }

    #[must_use]
    pub fn get_i64(&self, column_name: &str) -> Option<i64> {
        self.get(column_name).and_then(|v| v.to_i64())
    }

    #[must_use]
    pub fn get_bool(&self, column_name: &str) -> Option<bool> {
        self.get(column_name).and_then(|v| v.to_bool())
    }
}

/// The error taxonomy of the abstraction layer.
///
/// `Config` and `Compile` errors are raised before any SQL reaches a
/// backend. `Connect` deliberately names only the backend, never the DSN or
/// credentials; the full driver error is logged instead. `Execute` carries
/// the backend's own message. `Usage` covers protocol violations such as
/// re-running a run-once query with a fresh parameter set.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not connect to the {0} database")]
    Connect(&'static str),
    #[error("query compilation failed: {0}")]
    Compile(String),
    #[error("query execution failed: {0}")]
    Execute(String),
    #[error("invalid query usage: {0}")]
    Usage(String),
}
