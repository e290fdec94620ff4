//! The connection capability boundary.
//!
//! Everything below this trait belongs to a database driver; everything
//! above it never touches a socket or file directly. One implementation
//! exists per enabled backend ([`crate::rusqlite`], [`crate::postgres`],
//! [`crate::mysql`]), each responsible for named-parameter binding, row
//! decoding, and statement reuse in whatever way its driver supports.

use std::time::{Duration, Instant};

use crate::{DatabaseError, Row, Value};

/// The outcome of a single executed statement: all result rows for
/// row-returning statements, the affected-row count otherwise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecResult {
    pub rows: Vec<Row>,
    pub affected: u64,
}

/// A live, parameterized-statement connection to one database.
///
/// Parameters are named (`:name` placeholders, names include the colon).
/// Implementations may ignore parameters the statement does not reference.
/// [`Value::Array`] must never reach this trait; the adapter expands arrays
/// first.
pub trait Connection {
    fn driver_name(&self) -> &'static str;

    /// Prepares (or reuses a previously prepared form of) `sql` and
    /// executes it with the given named parameters.
    fn execute(
        &mut self,
        sql: &str,
        params: &[(String, Value)],
    ) -> Result<ExecResult, DatabaseError>;

    /// Runs raw SQL without parameters. May contain several
    /// `;`-separated statements where the driver supports batches.
    fn exec(&mut self, sql: &str) -> Result<u64, DatabaseError>;

    /// Quotes a string into a dialect-safe SQL literal.
    fn quote(&self, value: &str) -> String;

    fn last_insert_id(&mut self) -> Result<u64, DatabaseError>;

    fn begin(&mut self) -> Result<(), DatabaseError>;
    fn commit(&mut self) -> Result<(), DatabaseError>;
    fn rollback(&mut self) -> Result<(), DatabaseError>;
    fn in_transaction(&self) -> bool;

    fn client_version(&self) -> Option<String>;
    fn server_version(&mut self) -> Option<String>;
}

/// One entry in the adapter's append-only statement log.
#[derive(Debug, Clone)]
pub struct QueryLog {
    pub sql: String,
    pub params: Vec<(String, Value)>,
    pub duration: Duration,
}

/// Owns the boxed [`Connection`] and records every executed statement.
///
/// Dialect run procedures receive `&mut Executor`, so multi-statement
/// operations (REPLACE emulation, shadow-table DDL) get logged statement by
/// statement like everything else.
pub struct Executor {
    conn: Box<dyn Connection>,
    log: Vec<QueryLog>,
}

impl Executor {
    pub(crate) fn new(conn: Box<dyn Connection>) -> Self {
        Self { conn, log: vec![] }
    }

    pub fn query(
        &mut self,
        sql: &str,
        params: &[(String, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        log::trace!("executing: {sql} with {} param(s)", params.len());
        let start = Instant::now();
        let result = self.conn.execute(sql, params);
        self.log.push(QueryLog {
            sql: sql.to_string(),
            params: params.to_vec(),
            duration: start.elapsed(),
        });
        result
    }

    pub fn exec(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        log::trace!("executing raw: {sql}");
        let start = Instant::now();
        let result = self.conn.exec(sql);
        self.log.push(QueryLog {
            sql: sql.to_string(),
            params: vec![],
            duration: start.elapsed(),
        });
        result
    }

    /// Runs a catalog probe and reports whether it produced any row.
    pub fn probe(&mut self, sql: &str) -> Result<bool, DatabaseError> {
        Ok(!self.query(sql, &[])?.rows.is_empty())
    }

    #[must_use]
    pub fn quote(&self, value: &str) -> String {
        self.conn.quote(value)
    }

    #[must_use]
    pub fn driver_name(&self) -> &'static str {
        self.conn.driver_name()
    }

    pub fn last_insert_id(&mut self) -> Result<u64, DatabaseError> {
        self.conn.last_insert_id()
    }

    pub fn begin(&mut self) -> Result<(), DatabaseError> {
        self.conn.begin()
    }

    pub fn commit(&mut self) -> Result<(), DatabaseError> {
        self.conn.commit()
    }

    pub fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.conn.rollback()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.conn.in_transaction()
    }

    #[must_use]
    pub fn client_version(&self) -> Option<String> {
        self.conn.client_version()
    }

    pub fn server_version(&mut self) -> Option<String> {
        self.conn.server_version()
    }

    /// Every statement executed on this connection so far.
    #[must_use]
    pub fn queries(&self) -> &[QueryLog] {
        &self.log
    }
}
