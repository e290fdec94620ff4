//! `SQLite` connection capability over `rusqlite`.
//!
//! Named parameters bind through `parameter_index`, so a statement only
//! consumes the parameters it references. Statement reuse is delegated to
//! `rusqlite`'s prepared-statement cache. `exec` goes through
//! `execute_batch`, which is what lets the truncate and shadow-table
//! procedures ship several statements in one call.

use rusqlite::Connection as SqliteConnection;
use rusqlite::types::ValueRef;

use crate::config::Config;
use crate::connection::{Connection, ExecResult};
use crate::{DatabaseError, Row, Value};

pub(crate) fn connect(config: &Config) -> Result<Box<dyn Connection>, DatabaseError> {
    let file = config
        .file
        .clone()
        .or_else(|| config.dbname.clone())
        .ok_or_else(|| {
            DatabaseError::Config("no database file specified for SQLite database".to_string())
        })?;

    let conn = SqliteConnection::open(&file).map_err(|e| {
        log::error!("sqlite connect failed: {e}");
        DatabaseError::Connect("sqlite")
    })?;

    Ok(Box::new(Sqlite {
        conn,
        in_transaction: false,
    }))
}

struct Sqlite {
    conn: SqliteConnection,
    in_transaction: bool,
}

fn execute_error(e: rusqlite::Error) -> DatabaseError {
    DatabaseError::Execute(e.to_string())
}

impl Connection for Sqlite {
    fn driver_name(&self) -> &'static str {
        "sqlite"
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[(String, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(execute_error)?;

        for (name, value) in params {
            let Some(index) = stmt.parameter_index(name).map_err(execute_error)? else {
                continue;
            };
            bind_value(&mut stmt, index, value)?;
        }

        if stmt.column_count() > 0 {
            let column_names: Vec<String> = stmt
                .column_names()
                .iter()
                .map(ToString::to_string)
                .collect();
            let mut out = Vec::new();
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next().map_err(execute_error)? {
                out.push(from_row(&column_names, row));
            }
            Ok(ExecResult {
                rows: out,
                affected: 0,
            })
        } else {
            let affected = stmt.raw_execute().map_err(execute_error)? as u64;
            Ok(ExecResult {
                rows: vec![],
                affected,
            })
        }
    }

    fn exec(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.conn.execute_batch(sql).map_err(execute_error)?;
        Ok(self.conn.changes())
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn last_insert_id(&mut self) -> Result<u64, DatabaseError> {
        u64::try_from(self.conn.last_insert_rowid())
            .map_err(|_| DatabaseError::Execute("negative row id".to_string()))
    }

    fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Err(DatabaseError::Usage(
                "a transaction is already active".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN").map_err(execute_error)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.conn.execute_batch("COMMIT").map_err(execute_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.conn.execute_batch("ROLLBACK").map_err(execute_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn client_version(&self) -> Option<String> {
        Some(rusqlite::version().to_string())
    }

    fn server_version(&mut self) -> Option<String> {
        // The library is the server.
        Some(rusqlite::version().to_string())
    }
}

fn bind_value(
    stmt: &mut rusqlite::CachedStatement<'_>,
    index: usize,
    value: &Value,
) -> Result<(), DatabaseError> {
    match value {
        Value::Null => stmt
            .raw_bind_parameter(index, rusqlite::types::Null)
            .map_err(execute_error),
        Value::String(v) => stmt
            .raw_bind_parameter(index, v.as_str())
            .map_err(execute_error),
        Value::Bytes(v) => stmt
            .raw_bind_parameter(index, v.as_slice())
            .map_err(execute_error),
        Value::Bool(v) => stmt.raw_bind_parameter(index, *v).map_err(execute_error),
        Value::Int(v) => stmt.raw_bind_parameter(index, *v).map_err(execute_error),
        Value::UInt(v) => {
            let signed = i64::try_from(*v)
                .map_err(|_| DatabaseError::Execute("integer parameter out of range".to_string()))?;
            stmt.raw_bind_parameter(index, signed).map_err(execute_error)
        }
        Value::Real(v) => stmt.raw_bind_parameter(index, *v).map_err(execute_error),
        Value::DateTime(v) => stmt.raw_bind_parameter(index, v).map_err(execute_error),
        Value::Array(_) => Err(DatabaseError::Usage(
            "array parameters must be expanded before binding".to_string(),
        )),
    }
}

fn from_row(column_names: &[String], row: &rusqlite::Row<'_>) -> Row {
    let mut columns = Vec::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        let value = match row.get_ref(i) {
            Ok(ValueRef::Null) | Err(_) => Value::Null,
            Ok(ValueRef::Integer(v)) => Value::Int(v),
            Ok(ValueRef::Real(v)) => Value::Real(v),
            Ok(ValueRef::Text(v)) => Value::String(String::from_utf8_lossy(v).into_owned()),
            Ok(ValueRef::Blob(v)) => Value::Bytes(v.to_vec()),
        };
        columns.push((name.clone(), value));
    }
    Row { columns }
}
