//! MySQL connection capability over the blocking `mysql` driver.
//!
//! The driver parses `:name` placeholders natively, so statements go out
//! unchanged with a named parameter map; prepared-statement reuse is the
//! driver's own statement cache. A unix socket replaces host/port when
//! configured, the two cannot be combined.

use std::collections::HashMap;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use crate::config::Config;
use crate::connection::{Connection, ExecResult};
use crate::{DatabaseError, Row, Value};

pub(crate) fn connect(config: &Config) -> Result<Box<dyn Connection>, DatabaseError> {
    let dbname = config.dbname.clone().ok_or_else(|| {
        DatabaseError::Config("no database name specified for MySQL database".to_string())
    })?;

    let mut opts = OptsBuilder::new()
        .db_name(Some(dbname))
        .user(config.username.clone())
        .pass(config.password.clone());

    if let Some(socket) = &config.unix_socket {
        opts = opts.socket(Some(socket.clone()));
    } else {
        opts = opts.ip_or_hostname(config.host.clone());
        if let Some(port) = config.port {
            opts = opts.tcp_port(port);
        }
    }

    let conn = Conn::new(opts).map_err(|e| {
        log::error!("mysql connect failed: {e}");
        DatabaseError::Connect("mysql")
    })?;

    Ok(Box::new(MySql {
        conn,
        in_transaction: false,
    }))
}

struct MySql {
    conn: Conn,
    in_transaction: bool,
}

fn execute_error(e: mysql::Error) -> DatabaseError {
    DatabaseError::Execute(e.to_string())
}

impl Connection for MySql {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[(String, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        let params = to_mysql_params(params)?;
        let rows: Vec<mysql::Row> = self.conn.exec(sql, params).map_err(execute_error)?;
        let affected = self.conn.affected_rows();

        let rows = rows.into_iter().map(from_row).collect();
        Ok(ExecResult { rows, affected })
    }

    fn exec(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.conn.query_drop(sql).map_err(execute_error)?;
        Ok(self.conn.affected_rows())
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn last_insert_id(&mut self) -> Result<u64, DatabaseError> {
        Ok(self.conn.last_insert_id())
    }

    fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Err(DatabaseError::Usage(
                "a transaction is already active".to_string(),
            ));
        }
        self.conn
            .query_drop("START TRANSACTION")
            .map_err(execute_error)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.conn.query_drop("COMMIT").map_err(execute_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.conn.query_drop("ROLLBACK").map_err(execute_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn client_version(&self) -> Option<String> {
        None
    }

    fn server_version(&mut self) -> Option<String> {
        let (major, minor, patch) = self.conn.server_version();
        Some(format!("{major}.{minor}.{patch}"))
    }
}

fn to_mysql_params(params: &[(String, Value)]) -> Result<mysql::Params, DatabaseError> {
    if params.is_empty() {
        return Ok(mysql::Params::Empty);
    }
    let mut map: HashMap<Vec<u8>, mysql::Value> = HashMap::with_capacity(params.len());
    for (name, value) in params {
        let key = name.trim_start_matches(':').as_bytes().to_vec();
        map.insert(key, to_mysql_value(value)?);
    }
    Ok(mysql::Params::Named(map))
}

fn to_mysql_value(value: &Value) -> Result<mysql::Value, DatabaseError> {
    Ok(match value {
        Value::Null => mysql::Value::NULL,
        Value::String(v) => mysql::Value::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => mysql::Value::Bytes(v.clone()),
        Value::Bool(v) => mysql::Value::Int(i64::from(*v)),
        Value::Int(v) => mysql::Value::Int(*v),
        Value::UInt(v) => mysql::Value::UInt(*v),
        Value::Real(v) => mysql::Value::Double(*v),
        Value::DateTime(v) => {
            use chrono::{Datelike, Timelike};
            mysql::Value::Date(
                u16::try_from(v.year()).unwrap_or(0),
                u8::try_from(v.month()).unwrap_or(0),
                u8::try_from(v.day()).unwrap_or(0),
                u8::try_from(v.hour()).unwrap_or(0),
                u8::try_from(v.minute()).unwrap_or(0),
                u8::try_from(v.second()).unwrap_or(0),
                v.and_utc().timestamp_subsec_micros(),
            )
        }
        Value::Array(_) => {
            return Err(DatabaseError::Usage(
                "array parameters must be expanded before binding".to_string(),
            ));
        }
    })
}

fn from_mysql_value(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql::Value::Int(v) => Value::Int(v),
        mysql::Value::UInt(v) => Value::UInt(v),
        mysql::Value::Float(v) => Value::Real(f64::from(v)),
        mysql::Value::Double(v) => Value::Real(v),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = chrono::NaiveDate::from_ymd_opt(
                i32::from(year),
                u32::from(month),
                u32::from(day),
            );
            let time = chrono::NaiveTime::from_hms_micro_opt(
                u32::from(hour),
                u32::from(minute),
                u32::from(second),
                micros,
            );
            match (date, time) {
                (Some(date), Some(time)) => Value::DateTime(date.and_time(time)),
                _ => Value::Null,
            }
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let hours = u32::from(days) * 24 + u32::from(hours);
            Value::String(format!(
                "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

fn from_row(row: mysql::Row) -> Row {
    let column_names: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect();
    let values = row.unwrap();

    Row {
        columns: column_names
            .into_iter()
            .zip(values.into_iter().map(from_mysql_value))
            .collect(),
    }
}
