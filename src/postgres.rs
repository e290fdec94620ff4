//! PostgreSQL connection capability over the blocking `postgres` client.
//!
//! The wire protocol only knows `$n` placeholders, so named parameters are
//! rewritten before preparing: each parameter name that actually occurs in
//! the statement gets the next `$n`, every occurrence is replaced, and only
//! the referenced parameters are sent. The rewrite is boundary-aware and
//! skips `::type` casts, and repeated use of one name maps to one `$n`.
//!
//! Prepared statements are cached by rewritten SQL text. Parameter values
//! go out through a [`ToSql`] wrapper that adapts integer width and
//! boolean form to the server-declared parameter type.

use std::collections::HashMap;

use postgres::types::{IsNull, ToSql, Type, private::BytesMut};
use postgres::{Client, NoTls};
use regex::Regex;

use crate::config::Config;
use crate::connection::{Connection, ExecResult};
use crate::{DatabaseError, Row, Value};

pub(crate) fn connect(config: &Config) -> Result<Box<dyn Connection>, DatabaseError> {
    let dbname = config.dbname.clone().ok_or_else(|| {
        DatabaseError::Config("no database name specified for PostgreSQL database".to_string())
    })?;

    let mut pg = Client::configure();
    pg.dbname(&dbname);
    if let Some(host) = &config.host {
        pg.host(host);
    }
    if let Some(port) = config.port {
        pg.port(port);
    }
    if let Some(username) = &config.username {
        pg.user(username);
    }
    if let Some(password) = &config.password {
        pg.password(password);
    }

    let mut client = pg.connect(NoTls).map_err(|e| {
        log::error!("pgsql connect failed: {e}");
        DatabaseError::Connect("pgsql")
    })?;

    let server_version = client
        .query_one("SHOW server_version", &[])
        .ok()
        .and_then(|row| row.try_get::<_, String>(0).ok());

    Ok(Box::new(Postgres {
        client,
        statements: HashMap::new(),
        in_transaction: false,
        server_version,
    }))
}

struct Postgres {
    client: Client,
    statements: HashMap<String, postgres::Statement>,
    in_transaction: bool,
    server_version: Option<String>,
}

fn execute_error(e: postgres::Error) -> DatabaseError {
    DatabaseError::Execute(e.to_string())
}

impl Postgres {
    fn statement(&mut self, sql: &str) -> Result<postgres::Statement, DatabaseError> {
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self.client.prepare(sql).map_err(execute_error)?;
        self.statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }
}

impl Connection for Postgres {
    fn driver_name(&self) -> &'static str {
        "pgsql"
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[(String, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        let (sql, used) = number_placeholders(sql, params);
        let stmt = self.statement(&sql)?;

        let mut values: Vec<PgValue<'_>> = Vec::with_capacity(used.len());
        for index in &used {
            let value = &params[*index].1;
            if value.is_array() {
                return Err(DatabaseError::Usage(
                    "array parameters must be expanded before binding".to_string(),
                ));
            }
            values.push(PgValue(value));
        }
        let refs: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        if stmt.columns().is_empty() {
            let affected = self.client.execute(&stmt, &refs).map_err(execute_error)?;
            Ok(ExecResult {
                rows: vec![],
                affected,
            })
        } else {
            let rows = self.client.query(&stmt, &refs).map_err(execute_error)?;
            let rows = rows.iter().map(from_row).collect::<Result<Vec<_>, _>>()?;
            Ok(ExecResult { rows, affected: 0 })
        }
    }

    fn exec(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.client.batch_execute(sql).map_err(execute_error)?;
        Ok(0)
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn last_insert_id(&mut self) -> Result<u64, DatabaseError> {
        let row = self
            .client
            .query_one("SELECT lastval()", &[])
            .map_err(execute_error)?;
        let id: i64 = row.try_get(0).map_err(execute_error)?;
        u64::try_from(id).map_err(|_| DatabaseError::Execute("negative sequence value".to_string()))
    }

    fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Err(DatabaseError::Usage(
                "a transaction is already active".to_string(),
            ));
        }
        self.client.batch_execute("BEGIN").map_err(execute_error)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.client.batch_execute("COMMIT").map_err(execute_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::Usage("no active transaction".to_string()));
        }
        self.client
            .batch_execute("ROLLBACK")
            .map_err(execute_error)?;
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
        self.server_version.clone()
    }
}

/// Rewrites `:name` placeholders to `$n` and reports which parameters the
/// statement actually references, in `$n` order.
fn number_placeholders(sql: &str, params: &[(String, Value)]) -> (String, Vec<usize>) {
    let mut out = sql.to_string();
    let mut used = Vec::new();

    for (index, (name, _)) in params.iter().enumerate() {
        // A leading `:` in the previous character means a cast, not a
        // placeholder.
        let pattern = Regex::new(&format!(
            r"(^|[^:A-Za-z0-9_]){}\b",
            regex::escape(name)
        ))
        .expect("Invalid Regex");
        if !pattern.is_match(&out) {
            continue;
        }
        let number = used.len() + 1;
        out = pattern
            .replace_all(&out, format!("${{1}}$${number}").as_str())
            .into_owned();
        used.push(index);
    }

    (out, used)
}

/// Adapts a [`Value`] to the parameter type the server declared.
struct PgValue<'a>(&'a Value);

impl std::fmt::Debug for PgValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for PgValue<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::String(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Bool(v) => {
                if *ty == Type::BOOL {
                    v.to_sql(ty, out)
                } else {
                    int_to_sql(i64::from(*v), ty, out)
                }
            }
            Value::Int(v) => int_to_sql(*v, ty, out),
            Value::UInt(v) => int_to_sql(i64::try_from(*v)?, ty, out),
            Value::Real(v) => {
                if *ty == Type::FLOAT4 {
                    #[allow(clippy::cast_possible_truncation)]
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::DateTime(v) => v.to_sql(ty, out),
            Value::Array(_) => Err("array parameters must be expanded before binding".into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        self.to_sql(ty, out)
    }
}

fn int_to_sql(
    value: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        _ => value.to_sql(ty, out),
    }
}

fn from_row(row: &postgres::Row) -> Result<Row, DatabaseError> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = column_value(row, i, column.type_())?;
        columns.push((column.name().to_string(), value));
    }
    Ok(Row { columns })
}

fn column_value(row: &postgres::Row, i: usize, ty: &Type) -> Result<Value, DatabaseError> {
    let value = match ty.name() {
        "bool" => row
            .try_get::<_, Option<bool>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, Value::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "int8" => row
            .try_get::<_, Option<i64>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, Value::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, |v| Value::Real(f64::from(v))),
        "float8" => row
            .try_get::<_, Option<f64>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, Value::Real),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, Value::DateTime),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(i)
            .map_err(execute_error)?
            .map_or(Value::Null, Value::Bytes),
        _ => match row.try_get::<_, Option<String>>(i) {
            Ok(v) => v.map_or(Value::Null, Value::String),
            Err(e) => {
                log::warn!("cannot decode column type {}: {e}", ty.name());
                Value::Null
            }
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(names: &[&str]) -> Vec<(String, Value)> {
        names
            .iter()
            .map(|n| ((*n).to_string(), Value::Int(0)))
            .collect()
    }

    #[test]
    fn placeholders_are_numbered_in_parameter_order() {
        let (sql, used) = number_placeholders(
            "SELECT * FROM t WHERE a = :a AND b = :b",
            &params(&[":a", ":b"]),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(used, vec![0, 1]);
    }

    #[test]
    fn unused_parameters_are_skipped() {
        let (sql, used) =
            number_placeholders("UPDATE t SET x = :x", &params(&[":unused", ":x"]));
        assert_eq!(sql, "UPDATE t SET x = $1");
        assert_eq!(used, vec![1]);
    }

    #[test]
    fn repeated_name_maps_to_one_number() {
        let (sql, used) = number_placeholders(
            "SELECT :a, :b WHERE NOT EXISTS (SELECT 1 FROM t WHERE x = :a)",
            &params(&[":a", ":b"]),
        );
        assert_eq!(
            sql,
            "SELECT $1, $2 WHERE NOT EXISTS (SELECT 1 FROM t WHERE x = $1)"
        );
        assert_eq!(used, vec![0, 1]);
    }

    #[test]
    fn casts_are_not_placeholders() {
        let (sql, used) = number_placeholders(
            "SELECT x::text FROM t WHERE a = :text",
            &params(&[":text"]),
        );
        assert_eq!(sql, "SELECT x::text FROM t WHERE a = $1");
        assert_eq!(used, vec![0]);
    }

    #[test]
    fn prefix_names_do_not_collide() {
        let (sql, used) = number_placeholders(
            "SELECT * FROM t WHERE a = :id AND b = :id2",
            &params(&[":id", ":id2"]),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(used, vec![0, 1]);
    }
}
