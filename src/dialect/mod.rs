//! Per-backend SQL compilation and live DDL/introspection procedures.
//!
//! [`Dialect`] is one compiler over the closed set of query variants. The
//! trait's default methods implement the base (ANSI, MySQL-flavored)
//! grammar; each backend overrides only the clauses and procedures that
//! actually differ: the auto-increment idiom, the LIMIT/OFFSET sentinel,
//! condition rewriting, REPLACE strategy, and the catalog queries behind
//! introspection.
//!
//! Compilation methods are pure (query in, SQL text out). Run procedures
//! take a [`Executor`] because they need live round-trips, sometimes several
//! per logical operation.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::connection::Executor;
use crate::query::{CreateTable, Delete, Insert, Replace, ReplaceOutcome, Select, Update};
use crate::schema::{Column, ColumnInfo, ColumnType, TableInfo};
use crate::{DatabaseError, Value};

pub use self::mysql::MySqlDialect;
pub use self::postgres::PgSqlDialect;
pub use self::sqlite::SqliteDialect;

/// The closed set of compilable statements.
#[derive(Debug, Clone, Copy)]
pub enum Stmt<'a> {
    Select(&'a Select),
    Insert(&'a Insert),
    Update(&'a Update),
    Delete(&'a Delete),
}

/// A backend-specific SQL compiler plus its live run procedures.
///
/// The default method bodies are the base grammar; see the module docs.
#[allow(clippy::missing_errors_doc)]
pub trait Dialect {
    fn name(&self) -> &'static str;

    /// Compiles one of the multi-capable statements to SQL text.
    fn compile(&self, stmt: Stmt<'_>, prefix: &str) -> Result<String, DatabaseError> {
        match stmt {
            Stmt::Select(query) => self.compile_select(query, prefix),
            Stmt::Insert(query) => self.compile_insert(query, prefix),
            Stmt::Update(query) => self.compile_update(query, prefix),
            Stmt::Delete(query) => self.compile_delete(query, prefix),
        }
    }

    fn compile_select(&self, query: &Select, prefix: &str) -> Result<String, DatabaseError> {
        if query.fields.is_empty() {
            return Err(DatabaseError::Compile(
                "a SELECT query must select at least one field".to_string(),
            ));
        }

        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(
            &query
                .fields
                .iter()
                .map(|(_, expression)| expression.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );

        if let Some(table) = query.physical_table(prefix) {
            sql.push_str(" FROM ");
            sql.push_str(&table);
        }

        for (_, join) in &query.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            sql.push_str(&join.physical_table(query.use_prefix, prefix));
            if !join.on.is_empty() {
                sql.push_str(" ON ");
                sql.push_str(&self.conditions(&join.on));
            }
        }

        if !query.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions(&query.where_clause));
        }
        if !query.group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&query.group.join(", "));
        }
        if !query.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.conditions(&query.having));
        }
        if !query.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&query.order.join(", "));
        }
        if query.limit > 0 || query.offset > 0 {
            sql.push_str(&self.limit_offset(query.limit, query.offset));
        }

        Ok(sql)
    }

    fn compile_insert(&self, query: &Insert, prefix: &str) -> Result<String, DatabaseError> {
        let table = query.physical_table(prefix);
        if table.is_empty() {
            return Err(DatabaseError::Compile(
                "an INSERT query must have a table specified".to_string(),
            ));
        }
        if query.values.is_empty() {
            return Err(DatabaseError::Compile(
                "an INSERT query must contain at least one value".to_string(),
            ));
        }

        let columns = query
            .values
            .iter()
            .map(|(column, _)| column.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let expressions = query
            .values
            .iter()
            .map(|(_, expression)| expression.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("INSERT INTO {table} ({columns}) VALUES ({expressions})"))
    }

    fn compile_update(&self, query: &Update, prefix: &str) -> Result<String, DatabaseError> {
        let table = query.physical_table(prefix);
        if table.is_empty() {
            return Err(DatabaseError::Compile(
                "an UPDATE query must have a table specified".to_string(),
            ));
        }
        if query.values.is_empty() {
            return Err(DatabaseError::Compile(
                "an UPDATE query must contain at least one value".to_string(),
            ));
        }

        let assignments = query
            .values
            .iter()
            .map(|(column, expression)| format!("{column} = {expression}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {table} SET {assignments}");

        if !query.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions(&query.where_clause));
        }
        self.push_update_delete_tail(&mut sql, "UPDATE", &query.order, query.limit, query.offset)?;

        Ok(sql)
    }

    fn compile_delete(&self, query: &Delete, prefix: &str) -> Result<String, DatabaseError> {
        let table = query.physical_table(prefix);
        if table.is_empty() {
            return Err(DatabaseError::Compile(
                "a DELETE query must have a table specified".to_string(),
            ));
        }

        let mut sql = format!("DELETE FROM {table}");
        if !query.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions(&query.where_clause));
        }
        self.push_update_delete_tail(&mut sql, "DELETE", &query.order, query.limit, query.offset)?;

        Ok(sql)
    }

    /// ORDER/LIMIT on UPDATE/DELETE is a portability boundary: only MySQL's
    /// grammar allows it, so the base compiler rejects it.
    fn push_update_delete_tail(
        &self,
        sql: &mut String,
        verb: &str,
        order: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<(), DatabaseError> {
        if order.is_empty() && limit == 0 && offset == 0 {
            return Ok(());
        }
        if !self.supports_update_order_limit() {
            return Err(DatabaseError::Compile(format!(
                "the {} dialect does not support ORDER BY or LIMIT on {verb}",
                self.name()
            )));
        }
        if offset > 0 {
            return Err(DatabaseError::Compile(format!(
                "OFFSET is not supported on {verb}"
            )));
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(())
    }

    fn supports_update_order_limit(&self) -> bool {
        false
    }

    /// Wraps a caller-supplied raw condition fragment. The fragment itself
    /// is opaque; it is never parsed or validated.
    fn conditions(&self, raw: &str) -> String {
        format!("({raw})")
    }

    /// An offset without a limit substitutes the backend's "unbounded"
    /// sentinel so that `OFFSET` alone stays syntactically legal.
    fn limit_offset(&self, limit: u64, offset: u64) -> String {
        let limit = if offset > 0 && limit == 0 {
            u64::MAX
        } else {
            limit
        };
        let mut sql = String::new();
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    fn column_type(&self, kind: &ColumnType) -> String {
        match kind {
            // Serial is handled by column_serial; the bare type only shows
            // up if a caller sidesteps column_definition.
            ColumnType::Serial | ColumnType::Int => "INTEGER".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Bool => "BOOLEAN".to_string(),
            ColumnType::Varchar(length) => format!("VARCHAR({length})"),
            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::TinyIntUnsigned => "TINYINT UNSIGNED".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::SmallIntUnsigned => "SMALLINT UNSIGNED".to_string(),
            ColumnType::MediumInt => "MEDIUMINT".to_string(),
            ColumnType::MediumIntUnsigned => "MEDIUMINT UNSIGNED".to_string(),
            ColumnType::IntUnsigned => "INTEGER UNSIGNED".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::BigIntUnsigned => "BIGINT UNSIGNED".to_string(),
        }
    }

    /// The backend's auto-increment idiom. `inline_primary` is set when no
    /// separate `PRIMARY KEY (...)` clause will be emitted.
    fn column_serial(&self, name: &str, inline_primary: bool) -> String {
        let mut sql = format!("{name} INTEGER NOT NULL AUTO_INCREMENT");
        if inline_primary {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }

    fn column_definition(&self, column: &Column, inline_primary: bool) -> String {
        if column.kind.is_serial() {
            return self.column_serial(&column.name, inline_primary);
        }
        let mut sql = format!("{} {}", column.name, self.column_type(&column.kind));
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        if !column.allow_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.literal(default));
        }
        sql
    }

    /// Renders a value as an inline SQL literal, for DEFAULT clauses.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::String(text) => format!("'{}'", text.replace('\'', "''")),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
            Value::Bool(flag) => self.bool_literal(*flag).to_string(),
            Value::Int(number) => number.to_string(),
            Value::UInt(number) => number.to_string(),
            Value::Real(number) => number.to_string(),
            Value::DateTime(stamp) => format!("'{}'", stamp.format("%Y-%m-%d %H:%M:%S")),
            Value::Array(values) => values
                .iter()
                .map(|v| self.literal(v))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    /// Statement issued right after connecting to pick the connection
    /// charset. `charset` arrives pre-quoted.
    fn set_names_sql(&self, charset: &str) -> String {
        format!("SET NAMES {charset}")
    }

    /// Session-level rendering of a `driver_options` entry.
    fn session_option_sql(&self, name: &str, value: &str) -> String {
        format!("SET {name} = {value}")
    }

    fn run_truncate(&self, ex: &mut Executor, table: &str) -> Result<(), DatabaseError> {
        ex.exec(&format!("TRUNCATE TABLE {table}"))?;
        Ok(())
    }

    fn run_create_table(
        &self,
        ex: &mut Executor,
        query: &CreateTable,
        table: &str,
    ) -> Result<(), DatabaseError> {
        let inline_primary = query.primary.is_empty();
        let mut definitions: Vec<String> = query
            .fields
            .iter()
            .map(|column| self.column_definition(column, inline_primary))
            .collect();
        if !query.primary.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", query.primary.join(", ")));
        }
        ex.exec(&format!("CREATE TABLE {table} ({})", definitions.join(", ")))?;

        // Indices go in as a second phase of statements.
        for (name, index) in &query.indices {
            self.run_add_index(ex, table, name, &index.fields, index.unique)?;
        }
        Ok(())
    }

    fn run_rename_table(
        &self,
        ex: &mut Executor,
        table: &str,
        new_name: &str,
    ) -> Result<(), DatabaseError> {
        ex.exec(&format!("ALTER TABLE {table} RENAME TO {new_name}"))?;
        Ok(())
    }

    fn run_drop_table(&self, ex: &mut Executor, table: &str) -> Result<(), DatabaseError> {
        ex.exec(&format!("DROP TABLE {table}"))?;
        Ok(())
    }

    fn run_table_exists(&self, ex: &mut Executor, table: &str) -> Result<bool, DatabaseError> {
        let sql = format!("SHOW TABLES LIKE {}", ex.quote(table));
        ex.probe(&sql)
    }

    fn run_add_field(
        &self,
        ex: &mut Executor,
        table: &str,
        column: &Column,
    ) -> Result<(), DatabaseError> {
        let definition = self.column_definition(column, false);
        ex.exec(&format!("ALTER TABLE {table} ADD COLUMN {definition}"))?;
        Ok(())
    }

    fn run_alter_field(
        &self,
        ex: &mut Executor,
        table: &str,
        column: &Column,
    ) -> Result<(), DatabaseError> {
        let definition = self.column_definition(column, false);
        ex.exec(&format!("ALTER TABLE {table} MODIFY {definition}"))?;
        Ok(())
    }

    fn run_drop_field(
        &self,
        ex: &mut Executor,
        table: &str,
        field: &str,
    ) -> Result<(), DatabaseError> {
        ex.exec(&format!("ALTER TABLE {table} DROP COLUMN {field}"))?;
        Ok(())
    }

    fn run_field_exists(
        &self,
        ex: &mut Executor,
        table: &str,
        field: &str,
    ) -> Result<bool, DatabaseError> {
        let sql = format!("SHOW COLUMNS FROM {table} LIKE {}", ex.quote(field));
        ex.probe(&sql)
    }

    fn run_add_index(
        &self,
        ex: &mut Executor,
        table: &str,
        index: &str,
        fields: &[String],
        unique: bool,
    ) -> Result<(), DatabaseError> {
        let unique = if unique { "UNIQUE " } else { "" };
        ex.exec(&format!(
            "ALTER TABLE {table} ADD {unique}INDEX {table}_{index} ({})",
            fields.join(",")
        ))?;
        Ok(())
    }

    fn run_drop_index(
        &self,
        ex: &mut Executor,
        table: &str,
        index: &str,
    ) -> Result<(), DatabaseError> {
        ex.exec(&format!("ALTER TABLE {table} DROP INDEX {table}_{index}"))?;
        Ok(())
    }

    fn run_index_exists(
        &self,
        ex: &mut Executor,
        table: &str,
        index: &str,
    ) -> Result<bool, DatabaseError> {
        let target = format!("{table}_{index}");
        let result = ex.query(&format!("SHOW INDEX FROM {table}"), &[])?;
        Ok(result
            .rows
            .iter()
            .any(|row| row.get_text("Key_name").as_deref() == Some(target.as_str())))
    }

    fn run_table_info(&self, ex: &mut Executor, table: &str) -> Result<TableInfo, DatabaseError> {
        let mut info = TableInfo::default();

        let result = ex.query(&format!("DESCRIBE {table}"), &[])?;
        for row in &result.rows {
            let Some(name) = row.get_text("Field") else {
                continue;
            };
            let column = ColumnInfo {
                type_name: row.get_text("Type").unwrap_or_default(),
                default: row.get_text("Default"),
                allow_null: row.get_text("Null").as_deref() == Some("YES"),
            };
            info.columns.push((name, column));
        }

        let result = ex.query(&format!("SHOW INDEXES FROM {table}"), &[])?;
        for row in &result.rows {
            let (Some(key_name), Some(column)) =
                (row.get_text("Key_name"), row.get_text("Column_name"))
            else {
                continue;
            };
            if key_name == "PRIMARY" {
                info.primary_key.push(column);
                continue;
            }
            let logical = strip_index_prefix(table, &key_name);
            let unique = row.get_i64("Non_unique") == Some(0);
            if let Some(entry) = info.indices.iter_mut().find(|(name, _)| *name == logical) {
                entry.1.fields.push(column);
            } else {
                info.indices
                    .push((logical, crate::schema::IndexInfo { fields: vec![column], unique }));
            }
        }
        rebuild_unique_groups(&mut info);

        Ok(info)
    }

    /// Native REPLACE: delete-then-insert semantics, the driver reports two
    /// affected rows when an existing row was replaced.
    fn run_replace(
        &self,
        ex: &mut Executor,
        query: &Replace,
        table: &str,
        params: &[(String, Value)],
    ) -> Result<ReplaceOutcome, DatabaseError> {
        let (columns, expressions) = replace_columns(query);
        let sql = format!(
            "REPLACE INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            expressions.join(", ")
        );
        let affected = ex.query(&sql, params)?.affected;
        Ok(if affected >= 2 {
            ReplaceOutcome::Updated
        } else {
            ReplaceOutcome::Inserted
        })
    }
}

/// Key columns first, then value columns, for REPLACE-style inserts.
pub(crate) fn replace_columns(query: &Replace) -> (Vec<&str>, Vec<&str>) {
    let mut columns: Vec<&str> = query.keys.iter().map(|(c, _)| c.as_str()).collect();
    let mut expressions: Vec<&str> = query.keys.iter().map(|(_, e)| e.as_str()).collect();
    columns.extend(query.values.iter().map(|(c, _)| c.as_str()));
    expressions.extend(query.values.iter().map(|(_, e)| e.as_str()));
    (columns, expressions)
}

/// The two statements of the emulated REPLACE, plus the extended parameter
/// set for the insert.
///
/// The insert's `WHERE NOT EXISTS` guard re-binds each key value under a
/// reserved `:__k<i>` name, because the caller's placeholder already
/// appears once in the insert's SELECT list. The namespace is positional
/// and reserved, so it cannot collide with caller-chosen names.
pub(crate) fn emulated_replace_statements(
    dialect: &dyn Dialect,
    query: &Replace,
    table: &str,
    params: &[(String, Value)],
) -> (String, String, Vec<(String, Value)>) {
    let assignments = query
        .values
        .iter()
        .map(|(column, expression)| format!("{column} = {expression}"))
        .collect::<Vec<_>>()
        .join(", ");
    let key_conditions = query
        .keys
        .iter()
        .map(|(column, expression)| format!("{column} = {expression}"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let update_sql = format!(
        "UPDATE {table} SET {assignments} WHERE {}",
        dialect.conditions(&key_conditions)
    );

    let mut insert_params = params.to_vec();
    let mut guards = Vec::new();
    for (i, (column, expression)) in query.keys.iter().enumerate() {
        if let Some((_, value)) = params.iter().find(|(name, _)| name == expression) {
            let renamed = format!(":__k{i}");
            guards.push(format!("{column} = {renamed}"));
            insert_params.push((renamed, value.clone()));
        } else {
            // Not a bound placeholder; reuse the expression as-is.
            guards.push(format!("{column} = {expression}"));
        }
    }

    let (columns, expressions) = replace_columns(query);
    let insert_sql = format!(
        "INSERT INTO {table} ({}) SELECT {} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {})",
        columns.join(", "),
        expressions.join(", "),
        guards.join(" AND ")
    );

    (update_sql, insert_sql, insert_params)
}

/// UPDATE-then-INSERT REPLACE emulation for backends without a native
/// REPLACE. Both statements run in program order on the one connection; no
/// implicit transaction wraps them.
pub(crate) fn run_replace_emulated(
    dialect: &dyn Dialect,
    ex: &mut Executor,
    query: &Replace,
    table: &str,
    params: &[(String, Value)],
) -> Result<ReplaceOutcome, DatabaseError> {
    let (update_sql, insert_sql, insert_params) =
        emulated_replace_statements(dialect, query, table, params);

    let updated = ex.query(&update_sql, params)?.affected;
    let inserted = ex.query(&insert_sql, &insert_params)?.affected;
    log::trace!("replace on {table}: updated={updated} inserted={inserted}");

    Ok(if inserted > 0 {
        ReplaceOutcome::Inserted
    } else {
        ReplaceOutcome::Updated
    })
}

/// Strips the physical-table prefix from a stored index name, recovering
/// the logical name.
pub(crate) fn strip_index_prefix(table: &str, index: &str) -> String {
    index
        .strip_prefix(&format!("{table}_"))
        .unwrap_or(index)
        .to_string()
}

/// Unique column groups are derived from the unique indices, in index
/// order.
pub(crate) fn rebuild_unique_groups(info: &mut TableInfo) {
    info.unique = info
        .indices
        .iter()
        .filter(|(_, index)| index.unique)
        .map(|(_, index)| index.fields.clone())
        .collect();
}

/// The plain ANSI rendition of the base grammar, with no backend-specific
/// overrides. Real adapters always use one of the concrete backends; this
/// exists for callers that only want SQL text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Delete, Insert, Select, Update};
    use pretty_assertions::assert_eq;

    fn select_all(table: &str) -> Select {
        Select::new(&["*"], Some(table), false)
    }

    #[test]
    fn select_requires_fields() {
        let query = Select::new(&[], Some("users"), false);
        let err = AnsiDialect.compile(Stmt::Select(&query), "").unwrap_err();
        assert!(matches!(err, DatabaseError::Compile(_)));
    }

    #[test]
    fn select_minimal() {
        let query = select_all("users");
        let sql = AnsiDialect.compile(Stmt::Select(&query), "").unwrap();
        assert_eq!(sql, "SELECT * FROM users");
    }

    #[test]
    fn select_without_table() {
        let query = Select::new(&["1"], None, false);
        let sql = AnsiDialect.compile(Stmt::Select(&query), "").unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn select_full_clause_order() {
        let mut query = Select::new(&["u.name", "COUNT(p.id)"], Some("users"), true);
        query.inner_join("p", "posts", "p.user_id = u.id");
        query.where_clause = "u.active = :active".to_string();
        query.group = vec!["u.name".to_string()];
        query.having = "COUNT(p.id) > :min".to_string();
        query.order = vec!["u.name ASC".to_string()];
        query.limit = 10;
        query.offset = 20;

        let sql = AnsiDialect.compile(Stmt::Select(&query), "app_").unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT u.name, COUNT(p.id) FROM app_users \
             INNER JOIN app_posts ON (p.user_id = u.id) \
             WHERE (u.active = :active) GROUP BY u.name \
             HAVING (COUNT(p.id) > :min) ORDER BY u.name ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn select_join_skips_prefix_when_disabled() {
        let mut query = select_all("users");
        query.use_prefix = false;
        query.left_join("p", "posts", "p.user_id = users.id");
        let sql = AnsiDialect.compile(Stmt::Select(&query), "app_").unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users LEFT JOIN posts ON (p.user_id = users.id)"
        );
    }

    #[test]
    fn offset_without_limit_uses_sentinel() {
        let mut query = select_all("users");
        query.offset = 5;
        let sql = AnsiDialect.compile(Stmt::Select(&query), "").unwrap();
        assert_eq!(sql, format!("SELECT * FROM users LIMIT {} OFFSET 5", u64::MAX));
    }

    #[test]
    fn zero_limit_and_offset_omit_clause() {
        let query = select_all("users");
        let sql = AnsiDialect.compile(Stmt::Select(&query), "").unwrap();
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));
    }

    #[test]
    fn insert_compiles_placeholders_verbatim() {
        let query = Insert::new(&[("username", ":username"), ("name", ":name")], "users");
        let sql = AnsiDialect.compile(Stmt::Insert(&query), "app_").unwrap();
        assert_eq!(
            sql,
            "INSERT INTO app_users (username, name) VALUES (:username, :name)"
        );
    }

    #[test]
    fn insert_requires_values() {
        let query = Insert::new(&[], "users");
        assert!(AnsiDialect.compile(Stmt::Insert(&query), "").is_err());
    }

    #[test]
    fn insert_requires_table() {
        let query = Insert::new(&[("a", ":a")], "");
        assert!(AnsiDialect.compile(Stmt::Insert(&query), "").is_err());
    }

    #[test]
    fn update_compiles_assignments() {
        let mut query = Update::new(&[("name", ":name")], "users");
        query.where_clause = "username = :username".to_string();
        let sql = AnsiDialect.compile(Stmt::Update(&query), "").unwrap();
        assert_eq!(
            sql,
            "UPDATE users SET name = :name WHERE (username = :username)"
        );
    }

    #[test]
    fn update_rejects_order_and_limit_on_base_grammar() {
        let mut query = Update::new(&[("name", ":name")], "users");
        query.limit = 1;
        assert!(AnsiDialect.compile(Stmt::Update(&query), "").is_err());

        let mut query = Update::new(&[("name", ":name")], "users");
        query.order = vec!["name ASC".to_string()];
        assert!(AnsiDialect.compile(Stmt::Update(&query), "").is_err());
    }

    #[test]
    fn delete_compiles_with_where() {
        let mut query = Delete::new("users");
        query.where_clause = "username = :username".to_string();
        let sql = AnsiDialect.compile(Stmt::Delete(&query), "app_").unwrap();
        assert_eq!(sql, "DELETE FROM app_users WHERE (username = :username)");
    }

    #[test]
    fn delete_requires_table() {
        let query = Delete::new("");
        assert!(AnsiDialect.compile(Stmt::Delete(&query), "").is_err());
    }

    #[test]
    fn column_definitions() {
        let dialect = AnsiDialect;
        let mut column = Column::new("name", ColumnType::Varchar(40));
        assert_eq!(dialect.column_definition(&column, false), "name VARCHAR(40)");

        column.allow_null = false;
        column.default = Some(Value::from("abc"));
        assert_eq!(
            dialect.column_definition(&column, false),
            "name VARCHAR(40) NOT NULL DEFAULT 'abc'"
        );

        column.collation = Some("utf8_general_ci".to_string());
        assert_eq!(
            dialect.column_definition(&column, false),
            "name VARCHAR(40) COLLATE utf8_general_ci NOT NULL DEFAULT 'abc'"
        );
    }

    #[test]
    fn serial_ignores_everything_but_the_name() {
        let dialect = AnsiDialect;
        let mut column = Column::new("id", ColumnType::Serial);
        column.default = Some(Value::from(7));
        column.allow_null = false;
        column.collation = Some("x".to_string());
        assert_eq!(
            dialect.column_definition(&column, true),
            "id INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY"
        );
        assert_eq!(
            dialect.column_definition(&column, false),
            "id INTEGER NOT NULL AUTO_INCREMENT"
        );
    }

    #[test]
    fn literal_quoting() {
        let dialect = AnsiDialect;
        assert_eq!(dialect.literal(&Value::from("it's")), "'it''s'");
        assert_eq!(dialect.literal(&Value::Null), "NULL");
        assert_eq!(dialect.literal(&Value::from(true)), "1");
        assert_eq!(dialect.literal(&Value::from(-3_i64)), "-3");
    }

    #[test]
    fn index_prefix_stripping() {
        assert_eq!(strip_index_prefix("users", "users_name_idx"), "name_idx");
        assert_eq!(strip_index_prefix("users", "other"), "other");
    }

    #[test]
    fn emulated_replace_renames_key_placeholders() {
        let query = Replace::new(
            &[("name", ":name")],
            "test2",
            &[("username", ":username")],
        );
        let params = vec![
            (":username".to_string(), Value::from("lie2815")),
            (":name".to_string(), Value::from("Franz")),
        ];
        let (update_sql, insert_sql, insert_params) =
            emulated_replace_statements(&AnsiDialect, &query, "test2", &params);

        assert_eq!(
            update_sql,
            "UPDATE test2 SET name = :name WHERE (username = :username)"
        );
        assert_eq!(
            insert_sql,
            "INSERT INTO test2 (username, name) SELECT :username, :name \
             WHERE NOT EXISTS (SELECT 1 FROM test2 WHERE username = :__k0)"
        );
        assert_eq!(insert_params.len(), 3);
        assert_eq!(
            insert_params[2],
            (":__k0".to_string(), Value::from("lie2815"))
        );
    }
}
