//! SQLite dialect.
//!
//! SQLite's ALTER TABLE support is thin, so several operations become
//! multi-statement procedures: TRUNCATE is a sequence reset plus DELETE,
//! and dropping a column rebuilds the whole table through a timestamped
//! shadow copy. `AUTOINCREMENT` columns must themselves be declared
//! `PRIMARY KEY`, which is why a serial column suppresses the separate
//! `PRIMARY KEY (...)` clause.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::DatabaseError;
use crate::connection::Executor;
use crate::query::{CreateTable, Replace, ReplaceOutcome};
use crate::schema::{ColumnInfo, IndexInfo, TableInfo};

use super::{Dialect, rebuild_unique_groups, run_replace_emulated, strip_index_prefix};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn limit_offset(&self, limit: u64, offset: u64) -> String {
        let mut sql = String::new();
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        } else if offset > 0 {
            sql.push_str(" LIMIT -1");
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// An AUTOINCREMENT column has to be the declared PRIMARY KEY, so the
    /// `inline_primary` hint is ignored.
    fn column_serial(&self, name: &str, _inline_primary: bool) -> String {
        format!("{name} INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT")
    }

    fn set_names_sql(&self, charset: &str) -> String {
        format!("PRAGMA encoding = {charset}")
    }

    fn session_option_sql(&self, name: &str, value: &str) -> String {
        format!("PRAGMA {name} = {value}")
    }

    /// No TRUNCATE statement; empty the table and reset its
    /// `sqlite_sequence` counter.
    fn run_truncate(&self, ex: &mut Executor, table: &str) -> Result<(), DatabaseError> {
        let sql = format!(
            "DELETE FROM sqlite_sequence WHERE name = {};\nDELETE FROM {table}",
            ex.quote(table)
        );
        ex.exec(&sql)?;
        Ok(())
    }

    fn run_create_table(
        &self,
        ex: &mut Executor,
        query: &CreateTable,
        table: &str,
    ) -> Result<(), DatabaseError> {
        let has_serial = query.fields.iter().any(|column| column.kind.is_serial());

        let mut definitions: Vec<String> = query
            .fields
            .iter()
            .map(|column| self.column_definition(column, false))
            .collect();
        // The serial column already carries PRIMARY KEY; declaring it again
        // is a syntax error.
        if !query.primary.is_empty() && !has_serial {
            definitions.push(format!("PRIMARY KEY ({})", query.primary.join(", ")));
        }
        ex.exec(&format!("CREATE TABLE {table} ({})", definitions.join(", ")))?;

        for (name, index) in &query.indices {
            self.run_add_index(ex, table, name, &index.fields, index.unique)?;
        }
        Ok(())
    }

    fn run_table_exists(&self, ex: &mut Executor, table: &str) -> Result<bool, DatabaseError> {
        let sql = format!(
            "SELECT 1 FROM sqlite_master WHERE name = {} AND type='table'",
            ex.quote(table)
        );
        ex.probe(&sql)
    }

    /// Values adapt to whatever the column holds; the declared type never
    /// constrains them, so there is nothing to change.
    fn run_alter_field(
        &self,
        _ex: &mut Executor,
        _table: &str,
        _column: &crate::schema::Column,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    /// Column removal by table rebuild: copy the rows into a timestamped
    /// shadow table, recreate the table without the column, copy back, and
    /// reattach every index that did not reference the dropped column.
    ///
    /// The sequence is not transactional; if it fails midway the shadow
    /// table (or a partially rebuilt original) is left behind.
    fn run_drop_field(
        &self,
        ex: &mut Executor,
        table: &str,
        field: &str,
    ) -> Result<(), DatabaseError> {
        let info = self.run_table_info(ex, table)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let shadow = format!("{table}_t{now}");

        ex.exec(&format!("CREATE TABLE {shadow} AS SELECT * FROM {table}"))?;
        ex.exec(&format!("DROP TABLE {table}"))?;

        let mut definitions = Vec::new();
        let mut surviving = Vec::new();
        for (name, column) in &info.columns {
            if name == field {
                continue;
            }
            surviving.push(name.clone());
            let mut definition = format!("{name} {}", column.type_name);
            if !column.allow_null {
                definition.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                definition.push_str(" DEFAULT ");
                definition.push_str(&default_literal(default));
            }
            definitions.push(definition);
        }
        let primary: Vec<&str> = info
            .primary_key
            .iter()
            .filter(|column| *column != field)
            .map(String::as_str)
            .collect();
        if !primary.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }

        ex.exec(&format!("CREATE TABLE {table} ({})", definitions.join(", ")))?;
        ex.exec(&format!(
            "INSERT INTO {table} SELECT {} FROM {shadow}",
            surviving.join(", ")
        ))?;

        for (name, index) in &info.indices {
            if index.fields.iter().any(|f| f == field) {
                continue;
            }
            self.run_add_index(ex, table, name, &index.fields, index.unique)?;
        }

        ex.exec(&format!("DROP TABLE {shadow}"))?;
        Ok(())
    }

    fn run_field_exists(
        &self,
        ex: &mut Executor,
        table: &str,
        field: &str,
    ) -> Result<bool, DatabaseError> {
        let result = ex.query(&format!("PRAGMA table_info({table})"), &[])?;
        Ok(result
            .rows
            .iter()
            .any(|row| row.get_text("name").as_deref() == Some(field)))
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
            "CREATE {unique}INDEX {table}_{index} ON {table}({})",
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
        ex.exec(&format!("DROP INDEX {table}_{index}"))?;
        Ok(())
    }

    fn run_index_exists(
        &self,
        ex: &mut Executor,
        table: &str,
        index: &str,
    ) -> Result<bool, DatabaseError> {
        let sql = format!(
            "SELECT 1 FROM sqlite_master WHERE name = {} AND tbl_name = {} AND type='index'",
            ex.quote(&format!("{table}_{index}")),
            ex.quote(table)
        );
        ex.probe(&sql)
    }

    fn run_table_info(&self, ex: &mut Executor, table: &str) -> Result<TableInfo, DatabaseError> {
        let mut info = TableInfo::default();

        let result = ex.query(&format!("PRAGMA table_info({table})"), &[])?;
        for row in &result.rows {
            let Some(name) = row.get_text("name") else {
                continue;
            };
            let column = ColumnInfo {
                type_name: row.get_text("type").unwrap_or_default(),
                default: row
                    .get("dflt_value")
                    .and_then(|v| v.to_text())
                    .and_then(|raw| clean_default(&raw)),
                allow_null: row.get_i64("notnull") == Some(0),
            };
            info.columns.push((name.clone(), column));

            if row.get_i64("pk").unwrap_or(0) > 0 {
                info.primary_key.push(name);
            }
        }

        let result = ex.query(&format!("PRAGMA index_list({table})"), &[])?;
        for index_row in &result.rows {
            let Some(index_name) = index_row.get_text("name") else {
                continue;
            };
            // Auto-generated indices (primary keys, inline UNIQUE
            // constraints) are not ours to report.
            if index_name.starts_with("sqlite_autoindex_") {
                continue;
            }
            let unique = index_row.get_i64("unique") == Some(1);

            let detail = ex.query(&format!("PRAGMA index_info({index_name})"), &[])?;
            let fields: Vec<String> = detail
                .rows
                .iter()
                .filter_map(|row| row.get_text("name"))
                .collect();

            info.indices.push((
                strip_index_prefix(table, &index_name),
                IndexInfo { fields, unique },
            ));
        }
        rebuild_unique_groups(&mut info);

        Ok(info)
    }

    fn run_replace(
        &self,
        ex: &mut Executor,
        query: &Replace,
        table: &str,
        params: &[(String, crate::Value)],
    ) -> Result<ReplaceOutcome, DatabaseError> {
        run_replace_emulated(self, ex, query, table, params)
    }
}

/// Normalizes a `PRAGMA table_info` default: SQLite reports the token as
/// written, so `DEFAULT 'abc'` comes back quoted.
fn clean_default(raw: &str) -> Option<String> {
    if raw == "NULL" {
        return None;
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(raw[1..raw.len() - 1].replace("''", "'"));
    }
    Some(raw.to_string())
}

/// Re-quotes a normalized default for the rebuilt table definition.
fn default_literal(value: &str) -> String {
    if value.parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}
