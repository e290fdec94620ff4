//! PostgreSQL dialect.
//!
//! Diverges from the base grammar in every cross-cutting hook: conditions
//! get a case-insensitive `LIKE` -> `ILIKE` rewrite, offset-without-limit
//! uses `LIMIT ALL`, the serial idiom is `SERIAL NOT NULL`, and the MySQL
//! integer spellings are translated to types PostgreSQL actually has.
//! REPLACE is emulated (no native equivalent), and ALTER COLUMN goes
//! through a shadow-column copy.

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

use crate::DatabaseError;
use crate::connection::Executor;
use crate::query::{Replace, ReplaceOutcome};
use crate::schema::{Column, ColumnInfo, ColumnType, IndexInfo, TableInfo};

use super::{Dialect, rebuild_unique_groups, run_replace_emulated, strip_index_prefix};

static LIKE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\s)LIKE(\s)").expect("Invalid Regex"));

/// Strips the `::type` cast decoration PostgreSQL appends to reported
/// column defaults.
static CAST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"::[a-zA-Z_][a-zA-Z0-9_ ]*(\(\d+(,\s*\d+)?\))?$").expect("Invalid Regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PgSqlDialect;

impl PgSqlDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PgSqlDialect {
    fn name(&self) -> &'static str {
        "pgsql"
    }

    /// Callers write `LIKE`; PostgreSQL silently gets `ILIKE`, keeping
    /// match semantics case-insensitive across backends.
    fn conditions(&self, raw: &str) -> String {
        let sql = format!("({raw})");
        LIKE_REGEX.replace_all(&sql, "${1}ILIKE${2}").into_owned()
    }

    fn limit_offset(&self, limit: u64, offset: u64) -> String {
        let mut sql = String::new();
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        } else if offset > 0 {
            sql.push_str(" LIMIT ALL");
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    fn column_type(&self, kind: &ColumnType) -> String {
        match kind {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Bool => "BOOLEAN".to_string(),
            ColumnType::Varchar(length) => format!("VARCHAR({length})"),
            ColumnType::TinyInt | ColumnType::TinyIntUnsigned | ColumnType::SmallInt => {
                "SMALLINT".to_string()
            }
            ColumnType::SmallIntUnsigned | ColumnType::MediumInt | ColumnType::MediumIntUnsigned
            | ColumnType::Int => "INTEGER".to_string(),
            // No unsigned types; the next wider signed type holds the range.
            ColumnType::IntUnsigned | ColumnType::BigInt | ColumnType::BigIntUnsigned => {
                "BIGINT".to_string()
            }
        }
    }

    fn column_serial(&self, name: &str, inline_primary: bool) -> String {
        let mut sql = format!("{name} SERIAL NOT NULL");
        if inline_primary {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    fn run_truncate(&self, ex: &mut Executor, table: &str) -> Result<(), DatabaseError> {
        ex.exec(&format!("TRUNCATE TABLE {table} RESTART IDENTITY"))?;
        Ok(())
    }

    fn run_table_exists(&self, ex: &mut Executor, table: &str) -> Result<bool, DatabaseError> {
        let sql = format!("SELECT 1 FROM pg_class WHERE relname = {}", ex.quote(table));
        ex.probe(&sql)
    }

    /// Adding a column is a statement sequence: the bare column first, then
    /// the default, a backfill of existing rows, and the NOT NULL
    /// constraint once every row has a value.
    fn run_add_field(
        &self,
        ex: &mut Executor,
        table: &str,
        column: &Column,
    ) -> Result<(), DatabaseError> {
        if column.kind.is_serial() {
            ex.exec(&format!(
                "ALTER TABLE {table} ADD COLUMN {}",
                self.column_serial(&column.name, false)
            ))?;
            return Ok(());
        }

        let mut definition = format!("{} {}", column.name, self.column_type(&column.kind));
        if let Some(collation) = &column.collation {
            definition.push_str(&format!(" COLLATE \"{collation}\""));
        }
        ex.exec(&format!("ALTER TABLE {table} ADD COLUMN {definition}"))?;

        if let Some(default) = &column.default {
            let literal = self.literal(default);
            ex.exec(&format!(
                "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT {literal}",
                column.name
            ))?;
            ex.exec(&format!("UPDATE {table} SET {} = {literal}", column.name))?;
        }
        if !column.allow_null {
            ex.exec(&format!(
                "ALTER TABLE {table} ALTER COLUMN {} SET NOT NULL",
                column.name
            ))?;
        }
        Ok(())
    }

    /// Emulated via a shadow column: add, copy with a cast, drop the
    /// original, rename. Not wrapped in a transaction; a mid-sequence
    /// failure leaves the shadow column behind.
    fn run_alter_field(
        &self,
        ex: &mut Executor,
        table: &str,
        column: &Column,
    ) -> Result<(), DatabaseError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let shadow = format!("{}_t{now}", column.name);
        let type_name = self.column_type(&column.kind);

        ex.exec(&format!("ALTER TABLE {table} ADD COLUMN {shadow} {type_name}"))?;
        ex.exec(&format!(
            "UPDATE {table} SET {shadow} = CAST({} AS {type_name})",
            column.name
        ))?;
        ex.exec(&format!("ALTER TABLE {table} DROP COLUMN {}", column.name))?;
        ex.exec(&format!(
            "ALTER TABLE {table} RENAME COLUMN {shadow} TO {}",
            column.name
        ))?;

        if let Some(default) = &column.default {
            ex.exec(&format!(
                "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT {}",
                column.name,
                self.literal(default)
            ))?;
        }
        if !column.allow_null {
            ex.exec(&format!(
                "ALTER TABLE {table} ALTER COLUMN {} SET NOT NULL",
                column.name
            ))?;
        }
        Ok(())
    }

    fn run_field_exists(
        &self,
        ex: &mut Executor,
        table: &str,
        field: &str,
    ) -> Result<bool, DatabaseError> {
        let sql = format!(
            "SELECT 1 FROM pg_class c INNER JOIN pg_attribute a ON a.attrelid = c.oid \
             WHERE c.relname = {} AND a.attname = {}",
            ex.quote(table),
            ex.quote(field)
        );
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
            "SELECT 1 FROM pg_index i \
             INNER JOIN pg_class c1 ON c1.oid = i.indrelid \
             INNER JOIN pg_class c2 ON c2.oid = i.indexrelid \
             WHERE c1.relname = {} AND c2.relname = {}",
            ex.quote(table),
            ex.quote(&format!("{table}_{index}"))
        );
        ex.probe(&sql)
    }

    fn run_table_info(&self, ex: &mut Executor, table: &str) -> Result<TableInfo, DatabaseError> {
        let mut info = TableInfo::default();

        let sql = format!(
            "SELECT column_name, data_type, column_default, is_nullable \
             FROM information_schema.columns WHERE table_name = {} \
             ORDER BY ordinal_position",
            ex.quote(table)
        );
        for row in &ex.query(&sql, &[])?.rows {
            let Some(name) = row.get_text("column_name") else {
                continue;
            };
            let column = ColumnInfo {
                type_name: row.get_text("data_type").unwrap_or_default(),
                default: row
                    .get_text("column_default")
                    .and_then(|raw| clean_default(&raw)),
                allow_null: row.get_text("is_nullable").as_deref() == Some("YES"),
            };
            info.columns.push((name, column));
        }

        let sql = format!(
            "SELECT c2.relname AS index_name, i.indisunique AS is_unique, \
             i.indisprimary AS is_primary, a.attname AS column_name \
             FROM pg_index i \
             INNER JOIN pg_class c1 ON c1.oid = i.indrelid \
             INNER JOIN pg_class c2 ON c2.oid = i.indexrelid \
             INNER JOIN pg_attribute a ON a.attrelid = c1.oid AND a.attnum = ANY(i.indkey) \
             WHERE c1.relname = {} ORDER BY c2.relname, a.attnum",
            ex.quote(table)
        );
        for row in &ex.query(&sql, &[])?.rows {
            let (Some(index_name), Some(column)) =
                (row.get_text("index_name"), row.get_text("column_name"))
            else {
                continue;
            };
            if row.get_bool("is_primary") == Some(true) {
                info.primary_key.push(column);
                continue;
            }
            let logical = strip_index_prefix(table, &index_name);
            let unique = row.get_bool("is_unique") == Some(true);
            if let Some(entry) = info.indices.iter_mut().find(|(name, _)| *name == logical) {
                entry.1.fields.push(column);
            } else {
                info.indices
                    .push((logical, IndexInfo { fields: vec![column], unique }));
            }
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

/// Normalizes a reported column default: `nextval(...)` sequence defaults
/// mark a SERIAL column and are suppressed entirely, `::type` casts are
/// stripped, and one layer of quoting is removed.
fn clean_default(raw: &str) -> Option<String> {
    if raw.starts_with("nextval(") {
        return None;
    }
    let stripped = CAST_REGEX.replace(raw, "").into_owned();
    if stripped == "NULL" {
        return None;
    }
    Some(unquote(&stripped))
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw[1..raw.len() - 1].replace("''", "'")
    } else {
        raw.to_string()
    }
}
