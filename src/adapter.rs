//! The adapter: one live connection, one dialect, one statement cache.
//!
//! Construction goes through [`Adapter::factory`], keyed by the
//! [`Backend`] enum. Configuration is validated before any connection
//! attempt, so missing options fail fast without touching the network.
//!
//! The adapter owns the prepared-statement handle map (handle to compiled
//! SQL), expands array-valued parameters into placeholder lists, applies
//! the soft-failure boolean contract to DDL helpers, and hands the
//! dialect's run procedures a live [`Executor`].
//!
//! Not safe for concurrent use: handle issuance and the handle map are
//! plain mutable state, matching the one-caller-per-connection model.

use std::collections::BTreeMap;

use regex::Regex;

use crate::config::Config;
use crate::connection::{ExecResult, Executor, QueryLog};
use crate::dialect::{Dialect, Stmt};
use crate::query::{
    AddField, AddIndex, AlterField, CreateTable, Delete, Direct, DropField, DropIndex, DropTable,
    FieldExists, IndexExists, Insert, RenameTable, Replace, ReplaceOutcome, Select, TableExists,
    TableInfoQuery, Truncate, Update,
};
use crate::schema::TableInfo;
use crate::{Backend, DatabaseError, Value};

struct PreparedHandle {
    sql: String,
    /// Once a statement has seen array parameters, every later execution
    /// re-expands from the original SQL.
    had_arrays: bool,
}

pub struct Adapter {
    backend: Backend,
    config: Config,
    /// Table prefix prepended to every logical table name.
    pub prefix: String,
    dialect: Box<dyn Dialect>,
    executor: Executor,
    handles: BTreeMap<u64, PreparedHandle>,
    next_handle: u64,
}

impl Adapter {
    /// Connects to the requested backend and returns a ready adapter.
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Config`] when a required option is missing
    /// * [`DatabaseError::Connect`] when the driver cannot connect; the
    ///   error names only the backend, the driver detail goes to the log
    pub fn factory(backend: Backend, config: Config) -> Result<Self, DatabaseError> {
        let (conn, dialect): (Box<dyn crate::Connection>, Box<dyn Dialect>) = match backend {
            #[cfg(feature = "mysql")]
            Backend::MySql => (
                crate::mysql::connect(&config)?,
                Box::new(crate::dialect::MySqlDialect::new(
                    config.engine_or_default(),
                    config.charset_or_default(),
                )),
            ),
            #[cfg(feature = "postgres")]
            Backend::PgSql => (
                crate::postgres::connect(&config)?,
                Box::new(crate::dialect::PgSqlDialect::new()),
            ),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => (
                crate::rusqlite::connect(&config)?,
                Box::new(crate::dialect::SqliteDialect::new()),
            ),
        };

        let mut adapter = Self {
            backend,
            prefix: config.prefix.clone(),
            dialect,
            executor: Executor::new(conn),
            handles: BTreeMap::new(),
            next_handle: 1,
            config,
        };
        adapter.set_names();
        adapter.apply_driver_options();
        Ok(adapter)
    }

    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Picks the connection charset. Backends that refuse are tolerated.
    fn set_names(&mut self) {
        let charset = self.executor.quote(self.config.charset_or_default());
        let sql = self.dialect.set_names_sql(&charset);
        if let Err(e) = self.executor.exec(&sql) {
            log::warn!("could not set connection charset: {e}");
        }
    }

    fn apply_driver_options(&mut self) {
        let options = self.config.driver_options.clone();
        for (name, value) in options {
            let sql = self.dialect.session_option_sql(&name, &value);
            if let Err(e) = self.executor.exec(&sql) {
                log::warn!("could not apply driver option {name}: {e}");
            }
        }
    }

    /// Registers compiled SQL and returns its statement handle.
    pub(crate) fn prepare(&mut self, sql: String) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(
            handle,
            PreparedHandle {
                sql,
                had_arrays: false,
            },
        );
        handle
    }

    /// Executes a prepared handle with the given named parameters,
    /// expanding any array-valued parameter into a placeholder list first.
    pub(crate) fn execute(
        &mut self,
        handle: u64,
        params: &[(&str, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        let (sql, had_arrays) = {
            let entry = self.handles.get(&handle).ok_or_else(|| {
                DatabaseError::Usage(format!("unknown statement handle {handle}"))
            })?;
            (entry.sql.clone(), entry.had_arrays)
        };

        let has_arrays = params.iter().any(|(_, value)| value.is_array());
        let (sql, expanded) = if had_arrays || has_arrays {
            expand_arrays(&sql, params)
        } else {
            (sql, to_owned_params(params))
        };

        if has_arrays && !had_arrays {
            if let Some(entry) = self.handles.get_mut(&handle) {
                entry.had_arrays = true;
            }
        }

        self.executor.query(&sql, &expanded)
    }

    pub(crate) fn compile_select(&self, query: &Select) -> Result<String, DatabaseError> {
        self.dialect.compile(Stmt::Select(query), &self.prefix)
    }

    pub(crate) fn compile_insert(&self, query: &Insert) -> Result<String, DatabaseError> {
        self.dialect.compile(Stmt::Insert(query), &self.prefix)
    }

    pub(crate) fn compile_update(&self, query: &Update) -> Result<String, DatabaseError> {
        self.dialect.compile(Stmt::Update(query), &self.prefix)
    }

    pub(crate) fn compile_delete(&self, query: &Delete) -> Result<String, DatabaseError> {
        self.dialect.compile(Stmt::Delete(query), &self.prefix)
    }

    /*
     * RUN DISPATCH
     *
     * DDL helpers follow the soft-failure contract: backend-reported
     * execution errors become `Ok(false)`. Existence probes, table info,
     * replace, and direct queries always propagate.
     */

    pub(crate) fn run_truncate(&mut self, query: &Truncate) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "TRUNCATE")?;
        soft(self.dialect.run_truncate(&mut self.executor, &table))
    }

    pub(crate) fn run_create_table(&mut self, query: &CreateTable) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "CREATE TABLE")?;
        if query.fields.is_empty() {
            return Err(DatabaseError::Compile(
                "a CREATE TABLE query must contain at least one field".to_string(),
            ));
        }
        soft(self.dialect.run_create_table(&mut self.executor, query, &table))
    }

    pub(crate) fn run_rename_table(&mut self, query: &RenameTable) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "RENAME TABLE")?;
        let new_name = query.physical_new_name(&self.prefix);
        if new_name.is_empty() {
            return Err(DatabaseError::Compile(
                "a RENAME TABLE query must have a new table name specified".to_string(),
            ));
        }
        soft(self
            .dialect
            .run_rename_table(&mut self.executor, &table, &new_name))
    }

    pub(crate) fn run_drop_table(&mut self, query: &DropTable) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "DROP TABLE")?;
        soft(self.dialect.run_drop_table(&mut self.executor, &table))
    }

    pub(crate) fn run_table_exists(&mut self, query: &TableExists) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "TABLE EXISTS")?;
        self.dialect.run_table_exists(&mut self.executor, &table)
    }

    pub(crate) fn run_add_field(&mut self, query: &AddField) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "ADD FIELD")?;
        let column = query.field.as_ref().ok_or_else(|| {
            DatabaseError::Compile("an ADD FIELD query must have a field specified".to_string())
        })?;
        soft(self.dialect.run_add_field(&mut self.executor, &table, column))
    }

    pub(crate) fn run_alter_field(&mut self, query: &AlterField) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "ALTER FIELD")?;
        let column = query.field.as_ref().ok_or_else(|| {
            DatabaseError::Compile("an ALTER FIELD query must have a field specified".to_string())
        })?;
        soft(self
            .dialect
            .run_alter_field(&mut self.executor, &table, column))
    }

    pub(crate) fn run_drop_field(&mut self, query: &DropField) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "DROP FIELD")?;
        if query.field.is_empty() {
            return Err(DatabaseError::Compile(
                "a DROP FIELD query must have a field specified".to_string(),
            ));
        }
        soft(self
            .dialect
            .run_drop_field(&mut self.executor, &table, &query.field))
    }

    pub(crate) fn run_field_exists(&mut self, query: &FieldExists) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "FIELD EXISTS")?;
        if query.field.is_empty() {
            return Err(DatabaseError::Compile(
                "a FIELD EXISTS query must have a field specified".to_string(),
            ));
        }
        self.dialect
            .run_field_exists(&mut self.executor, &table, &query.field)
    }

    pub(crate) fn run_add_index(&mut self, query: &AddIndex) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "ADD INDEX")?;
        if query.index.is_empty() {
            return Err(DatabaseError::Compile(
                "an ADD INDEX query must have an index specified".to_string(),
            ));
        }
        if query.fields.is_empty() {
            return Err(DatabaseError::Compile(
                "an ADD INDEX query must have at least one field specified".to_string(),
            ));
        }
        soft(self.dialect.run_add_index(
            &mut self.executor,
            &table,
            &query.index,
            &query.fields,
            query.unique,
        ))
    }

    pub(crate) fn run_drop_index(&mut self, query: &DropIndex) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "DROP INDEX")?;
        if query.index.is_empty() {
            return Err(DatabaseError::Compile(
                "a DROP INDEX query must have an index specified".to_string(),
            ));
        }
        soft(self
            .dialect
            .run_drop_index(&mut self.executor, &table, &query.index))
    }

    pub(crate) fn run_index_exists(&mut self, query: &IndexExists) -> Result<bool, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "INDEX EXISTS")?;
        if query.index.is_empty() {
            return Err(DatabaseError::Compile(
                "an INDEX EXISTS query must have an index specified".to_string(),
            ));
        }
        self.dialect
            .run_index_exists(&mut self.executor, &table, &query.index)
    }

    pub(crate) fn run_table_info(
        &mut self,
        query: &TableInfoQuery,
    ) -> Result<TableInfo, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "TABLE INFO")?;
        self.dialect.run_table_info(&mut self.executor, &table)
    }

    pub(crate) fn run_replace(
        &mut self,
        query: &Replace,
        params: &[(&str, Value)],
    ) -> Result<ReplaceOutcome, DatabaseError> {
        let table = require_table(query.physical_table(&self.prefix), "REPLACE")?;
        if query.values.is_empty() {
            return Err(DatabaseError::Compile(
                "a REPLACE query must contain at least one value".to_string(),
            ));
        }
        if query.keys.is_empty() {
            return Err(DatabaseError::Compile(
                "a REPLACE query must have at least one key specified".to_string(),
            ));
        }
        let params = to_owned_params(params);
        self.dialect
            .run_replace(&mut self.executor, query, &table, &params)
    }

    pub(crate) fn run_direct(
        &mut self,
        query: &Direct,
        params: &[(&str, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        let params = to_owned_params(params);
        self.executor.query(&query.sql, &params)
    }

    /*
     * QUERY FACTORIES
     */

    #[must_use]
    pub fn select(&self, fields: &[&str], table: Option<&str>) -> Select {
        Select::new(fields, table, false)
    }

    #[must_use]
    pub fn select_distinct(&self, fields: &[&str], table: Option<&str>) -> Select {
        Select::new(fields, table, true)
    }

    #[must_use]
    pub fn insert(&self, values: &[(&str, &str)], table: &str) -> Insert {
        Insert::new(values, table)
    }

    #[must_use]
    pub fn update(&self, values: &[(&str, &str)], table: &str) -> Update {
        Update::new(values, table)
    }

    #[must_use]
    pub fn delete(&self, table: &str) -> Delete {
        Delete::new(table)
    }

    #[must_use]
    pub fn replace(&self, values: &[(&str, &str)], table: &str, keys: &[(&str, &str)]) -> Replace {
        Replace::new(values, table, keys)
    }

    #[must_use]
    pub fn truncate(&self, table: &str) -> Truncate {
        Truncate::new(table)
    }

    #[must_use]
    pub fn create_table(&self, table: &str) -> CreateTable {
        CreateTable::new(table)
    }

    #[must_use]
    pub fn rename_table(&self, table: &str, new_name: &str) -> RenameTable {
        RenameTable::new(table, new_name)
    }

    #[must_use]
    pub fn drop_table(&self, table: &str) -> DropTable {
        DropTable::new(table)
    }

    #[must_use]
    pub fn table_exists(&self, table: &str) -> TableExists {
        TableExists::new(table)
    }

    #[must_use]
    pub fn add_field(&self, table: &str) -> AddField {
        AddField::new(table)
    }

    #[must_use]
    pub fn alter_field(&self, table: &str) -> AlterField {
        AlterField::new(table)
    }

    #[must_use]
    pub fn drop_field(&self, table: &str, field: &str) -> DropField {
        DropField::new(table, field)
    }

    #[must_use]
    pub fn field_exists(&self, table: &str, field: &str) -> FieldExists {
        FieldExists::new(table, field)
    }

    #[must_use]
    pub fn add_index(&self, table: &str, index: &str) -> AddIndex {
        AddIndex::new(table, index)
    }

    #[must_use]
    pub fn drop_index(&self, table: &str, index: &str) -> DropIndex {
        DropIndex::new(table, index)
    }

    #[must_use]
    pub fn index_exists(&self, table: &str, index: &str) -> IndexExists {
        IndexExists::new(table, index)
    }

    #[must_use]
    pub fn table_info(&self, table: &str) -> TableInfoQuery {
        TableInfoQuery::new(table)
    }

    #[must_use]
    pub fn direct(&self, sql: &str) -> Direct {
        Direct::new(sql)
    }

    /*
     * CONNECTION PASS-THROUGHS
     */

    /// Quotes a string into a dialect-safe literal.
    #[must_use]
    pub fn quote(&self, value: &str) -> String {
        self.executor.quote(value)
    }

    /// The row id generated by the last insert.
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if the backend has no id to report
    pub fn insert_id(&mut self) -> Result<u64, DatabaseError> {
        self.executor.last_insert_id()
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Usage`] if a transaction is already active
    pub fn start_transaction(&mut self) -> Result<(), DatabaseError> {
        self.executor.begin()
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Usage`] if no transaction is active
    pub fn commit_transaction(&mut self) -> Result<(), DatabaseError> {
        self.executor.commit()
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Usage`] if no transaction is active
    pub fn rollback_transaction(&mut self) -> Result<(), DatabaseError> {
        self.executor.rollback()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.executor.in_transaction()
    }

    /// `"<driver> <client>/<server>"`, with `?` where a version is
    /// unavailable.
    pub fn version(&mut self) -> String {
        let client = self
            .executor
            .client_version()
            .unwrap_or_else(|| "?".to_string());
        let server = self
            .executor
            .server_version()
            .unwrap_or_else(|| "?".to_string());
        format!("{} {client}/{server}", self.executor.driver_name())
    }

    /// Every statement executed on this adapter so far.
    #[must_use]
    pub fn debug_queries(&self) -> &[QueryLog] {
        self.executor.queries()
    }
}

fn require_table(table: String, what: &str) -> Result<String, DatabaseError> {
    if table.is_empty() {
        return Err(DatabaseError::Compile(format!(
            "a {what} query must have a table specified"
        )));
    }
    Ok(table)
}

/// The DDL soft-failure contract: backend-reported execution errors are
/// logged and reported as `false`; everything else propagates.
fn soft(result: Result<(), DatabaseError>) -> Result<bool, DatabaseError> {
    match result {
        Ok(()) => Ok(true),
        Err(DatabaseError::Execute(message)) => {
            log::warn!("schema statement failed: {message}");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn to_owned_params(params: &[(&str, Value)]) -> Vec<(String, Value)> {
    params
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// Converts each array-valued named parameter into a comma-separated
/// placeholder list and merges the scalars into the parameter set.
///
/// `IN :ids` with `:ids` bound to `[1, 2]` becomes `IN (:ids0, :ids1)`.
/// The match is word-boundary aware, so `:ids` never rewrites part of
/// `:ids_extra`.
fn expand_arrays(sql: &str, params: &[(&str, Value)]) -> (String, Vec<(String, Value)>) {
    let mut out_sql = sql.to_string();
    let mut scalars: Vec<(String, Value)> = Vec::new();
    let mut additions: Vec<(String, Value)> = Vec::new();

    for (name, value) in params {
        let Value::Array(items) = value else {
            scalars.push(((*name).to_string(), value.clone()));
            continue;
        };

        let mut placeholders = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let placeholder = format!("{name}{i}");
            placeholders.push(placeholder.clone());
            additions.push((placeholder, item.clone()));
        }
        let list = format!("({})", placeholders.join(", "));

        let pattern = Regex::new(&format!(r"{}\b", regex::escape(name))).expect("Invalid Regex");
        out_sql = pattern.replace_all(&out_sql, list.as_str()).into_owned();
    }

    scalars.extend(additions);
    (out_sql, scalars)
}
