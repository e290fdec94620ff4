//! The query object model.
//!
//! Every supported operation is a concrete query value constructed through
//! the [`Adapter`](crate::Adapter) factory methods, configured via public
//! fields and helper methods, then executed with `run(&mut adapter, params)`.
//!
//! Two execution strategies exist. Multi-capable queries ([`Select`],
//! [`Insert`], [`Update`], [`Delete`]) are compiled and prepared once, then
//! executed repeatedly with different parameter sets. Everything else is
//! run-once: it delegates to a dedicated dialect procedure (several of which
//! issue multi-statement sequences), and running it a second time with a
//! non-empty parameter set is a usage error. A second run with *empty*
//! parameters re-executes, so existence probes stay repeatable.
//!
//! Each instance tracks its progress through an explicit state machine:
//! `Unprepared -> Prepared(handle) -> Executed`.

use crate::adapter::Adapter;
use crate::connection::ExecResult;
use crate::schema::{Column, ColumnType, IndexDef, TableInfo};
use crate::{DatabaseError, Row, Value};

/// Execution progress of a single query instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryState {
    Unprepared,
    Prepared(u64),
    /// Multi-capable queries keep their statement handle for re-execution;
    /// run-once queries carry `None`.
    Executed(Option<u64>),
}

impl QueryState {
    /// Transition for run-once queries. Re-running with a fresh parameter
    /// set is rejected; re-running with no parameters is allowed.
    fn advance_run_once(&mut self, has_params: bool) -> Result<(), DatabaseError> {
        if matches!(self, Self::Executed(_)) && has_params {
            return Err(DatabaseError::Usage(
                "this query type does not support multiple executions with different parameter sets"
                    .to_string(),
            ));
        }
        *self = Self::Executed(None);
        Ok(())
    }
}

fn resolve_table(table: &str, use_prefix: bool, prefix: &str) -> String {
    if use_prefix {
        format!("{prefix}{table}")
    } else {
        table.to_string()
    }
}

/// How the result of a REPLACE is reported: part of the public contract,
/// deterministic on every backend whether REPLACE is native or emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// No row matched the keys; a new row was inserted.
    Inserted,
    /// A row matched the keys and was updated in place (or replaced, on
    /// backends with native delete-then-insert REPLACE).
    Updated,
}

impl ReplaceOutcome {
    #[must_use]
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One join on a [`Select`], keyed by an alias on the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
}

impl Join {
    #[must_use]
    pub fn physical_table(&self, use_prefix: bool, prefix: &str) -> String {
        resolve_table(&self.table, use_prefix, prefix)
    }
}

/// A SELECT query. Returns all result rows.
#[derive(Debug)]
pub struct Select {
    pub table: Option<String>,
    pub use_prefix: bool,
    /// Ordered alias -> expression pairs; a duplicate alias overwrites.
    /// Compilation emits the expressions.
    pub fields: Vec<(String, String)>,
    pub distinct: bool,
    /// Ordered alias -> join pairs; a duplicate alias overwrites.
    pub joins: Vec<(String, Join)>,
    /// Raw boolean SQL fragment with named placeholders; inserted verbatim,
    /// wrapped in parentheses.
    pub where_clause: String,
    pub group: Vec<String>,
    pub having: String,
    pub order: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub(crate) state: QueryState,
}

impl Select {
    pub(crate) fn new(fields: &[&str], table: Option<&str>, distinct: bool) -> Self {
        Self {
            table: table.map(ToString::to_string),
            use_prefix: true,
            fields: fields
                .iter()
                .map(|f| ((*f).to_string(), (*f).to_string()))
                .collect(),
            distinct,
            joins: vec![],
            where_clause: String::new(),
            group: vec![],
            having: String::new(),
            order: vec![],
            limit: 0,
            offset: 0,
            state: QueryState::Unprepared,
        }
    }

    /// Sets (or overwrites) the expression selected under `alias`.
    pub fn set_field(&mut self, alias: &str, expression: &str) -> &mut Self {
        if let Some(entry) = self.fields.iter_mut().find(|(a, _)| a == alias) {
            entry.1 = expression.to_string();
        } else {
            self.fields
                .push((alias.to_string(), expression.to_string()));
        }
        self
    }

    pub fn inner_join(&mut self, key: &str, table: &str, on: &str) -> &mut Self {
        self.add_join(key, JoinKind::Inner, table, on)
    }

    pub fn left_join(&mut self, key: &str, table: &str, on: &str) -> &mut Self {
        self.add_join(key, JoinKind::Left, table, on)
    }

    fn add_join(&mut self, key: &str, kind: JoinKind, table: &str, on: &str) -> &mut Self {
        let join = Join {
            kind,
            table: table.to_string(),
            on: on.to_string(),
        };
        if let Some(entry) = self.joins.iter_mut().find(|(k, _)| k == key) {
            entry.1 = join;
        } else {
            self.joins.push((key.to_string(), join));
        }
        self
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> Option<String> {
        self.table
            .as_ref()
            .map(|t| resolve_table(t, self.use_prefix, prefix))
    }

    /// Compiles and prepares on first use, then executes; repeatable with
    /// different parameter sets.
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the query has no fields
    /// * [`DatabaseError::Execute`] if the backend rejects the statement
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<Vec<Row>, DatabaseError> {
        let handle = match self.state {
            QueryState::Unprepared => {
                let sql = db.compile_select(&*self)?;
                db.prepare(sql)
            }
            QueryState::Prepared(handle) | QueryState::Executed(Some(handle)) => handle,
            QueryState::Executed(None) => {
                return Err(DatabaseError::Usage(
                    "statement handle missing on a prepared query".to_string(),
                ));
            }
        };
        self.state = QueryState::Prepared(handle);
        let result = db.execute(handle, params)?;
        self.state = QueryState::Executed(Some(handle));
        Ok(result.rows)
    }
}

/// An INSERT query. Returns the affected-row count.
#[derive(Debug)]
pub struct Insert {
    pub table: String,
    pub use_prefix: bool,
    /// Ordered column -> placeholder-expression pairs.
    pub values: Vec<(String, String)>,
    pub(crate) state: QueryState,
}

impl Insert {
    pub(crate) fn new(values: &[(&str, &str)], table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            values: to_owned_pairs(values),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or values are empty
    /// * [`DatabaseError::Execute`] if the backend rejects the statement
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<u64, DatabaseError> {
        let handle = match self.state {
            QueryState::Unprepared => {
                let sql = db.compile_insert(&*self)?;
                db.prepare(sql)
            }
            QueryState::Prepared(handle) | QueryState::Executed(Some(handle)) => handle,
            QueryState::Executed(None) => {
                return Err(DatabaseError::Usage(
                    "statement handle missing on a prepared query".to_string(),
                ));
            }
        };
        let result = db.execute(handle, params)?;
        self.state = QueryState::Executed(Some(handle));
        Ok(result.affected)
    }
}

/// An UPDATE query. Returns the affected-row count.
///
/// `order`/`limit` on UPDATE are a MySQL extension; other dialects reject
/// them at compile time.
#[derive(Debug)]
pub struct Update {
    pub table: String,
    pub use_prefix: bool,
    pub values: Vec<(String, String)>,
    pub where_clause: String,
    pub order: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub(crate) state: QueryState,
}

impl Update {
    pub(crate) fn new(values: &[(&str, &str)], table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            values: to_owned_pairs(values),
            where_clause: String::new(),
            order: vec![],
            limit: 0,
            offset: 0,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or values are empty, or if
    ///   order/limit are set on a dialect that does not support them here
    /// * [`DatabaseError::Execute`] if the backend rejects the statement
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<u64, DatabaseError> {
        let handle = match self.state {
            QueryState::Unprepared => {
                let sql = db.compile_update(&*self)?;
                db.prepare(sql)
            }
            QueryState::Prepared(handle) | QueryState::Executed(Some(handle)) => handle,
            QueryState::Executed(None) => {
                return Err(DatabaseError::Usage(
                    "statement handle missing on a prepared query".to_string(),
                ));
            }
        };
        let result = db.execute(handle, params)?;
        self.state = QueryState::Executed(Some(handle));
        Ok(result.affected)
    }
}

/// A DELETE query. Returns the affected-row count.
#[derive(Debug)]
pub struct Delete {
    pub table: String,
    pub use_prefix: bool,
    pub where_clause: String,
    pub order: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub(crate) state: QueryState,
}

impl Delete {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            where_clause: String::new(),
            order: vec![],
            limit: 0,
            offset: 0,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table is empty, or if order/limit
    ///   are set on a dialect that does not support them here
    /// * [`DatabaseError::Execute`] if the backend rejects the statement
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<u64, DatabaseError> {
        let handle = match self.state {
            QueryState::Unprepared => {
                let sql = db.compile_delete(&*self)?;
                db.prepare(sql)
            }
            QueryState::Prepared(handle) | QueryState::Executed(Some(handle)) => handle,
            QueryState::Executed(None) => {
                return Err(DatabaseError::Usage(
                    "statement handle missing on a prepared query".to_string(),
                ));
            }
        };
        let result = db.execute(handle, params)?;
        self.state = QueryState::Executed(Some(handle));
        Ok(result.affected)
    }
}

/// A REPLACE (upsert-by-key) query.
///
/// Native delete-then-insert REPLACE on MySQL; emulated as UPDATE followed
/// by `INSERT ... WHERE NOT EXISTS` on PostgreSQL and SQLite. Either way the
/// outcome reports whether a row was inserted or updated.
#[derive(Debug)]
pub struct Replace {
    pub table: String,
    pub use_prefix: bool,
    /// Ordered column -> placeholder-expression pairs to write.
    pub values: Vec<(String, String)>,
    /// Ordered key-column -> placeholder-expression pairs identifying the
    /// row.
    pub keys: Vec<(String, String)>,
    pub(crate) state: QueryState,
}

impl Replace {
    pub(crate) fn new(values: &[(&str, &str)], table: &str, keys: &[(&str, &str)]) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            values: to_owned_pairs(values),
            keys: to_owned_pairs(keys),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table, values, or keys are empty
    /// * [`DatabaseError::Execute`] if the backend rejects a statement
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<ReplaceOutcome, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_replace(self, params)
    }
}

/// A TRUNCATE query: deletes every row and resets any sequence counter.
#[derive(Debug)]
pub struct Truncate {
    pub table: String,
    pub use_prefix: bool,
    pub(crate) state: QueryState,
}

impl Truncate {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// Returns `false` instead of an error when the backend rejects the
    /// statement (the DDL soft-failure contract).
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_truncate(self)
    }
}

/// A CREATE TABLE query built from typed column definitions and index
/// declarations.
#[derive(Debug)]
pub struct CreateTable {
    pub table: String,
    pub use_prefix: bool,
    pub fields: Vec<Column>,
    /// Primary-key column names, populated by declaring an index named
    /// `"PRIMARY"`.
    pub primary: Vec<String>,
    /// Ordered `(logical index name, definition)` pairs.
    pub indices: Vec<(String, IndexDef)>,
    pub(crate) state: QueryState,
}

impl CreateTable {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            fields: vec![],
            primary: vec![],
            indices: vec![],
            state: QueryState::Unprepared,
        }
    }

    /// Appends a column definition.
    pub fn field(
        &mut self,
        name: &str,
        kind: ColumnType,
        default: Option<Value>,
        allow_null: bool,
        collation: Option<&str>,
    ) -> &mut Self {
        self.fields.push(Column {
            name: name.to_string(),
            kind,
            default,
            allow_null,
            collation: collation.map(ToString::to_string),
        });
        self
    }

    /// Declares an index. The name `"PRIMARY"` populates the primary-key
    /// column list instead of the index map.
    pub fn index(&mut self, name: &str, columns: &[&str], unique: bool) -> &mut Self {
        if name == "PRIMARY" {
            self.primary = columns.iter().map(ToString::to_string).collect();
        } else {
            self.indices.push((
                name.to_string(),
                IndexDef {
                    fields: columns.iter().map(ToString::to_string).collect(),
                    unique,
                },
            ));
        }
        self
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// Returns `false` instead of an error when the backend rejects a
    /// statement (the DDL soft-failure contract).
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or field list is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_create_table(self)
    }
}

/// An ALTER TABLE ... RENAME query.
#[derive(Debug)]
pub struct RenameTable {
    pub table: String,
    pub use_prefix: bool,
    pub new_name: String,
    pub(crate) state: QueryState,
}

impl RenameTable {
    pub(crate) fn new(table: &str, new_name: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            new_name: new_name.to_string(),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// The new name resolves through the same prefix as the old one.
    #[must_use]
    pub fn physical_new_name(&self, prefix: &str) -> String {
        resolve_table(&self.new_name, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or new name is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_rename_table(self)
    }
}

/// A DROP TABLE query.
#[derive(Debug)]
pub struct DropTable {
    pub table: String,
    pub use_prefix: bool,
    pub(crate) state: QueryState,
}

impl DropTable {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_drop_table(self)
    }
}

/// A probe for the existence of a table.
///
/// Re-runnable with empty parameters; without intervening DDL, repeated runs
/// return the same boolean.
#[derive(Debug)]
pub struct TableExists {
    pub table: String,
    pub use_prefix: bool,
    pub(crate) state: QueryState,
}

impl TableExists {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if the catalog query fails
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_table_exists(self)
    }
}

/// An ALTER TABLE ... ADD COLUMN query.
#[derive(Debug)]
pub struct AddField {
    pub table: String,
    pub use_prefix: bool,
    pub field: Option<Column>,
    pub(crate) state: QueryState,
}

impl AddField {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            field: None,
            state: QueryState::Unprepared,
        }
    }

    /// Sets the column definition to add.
    pub fn field(
        &mut self,
        name: &str,
        kind: ColumnType,
        default: Option<Value>,
        allow_null: bool,
        collation: Option<&str>,
    ) -> &mut Self {
        self.field = Some(Column {
            name: name.to_string(),
            kind,
            default,
            allow_null,
            collation: collation.map(ToString::to_string),
        });
        self
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or field is missing
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_add_field(self)
    }
}

/// A change to an existing column's definition.
///
/// Direct `MODIFY` on MySQL, a shadow-column copy procedure on PostgreSQL,
/// and a no-op on SQLite (type affinity makes it unnecessary).
#[derive(Debug)]
pub struct AlterField {
    pub table: String,
    pub use_prefix: bool,
    pub field: Option<Column>,
    pub(crate) state: QueryState,
}

impl AlterField {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            field: None,
            state: QueryState::Unprepared,
        }
    }

    /// Sets the new column definition.
    pub fn field(
        &mut self,
        name: &str,
        kind: ColumnType,
        default: Option<Value>,
        allow_null: bool,
        collation: Option<&str>,
    ) -> &mut Self {
        self.field = Some(Column {
            name: name.to_string(),
            kind,
            default,
            allow_null,
            collation: collation.map(ToString::to_string),
        });
        self
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or field is missing
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_alter_field(self)
    }
}

/// A column removal.
///
/// Direct `DROP COLUMN` on MySQL and PostgreSQL; on SQLite a shadow-table
/// sequence (copy out, recreate without the column, copy back, reattach
/// surviving indices). The SQLite sequence is not transactional: a
/// mid-sequence failure can leave the shadow table behind.
#[derive(Debug)]
pub struct DropField {
    pub table: String,
    pub use_prefix: bool,
    pub field: String,
    pub(crate) state: QueryState,
}

impl DropField {
    pub(crate) fn new(table: &str, field: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            field: field.to_string(),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or field is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_drop_field(self)
    }
}

/// A probe for the existence of a column.
#[derive(Debug)]
pub struct FieldExists {
    pub table: String,
    pub use_prefix: bool,
    pub field: String,
    pub(crate) state: QueryState,
}

impl FieldExists {
    pub(crate) fn new(table: &str, field: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            field: field.to_string(),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if the catalog query fails
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_field_exists(self)
    }
}

/// An index creation. The physical index name is
/// `<physical table>_<logical name>`.
#[derive(Debug)]
pub struct AddIndex {
    pub table: String,
    pub use_prefix: bool,
    pub index: String,
    pub fields: Vec<String>,
    pub unique: bool,
    pub(crate) state: QueryState,
}

impl AddIndex {
    pub(crate) fn new(table: &str, index: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            index: index.to_string(),
            fields: vec![],
            unique: false,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table, index name, or field list
    ///   is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_add_index(self)
    }
}

/// An index removal, addressed by logical name.
#[derive(Debug)]
pub struct DropIndex {
    pub table: String,
    pub use_prefix: bool,
    pub index: String,
    pub(crate) state: QueryState,
}

impl DropIndex {
    pub(crate) fn new(table: &str, index: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            index: index.to_string(),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Compile`] if the table or index name is empty
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_drop_index(self)
    }
}

/// A probe for the existence of an index, addressed by logical name.
#[derive(Debug)]
pub struct IndexExists {
    pub table: String,
    pub use_prefix: bool,
    pub index: String,
    pub(crate) state: QueryState,
}

impl IndexExists {
    pub(crate) fn new(table: &str, index: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            index: index.to_string(),
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if the catalog query fails
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<bool, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_index_exists(self)
    }
}

/// An introspection query returning the normalized [`TableInfo`] shape.
#[derive(Debug)]
pub struct TableInfoQuery {
    pub table: String,
    pub use_prefix: bool,
    pub(crate) state: QueryState,
}

impl TableInfoQuery {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            use_prefix: true,
            state: QueryState::Unprepared,
        }
    }

    #[must_use]
    pub fn physical_table(&self, prefix: &str) -> String {
        resolve_table(&self.table, self.use_prefix, prefix)
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if a catalog query fails
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<TableInfo, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_table_info(self)
    }
}

/// A plain SQL query that bypasses compilation entirely.
#[derive(Debug)]
pub struct Direct {
    pub sql: String,
    pub(crate) state: QueryState,
}

impl Direct {
    pub(crate) fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            state: QueryState::Unprepared,
        }
    }

    /// # Errors
    ///
    /// * [`DatabaseError::Execute`] if the backend rejects the statement
    /// * [`DatabaseError::Usage`] on a second run with non-empty parameters
    pub fn run(
        &mut self,
        db: &mut Adapter,
        params: &[(&str, Value)],
    ) -> Result<ExecResult, DatabaseError> {
        self.state.advance_run_once(!params.is_empty())?;
        db.run_direct(self, params)
    }
}

fn to_owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_once_guard_allows_empty_rerun() {
        let mut state = QueryState::Unprepared;
        state.advance_run_once(false).unwrap();
        assert_eq!(state, QueryState::Executed(None));
        state.advance_run_once(false).unwrap();
        assert!(state.advance_run_once(true).is_err());
    }

    #[test]
    fn run_once_guard_accepts_params_on_first_run() {
        let mut state = QueryState::Unprepared;
        state.advance_run_once(true).unwrap();
        assert!(state.advance_run_once(true).is_err());
    }

    #[test]
    fn select_field_overwrites_by_alias() {
        let mut select = Select::new(&["*"], Some("users"), false);
        select.set_field("n", "name");
        select.set_field("n", "nickname");
        assert_eq!(select.fields.len(), 2);
        assert_eq!(select.fields[1], ("n".to_string(), "nickname".to_string()));
    }

    #[test]
    fn join_replaced_by_key() {
        let mut select = Select::new(&["*"], Some("posts"), false);
        select.inner_join("u", "users", "users.id = posts.user_id");
        select.left_join("u", "users", "users.id = posts.author_id");
        assert_eq!(select.joins.len(), 1);
        assert_eq!(select.joins[0].1.kind, JoinKind::Left);
    }

    #[test]
    fn create_table_primary_index_is_special() {
        let mut create = CreateTable::new("t");
        create.index("PRIMARY", &["id"], false);
        create.index("name_idx", &["name"], true);
        assert_eq!(create.primary, vec!["id".to_string()]);
        assert_eq!(create.indices.len(), 1);
        assert!(create.indices[0].1.unique);
    }

    #[test]
    fn prefix_resolution_respects_use_prefix() {
        let mut truncate = Truncate::new("users");
        assert_eq!(truncate.physical_table("app_"), "app_users");
        truncate.use_prefix = false;
        assert_eq!(truncate.physical_table("app_"), "users");
    }
}
