//! Column definitions and normalized table metadata.
//!
//! [`ColumnType`] is the closed set of logical column types queries may
//! declare; each dialect translates it to the backend's type names.
//! [`TableInfo`] is the backend-independent shape every introspection path
//! normalizes into, no matter how different the underlying catalogs are
//! (`DESCRIBE`/`SHOW INDEXES`, `information_schema`/`pg_index`, or the
//! SQLite PRAGMAs).

use crate::Value;

/// Logical column types.
///
/// `Serial` ignores default, nullability, and collation: it always compiles
/// to the backend's auto-increment primary-key idiom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    Text,
    Bool,
    Varchar(u16),
    TinyInt,
    TinyIntUnsigned,
    SmallInt,
    SmallIntUnsigned,
    MediumInt,
    MediumIntUnsigned,
    Int,
    IntUnsigned,
    BigInt,
    BigIntUnsigned,
}

impl ColumnType {
    #[must_use]
    pub const fn is_serial(&self) -> bool {
        matches!(self, Self::Serial)
    }
}

/// A typed column definition, used by `CREATE TABLE` and the field DDL
/// queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub default: Option<Value>,
    pub allow_null: bool,
    pub collation: Option<String>,
}

impl Column {
    #[must_use]
    pub fn new(name: &str, kind: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            allow_null: true,
            collation: None,
        }
    }
}

/// An index declaration on a `CREATE TABLE` or `ADD INDEX` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub fields: Vec<String>,
    pub unique: bool,
}

/// One column as reported by the backend's catalog.
///
/// `type_name` is the backend's own spelling (`VARCHAR(40)`, `integer`,
/// ...), not a [`ColumnType`]; `default` is normalized to the bare value
/// (quotes stripped, PostgreSQL `::type` casts removed, `nextval(...)`
/// sequence defaults suppressed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub type_name: String,
    pub default: Option<String>,
    pub allow_null: bool,
}

/// One secondary index as reported by the backend's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub fields: Vec<String>,
    pub unique: bool,
}

/// Normalized table metadata, identical in shape across backends.
///
/// Index names stored in the backend are `<physical table>_<logical name>`;
/// the physical prefix is stripped before the name lands here. Indices
/// backing the primary key are never listed in `indices`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableInfo {
    /// Ordered `(column name, info)` pairs.
    pub columns: Vec<(String, ColumnInfo)>,
    /// Primary-key column names, in key order. Possibly empty.
    pub primary_key: Vec<String>,
    /// Column groups forming unique constraints, excluding the primary key.
    pub unique: Vec<Vec<String>>,
    /// Ordered `(logical index name, info)` pairs.
    pub indices: Vec<(String, IndexInfo)>,
}

impl TableInfo {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.0 == name).map(|c| &c.1)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indices.iter().find(|i| i.0 == name).map(|i| &i.1)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.0.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_defaults_to_nullable() {
        let column = Column::new("age", ColumnType::Int);
        assert!(column.allow_null);
        assert!(column.default.is_none());
        assert!(column.collation.is_none());
    }

    #[test]
    fn table_info_lookups() {
        let mut info = TableInfo::default();
        info.columns.push((
            "id".to_string(),
            ColumnInfo {
                type_name: "INTEGER".to_string(),
                default: None,
                allow_null: false,
            },
        ));
        info.indices.push((
            "number_idx".to_string(),
            IndexInfo {
                fields: vec!["number".to_string()],
                unique: true,
            },
        ));

        assert_eq!(info.column("id").map(|c| c.allow_null), Some(false));
        assert!(info.column("missing").is_none());
        assert_eq!(info.index("number_idx").map(|i| i.unique), Some(true));
        assert_eq!(info.column_names(), vec!["id"]);
    }
}
