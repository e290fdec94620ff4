//! MySQL dialect.
//!
//! The base grammar is already MySQL-flavored (`DESCRIBE`/`SHOW` catalogs,
//! native `REPLACE INTO`, `ADD INDEX`), so this dialect mostly adds what
//! only MySQL has: inline index clauses in `CREATE TABLE`, the
//! `ENGINE`/`CHARSET` trailer, the unsigned auto-increment idiom, and
//! ORDER/LIMIT support on UPDATE/DELETE.

use crate::DatabaseError;
use crate::connection::Executor;
use crate::query::CreateTable;

use super::Dialect;

#[derive(Debug, Clone)]
pub struct MySqlDialect {
    engine: String,
    charset: String,
}

impl MySqlDialect {
    #[must_use]
    pub fn new(engine: &str, charset: &str) -> Self {
        Self {
            engine: engine.to_string(),
            charset: charset.to_string(),
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_update_order_limit(&self) -> bool {
        true
    }

    fn column_serial(&self, name: &str, inline_primary: bool) -> String {
        let mut sql = format!("{name} INTEGER UNSIGNED NOT NULL AUTO_INCREMENT");
        if inline_primary {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }

    /// MySQL can declare indices inline, so table creation stays a single
    /// statement.
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
        for (name, index) in &query.indices {
            let unique = if index.unique { "UNIQUE " } else { "" };
            definitions.push(format!(
                "{unique}KEY {table}_{name} ({})",
                index.fields.join(", ")
            ));
        }

        let mut sql = format!("CREATE TABLE {table} ({})", definitions.join(", "));
        if !self.engine.is_empty() {
            sql.push_str(&format!(" ENGINE = '{}'", self.engine));
        }
        if !self.charset.is_empty() {
            sql.push_str(&format!(" CHARSET = '{}'", self.charset));
        }
        ex.exec(&sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Stmt;
    use crate::query::{Delete, Select, Update};
    use crate::schema::ColumnType;
    use pretty_assertions::assert_eq;

    fn dialect() -> MySqlDialect {
        MySqlDialect::new("MyISAM", "utf8")
    }

    #[test]
    fn serial_is_unsigned_auto_increment() {
        assert_eq!(
            dialect().column_serial("id", false),
            "id INTEGER UNSIGNED NOT NULL AUTO_INCREMENT"
        );
        assert_eq!(
            dialect().column_serial("id", true),
            "id INTEGER UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY"
        );
    }

    #[test]
    fn update_allows_order_and_limit() {
        let mut query = Update::new(&[("name", ":name")], "users");
        query.order = vec!["id ASC".to_string()];
        query.limit = 3;
        let sql = dialect().compile(Stmt::Update(&query), "").unwrap();
        assert_eq!(
            sql,
            "UPDATE users SET name = :name ORDER BY id ASC LIMIT 3"
        );
    }

    #[test]
    fn update_rejects_offset() {
        let mut query = Update::new(&[("name", ":name")], "users");
        query.limit = 3;
        query.offset = 1;
        assert!(dialect().compile(Stmt::Update(&query), "").is_err());
    }

    #[test]
    fn delete_allows_limit() {
        let mut query = Delete::new("users");
        query.limit = 1;
        let sql = dialect().compile(Stmt::Delete(&query), "").unwrap();
        assert_eq!(sql, "DELETE FROM users LIMIT 1");
    }

    #[test]
    fn offset_without_limit_uses_large_sentinel() {
        let mut query = Select::new(&["*"], Some("users"), false);
        query.offset = 5;
        let sql = dialect().compile(Stmt::Select(&query), "").unwrap();
        assert_eq!(
            sql,
            format!("SELECT * FROM users LIMIT {} OFFSET 5", u64::MAX)
        );
    }

    #[test]
    fn column_types_keep_mysql_spellings() {
        let d = dialect();
        assert_eq!(d.column_type(&ColumnType::MediumIntUnsigned), "MEDIUMINT UNSIGNED");
        assert_eq!(d.column_type(&ColumnType::Varchar(255)), "VARCHAR(255)");
        assert_eq!(d.column_type(&ColumnType::Bool), "BOOLEAN");
    }
}
