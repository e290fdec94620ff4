//! Connection options.

pub const DEFAULT_CHARSET: &str = "utf8";
pub const DEFAULT_ENGINE: &str = "MyISAM";

/// Options consumed at adapter construction time.
///
/// Which options are required depends on the backend: MySQL and PostgreSQL
/// need `dbname`, SQLite needs `file`. Everything else is optional and falls
/// back to the driver's defaults. Validation happens before any connection
/// attempt, so a missing required option surfaces as
/// [`DatabaseError::Config`](crate::DatabaseError::Config) without touching
/// the network.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub file: Option<String>,
    /// MySQL only; replaces `host`/`port` when set, the two cannot be
    /// combined.
    pub unix_socket: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prepended to every logical table name to namespace multiple
    /// applications sharing one database.
    pub prefix: String,
    pub charset: Option<String>,
    /// MySQL storage engine for created tables.
    pub engine: Option<String>,
    /// Session options applied after connecting (`SET name = value`, or
    /// `PRAGMA name = value` on SQLite).
    pub driver_options: Vec<(String, String)>,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: &str) -> Self {
        self.dbname = Some(dbname.to_string());
        self
    }

    #[must_use]
    pub fn file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    #[must_use]
    pub fn unix_socket(mut self, unix_socket: &str) -> Self {
        self.unix_socket = Some(unix_socket.to_string());
        self
    }

    #[must_use]
    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_string());
        self
    }

    #[must_use]
    pub fn driver_option(mut self, name: &str, value: &str) -> Self {
        self.driver_options
            .push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn charset_or_default(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    #[must_use]
    pub fn engine_or_default(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::new();
        assert_eq!(config.charset_or_default(), "utf8");
        assert_eq!(config.engine_or_default(), "MyISAM");
        assert_eq!(config.prefix, "");
    }

    #[test]
    fn builder_sets_fields() {
        let config = Config::new()
            .host("db.example.com")
            .port(5433)
            .dbname("forum")
            .username("app")
            .prefix("app_")
            .driver_option("statement_timeout", "1000");
        assert_eq!(config.host.as_deref(), Some("db.example.com"));
        assert_eq!(config.port, Some(5433));
        assert_eq!(config.dbname.as_deref(), Some("forum"));
        assert_eq!(config.prefix, "app_");
        assert_eq!(config.driver_options.len(), 1);
    }
}
