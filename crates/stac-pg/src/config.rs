//! Postgres connection settings.

use std::fmt;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Connection settings for the writer and (optional) reader hosts.
#[derive(Clone)]
pub struct PgSettings {
    /// Role name.
    pub user: String,
    /// Role password. Never logged.
    pub password: String,
    /// Host accepting writes; also used for migrations.
    pub host_writer: String,
    /// Host for reads. Falls back to the writer.
    pub host_reader: Option<String>,
    /// Port on both hosts.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Maximum pooled connections per host.
    pub max_connections: u32,
    /// Timeout when acquiring a pooled connection.
    pub acquire_timeout: Duration,
}

impl Default for PgSettings {
    fn default() -> Self {
        Self {
            user: "username".to_string(),
            password: "password".to_string(),
            host_writer: "localhost".to_string(),
            host_reader: None,
            port: 5432,
            dbname: "postgis".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PgSettings {
    /// Set the role credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set the writer host.
    pub fn with_writer(mut self, host: impl Into<String>) -> Self {
        self.host_writer = host.into();
        self
    }

    /// Set a separate reader host.
    pub fn with_reader(mut self, host: impl Into<String>) -> Self {
        self.host_reader = Some(host.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Set the pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Reader host, falling back to the writer.
    pub fn reader_host(&self) -> &str {
        self.host_reader.as_deref().unwrap_or(&self.host_writer)
    }

    fn options(&self, host: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
    }

    /// Connect options for the writer host.
    pub fn writer_options(&self) -> PgConnectOptions {
        self.options(&self.host_writer)
    }

    /// Connect options for the reader host.
    pub fn reader_options(&self) -> PgConnectOptions {
        self.options(self.reader_host())
    }

    /// Connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}",
            self.user, self.host_writer, self.port, self.dbname
        )
    }
}

impl fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSettings")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host_writer", &self.host_writer)
            .field("host_reader", &self.host_reader)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}
