//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use stac_core::migration::{Revision, RevisionSelector};
use stac_pg::{PgSettings, PINNED_REVISION};

use crate::error::Error;

/// Default listen host.
pub const DEFAULT_APP_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_APP_PORT: u16 = 8080;

/// Default catalog id on the landing page.
pub const DEFAULT_CATALOG_ID: &str = "stac-api";

/// Service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host to bind.
    pub app_host: String,
    /// Port to bind.
    pub app_port: u16,
    /// Hot reload requested. Accepted and reported; this runtime does not reload.
    pub reload: bool,
    /// Landing page id.
    pub catalog_id: String,
    /// Landing page title.
    pub title: String,
    /// Landing page description.
    pub description: String,
    /// Database connection.
    pub pg: PgSettings,
    /// Directory of migration scripts. `None` uses the scripts compiled into
    /// the binary.
    pub migrations_dir: Option<PathBuf>,
    /// Revision the startup gate upgrades to.
    pub migration_target: RevisionSelector,
    /// Revision the database must be at once the upgrade finishes.
    pub migration_expected: RevisionSelector,
}

impl Default for Settings {
    fn default() -> Self {
        let pinned = RevisionSelector::Pinned(Revision::new(PINNED_REVISION));
        Self {
            app_host: DEFAULT_APP_HOST.to_string(),
            app_port: DEFAULT_APP_PORT,
            reload: false,
            catalog_id: DEFAULT_CATALOG_ID.to_string(),
            title: "stac-pgapi".to_string(),
            description: "STAC API backed by PostgreSQL".to_string(),
            pg: PgSettings::default(),
            migrations_dir: None,
            migration_target: pinned.clone(),
            migration_expected: pinned,
        }
    }
}

impl Settings {
    /// Set the listen address.
    pub fn with_listen(mut self, host: impl Into<String>, port: u16) -> Self {
        self.app_host = host.into();
        self.app_port = port;
        self
    }

    /// Set the landing page identity.
    pub fn with_catalog(
        mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.catalog_id = id.into();
        self.title = title.into();
        self.description = description.into();
        self
    }

    /// Set the database connection.
    pub fn with_pg(mut self, pg: PgSettings) -> Self {
        self.pg = pg;
        self
    }

    /// Set the migration script directory.
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(dir.into());
        self
    }

    /// Set the upgrade target and the expected revision.
    pub fn with_revisions(mut self, target: RevisionSelector, expected: RevisionSelector) -> Self {
        self.migration_target = target;
        self.migration_expected = expected;
        self
    }

    /// `host:port` to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }

    /// Where the startup check reads migration scripts from, for logs.
    pub fn migrations_source(&self) -> String {
        match &self.migrations_dir {
            Some(dir) => dir.display().to_string(),
            None => "embedded".to_string(),
        }
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), Error> {
        if self.app_host.trim().is_empty() {
            return Err(Error::Config("app host must not be empty".to_string()));
        }
        if self.pg.max_connections == 0 {
            return Err(Error::Config(
                "pool max connections must be at least 1".to_string(),
            ));
        }
        if self.catalog_id.trim().is_empty() {
            return Err(Error::Config("catalog id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Resolve a migrations directory override. Relative paths are taken from the
/// directory of the running executable.
pub fn resolve_migrations_dir(path: &Path, exe_dir: Option<&Path>) -> PathBuf {
    match exe_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Command-line arguments for the service. Every flag can also be set from
/// the environment.
#[derive(Parser, Debug)]
#[command(name = "stac-server")]
#[command(version, about = "STAC API server backed by PostgreSQL", long_about = None)]
pub struct Args {
    /// Database role.
    #[arg(long, env = "POSTGRES_USER", default_value = "username")]
    pub postgres_user: String,

    /// Database password.
    #[arg(long, env = "POSTGRES_PASS", default_value = "password", hide_env_values = true)]
    pub postgres_pass: String,

    /// Host accepting writes and migrations.
    #[arg(long, env = "POSTGRES_HOST_WRITER", default_value = "localhost")]
    pub postgres_host_writer: String,

    /// Host for reads. Defaults to the writer.
    #[arg(long, env = "POSTGRES_HOST_READER")]
    pub postgres_host_reader: Option<String>,

    /// Database port.
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    /// Database name.
    #[arg(long, env = "POSTGRES_DBNAME", default_value = "postgis")]
    pub postgres_dbname: String,

    /// Host to bind.
    #[arg(long, env = "APP_HOST", default_value = DEFAULT_APP_HOST)]
    pub app_host: String,

    /// Port to bind.
    #[arg(long, env = "APP_PORT", default_value_t = DEFAULT_APP_PORT)]
    pub app_port: u16,

    /// Request hot reload (not supported by this runtime).
    #[arg(long, env = "RELOAD", default_value_t = false)]
    pub reload: bool,

    /// Directory of migration scripts. Relative paths are taken from the
    /// executable's directory; unset uses the scripts built into the binary.
    #[arg(long, env = "STAC_MIGRATIONS_DIR")]
    pub migrations_dir: Option<PathBuf>,

    /// Revision to upgrade to (`head` or a revision id).
    #[arg(long, env = "STAC_MIGRATION_TARGET", default_value = PINNED_REVISION)]
    pub migration_target: RevisionSelector,

    /// Revision the database must be at (`head` or a revision id).
    #[arg(long, env = "STAC_MIGRATION_EXPECTED", default_value = PINNED_REVISION)]
    pub migration_expected: RevisionSelector,

    /// Maximum pooled connections per host.
    #[arg(long, env = "STAC_POOL_MAX_CONNECTIONS", default_value_t = 10)]
    pub pool_max_connections: u32,

    /// Timeout (ms) when acquiring a pooled connection.
    #[arg(long, env = "STAC_POOL_ACQUIRE_TIMEOUT_MS", default_value_t = 30_000)]
    pub pool_acquire_timeout_ms: u64,

    /// Landing page title.
    #[arg(long, env = "STAC_TITLE", default_value = "stac-pgapi")]
    pub title: String,

    /// Landing page description.
    #[arg(long, env = "STAC_DESCRIPTION", default_value = "STAC API backed by PostgreSQL")]
    pub description: String,

    /// Landing page id.
    #[arg(long, env = "STAC_CATALOG_ID", default_value = DEFAULT_CATALOG_ID)]
    pub catalog_id: String,
}

impl Args {
    /// Convert arguments into validated settings.
    pub fn into_settings(self) -> Result<Settings, Error> {
        let mut pg = PgSettings::default()
            .with_credentials(self.postgres_user, self.postgres_pass)
            .with_writer(self.postgres_host_writer)
            .with_port(self.postgres_port)
            .with_dbname(self.postgres_dbname)
            .with_max_connections(self.pool_max_connections)
            .with_acquire_timeout(Duration::from_millis(self.pool_acquire_timeout_ms));
        if let Some(reader) = self.postgres_host_reader {
            pg = pg.with_reader(reader);
        }

        let exe_dir = executable_dir();
        let migrations_dir = self
            .migrations_dir
            .map(|dir| resolve_migrations_dir(&dir, exe_dir.as_deref()));

        let settings = Settings {
            app_host: self.app_host,
            app_port: self.app_port,
            reload: self.reload,
            catalog_id: self.catalog_id,
            title: self.title,
            description: self.description,
            pg,
            migrations_dir,
            migration_target: self.migration_target,
            migration_expected: self.migration_expected,
        };
        settings.validate()?;
        Ok(settings)
    }
}
