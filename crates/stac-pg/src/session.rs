//! Pooled database session.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::config::PgSettings;

/// Writer and reader pools.
///
/// Pools connect lazily, so creating a session performs no I/O. Each unit of
/// work takes its own connection or transaction from the pool; a transaction
/// dropped without commit rolls back and its connection returns to the pool.
#[derive(Debug, Clone)]
pub struct Session {
    writer: PgPool,
    reader: PgPool,
}

fn lazy_pool(settings: &PgSettings, options: sqlx::postgres::PgConnectOptions) -> PgPool {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_lazy_with(options)
}

impl Session {
    /// Create pools for the hosts in `settings`.
    pub fn create_from_settings(settings: &PgSettings) -> Self {
        debug!(
            url = %settings.redacted_url(),
            reader = settings.reader_host(),
            max_connections = settings.max_connections,
            "creating database session"
        );
        let writer = lazy_pool(settings, settings.writer_options());
        let reader = match &settings.host_reader {
            Some(_) => lazy_pool(settings, settings.reader_options()),
            None => writer.clone(),
        };
        Self { writer, reader }
    }

    /// Session over existing pools.
    pub fn from_pools(writer: PgPool, reader: PgPool) -> Self {
        Self { writer, reader }
    }

    /// Pool for writes and migrations.
    pub fn writer(&self) -> &PgPool {
        &self.writer
    }

    /// Pool for reads.
    pub fn reader(&self) -> &PgPool {
        &self.reader
    }

    /// Begin a transaction on the writer.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.writer.begin().await
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }
}
