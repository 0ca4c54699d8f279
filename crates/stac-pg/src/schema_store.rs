//! Schema bookkeeping in Postgres.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use stac_core::migration::{MigrationError, MigrationStep, Revision, SchemaStore, StepOutcome};

use crate::error::{migration_error, step_error};

/// Bookkeeping table holding the last applied revision.
pub const VERSION_TABLE: &str = "stac_schema_version";

/// Advisory lock key serialising step application across instances.
pub const MIGRATION_LOCK_KEY: i64 = 0x5354_4143_5343_4845;

/// Schema store on the writer pool.
///
/// Every step runs in its own transaction holding a transaction-scoped
/// advisory lock, so the lock is released on commit, rollback or a dropped
/// connection.
#[derive(Debug, Clone)]
pub struct PgSchemaStore {
    pool: PgPool,
}

impl PgSchemaStore {
    /// Create a store on `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn recorded_revision(
    conn: &mut sqlx::PgConnection,
) -> Result<Option<Revision>, sqlx::Error> {
    let revision: Option<String> =
        sqlx::query_scalar("SELECT revision FROM stac_schema_version LIMIT 1")
            .fetch_optional(conn)
            .await?;
    Ok(revision.map(Revision::new))
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    async fn current_revision(&self) -> Result<Option<Revision>, MigrationError> {
        let mut conn = self.pool.acquire().await.map_err(migration_error)?;

        let table: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(VERSION_TABLE)
            .fetch_one(&mut *conn)
            .await
            .map_err(migration_error)?;
        if table.is_none() {
            return Ok(None);
        }

        recorded_revision(&mut *conn).await.map_err(migration_error)
    }

    async fn apply_step(&self, step: &MigrationStep) -> Result<StepOutcome, MigrationError> {
        let mut tx = self.pool.begin().await.map_err(migration_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
        sqlx::query("CREATE TABLE IF NOT EXISTS stac_schema_version (revision TEXT NOT NULL)")
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;

        let recorded = recorded_revision(&mut *tx).await.map_err(migration_error)?;
        if recorded.as_ref() == Some(&step.revision) {
            return Ok(StepOutcome::AlreadyApplied);
        }
        if recorded != step.down_revision {
            return Ok(StepOutcome::Skipped { recorded });
        }

        debug!(revision = %step.revision, path = ?step.path, "running migration body");
        let conn: &mut sqlx::PgConnection = &mut tx;
        sqlx::Executor::execute(conn, sqlx::raw_sql(&step.sql))
            .await
            .map_err(|e| step_error(&step.revision, e))?;

        sqlx::query("DELETE FROM stac_schema_version")
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
        sqlx::query("INSERT INTO stac_schema_version (revision) VALUES ($1)")
            .bind(step.revision.as_str())
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;

        tx.commit().await.map_err(migration_error)?;
        Ok(StepOutcome::Applied)
    }
}
