//! Startup hooks run before the listener accepts connections.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use stac_core::migration::{MigrationRegistry, RevisionSelector, SchemaStore, SchemaVersionGate};
use tracing::info;

use crate::error::Error;

/// Work that must succeed before the service takes traffic.
#[async_trait]
pub trait StartupHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the hook. An error aborts startup.
    async fn on_startup(&self) -> Result<(), Error>;
}

/// Where the migration check finds its steps.
#[derive(Debug, Clone)]
pub enum MigrationSource {
    /// Scripts read from a directory when the hook runs.
    Directory(PathBuf),
    /// Steps already loaded, such as the scripts compiled into the binary.
    Registry(MigrationRegistry),
}

impl std::fmt::Display for MigrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationSource::Directory(path) => write!(f, "{}", path.display()),
            MigrationSource::Registry(registry) => match registry.location() {
                Some(path) => write!(f, "{}", path.display()),
                None => write!(f, "embedded ({} steps)", registry.len()),
            },
        }
    }
}

/// Upgrades the schema and requires the expected revision.
pub struct MigrationCheck {
    store: Arc<dyn SchemaStore>,
    source: MigrationSource,
    target: RevisionSelector,
    expected: RevisionSelector,
}

impl MigrationCheck {
    /// Check `store` against the scripts at `location`.
    pub fn new(
        store: Arc<dyn SchemaStore>,
        location: impl Into<PathBuf>,
        target: RevisionSelector,
        expected: RevisionSelector,
    ) -> Self {
        Self::from_source(store, MigrationSource::Directory(location.into()), target, expected)
    }

    /// Check `store` against an already loaded registry.
    pub fn with_registry(
        store: Arc<dyn SchemaStore>,
        registry: MigrationRegistry,
        target: RevisionSelector,
        expected: RevisionSelector,
    ) -> Self {
        Self::from_source(store, MigrationSource::Registry(registry), target, expected)
    }

    /// Check `store` against `source`.
    pub fn from_source(
        store: Arc<dyn SchemaStore>,
        source: MigrationSource,
        target: RevisionSelector,
        expected: RevisionSelector,
    ) -> Self {
        Self {
            store,
            source,
            target,
            expected,
        }
    }

    /// Where the steps come from.
    pub fn source(&self) -> &MigrationSource {
        &self.source
    }
}

#[async_trait]
impl StartupHook for MigrationCheck {
    fn name(&self) -> &str {
        "migration_check"
    }

    async fn on_startup(&self) -> Result<(), Error> {
        info!(
            source = %self.source,
            target = %self.target,
            expected = %self.expected,
            "checking database schema"
        );
        let gate = match &self.source {
            MigrationSource::Directory(path) => SchemaVersionGate::load(path)?,
            MigrationSource::Registry(registry) => SchemaVersionGate::new(registry.clone()),
        };
        gate.ensure_ready(self.store.as_ref(), &self.target, &self.expected)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for MigrationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationCheck")
            .field("source", &self.source.to_string())
            .field("target", &self.target)
            .field("expected", &self.expected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_core::migration::{MemorySchemaStore, MigrationStep, Revision};

    fn write_chain(dir: &std::path::Path) {
        std::fs::write(
            dir.join("0001_a.sql"),
            "-- revision: a1\n-- down_revision: none\nCREATE TABLE t ();\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("0002_b.sql"),
            "-- revision: b2\n-- down_revision: a1\nALTER TABLE t ADD c INT;\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_migration_check_upgrades_and_passes() {
        let dir = tempfile::tempdir().unwrap();
        write_chain(dir.path());
        let store = Arc::new(MemorySchemaStore::new());
        let pinned = RevisionSelector::Pinned(Revision::new("b2"));
        let hook = MigrationCheck::new(store.clone(), dir.path(), pinned.clone(), pinned);

        hook.on_startup().await.unwrap();
        assert_eq!(store.applied(), vec![Revision::new("a1"), Revision::new("b2")]);
    }

    #[tokio::test]
    async fn test_migration_check_mismatch_is_readiness_error() {
        let dir = tempfile::tempdir().unwrap();
        write_chain(dir.path());
        let store = Arc::new(MemorySchemaStore::new());
        let hook = MigrationCheck::new(
            store,
            dir.path(),
            RevisionSelector::Pinned(Revision::new("a1")),
            RevisionSelector::Pinned(Revision::new("b2")),
        );

        let err = hook.on_startup().await.unwrap_err();
        assert!(matches!(err, Error::Readiness(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_migration_check_unreachable_store() {
        let dir = tempfile::tempdir().unwrap();
        write_chain(dir.path());
        let hook = MigrationCheck::new(
            Arc::new(MemorySchemaStore::unreachable()),
            dir.path(),
            RevisionSelector::Head,
            RevisionSelector::Head,
        );

        let err = hook.on_startup().await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_migration_check_missing_directory_is_config_error() {
        let hook = MigrationCheck::new(
            Arc::new(MemorySchemaStore::new()),
            "/nonexistent/stac/migrations",
            RevisionSelector::Head,
            RevisionSelector::Head,
        );
        assert!(matches!(hook.on_startup().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_migration_check_from_registry_needs_no_files() {
        let registry = MigrationRegistry::from_steps(vec![
            MigrationStep::new("a1", None).with_sql("CREATE TABLE t ();"),
            MigrationStep::new("b2", Some(Revision::new("a1"))),
        ])
        .unwrap();
        let store = Arc::new(MemorySchemaStore::new());
        let hook = MigrationCheck::with_registry(
            store.clone(),
            registry,
            RevisionSelector::Head,
            RevisionSelector::Pinned(Revision::new("b2")),
        );
        assert_eq!(hook.source().to_string(), "embedded (2 steps)");

        hook.on_startup().await.unwrap();
        assert_eq!(store.applied(), vec![Revision::new("a1"), Revision::new("b2")]);
    }
}
