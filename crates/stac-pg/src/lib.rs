//! STAC Postgres - Database session, schema store and catalog client.
//!
//! The schema is defined by the SQL scripts in this crate's `migrations/`
//! directory, compiled into the library as [`EMBEDDED_MIGRATIONS`].
//! [`PgSchemaStore`] applies them one step at a time under a
//! transaction-scoped advisory lock.

pub mod client;
pub mod config;
pub mod error;
pub mod schema_store;
pub mod session;

use std::path::Path;

use stac_core::migration::{MigrationError, MigrationRegistry, MigrationStep};

pub use client::{PgCatalogClient, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use config::PgSettings;
pub use schema_store::{PgSchemaStore, MIGRATION_LOCK_KEY, VERSION_TABLE};
pub use session::Session;

/// Revision this build expects the database to be at.
pub const PINNED_REVISION: &str = "407037cb1636";

/// Migration scripts compiled into the binary, as `(file name, text)`.
pub const EMBEDDED_MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_131aab4d9e49_create_catalog_tables.sql",
        include_str!("../migrations/0001_131aab4d9e49_create_catalog_tables.sql"),
    ),
    (
        "0002_821aa04ba9b2_index_item_datetime.sql",
        include_str!("../migrations/0002_821aa04ba9b2_index_item_datetime.sql"),
    ),
    (
        "0003_407037cb1636_index_item_properties.sql",
        include_str!("../migrations/0003_407037cb1636_index_item_properties.sql"),
    ),
];

/// Registry of the embedded migration scripts. Needs no files at runtime.
pub fn embedded_registry() -> Result<MigrationRegistry, MigrationError> {
    let steps = EMBEDDED_MIGRATIONS
        .iter()
        .map(|(name, text)| MigrationStep::parse(Path::new(name), text))
        .collect::<Result<Vec<_>, _>>()?;
    MigrationRegistry::from_steps(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_core::migration::{locate_head, Revision};

    #[test]
    fn test_embedded_migrations_end_at_pinned_revision() {
        let registry = embedded_registry().unwrap();
        assert_eq!(registry.head().revision, Revision::new(PINNED_REVISION));
        assert!(registry.location().is_none());
    }

    #[test]
    fn test_embedded_history_is_linear() {
        let registry = embedded_registry().unwrap();
        let revisions: Vec<&str> = registry
            .history()
            .iter()
            .map(|s| s.revision.as_str())
            .collect();
        assert_eq!(revisions, vec!["131aab4d9e49", "821aa04ba9b2", "407037cb1636"]);
    }

    #[test]
    fn test_embedded_scripts_match_migrations_directory() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        assert_eq!(locate_head(&dir).unwrap(), Revision::new(PINNED_REVISION));
        let on_disk = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .map(|e| e.path().extension().is_some_and(|ext| ext == "sql"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(on_disk, EMBEDDED_MIGRATIONS.len());
    }
}
