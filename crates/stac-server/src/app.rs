//! Postgres-backed service wiring.

use std::sync::Arc;

use stac_core::client::{
    BulkTransactionExtension, Extension, FieldsExtension, QueryExtension, SortExtension,
    TransactionExtension,
};
use stac_core::migration::SchemaStore;
use stac_pg::{embedded_registry, PgCatalogClient, PgSchemaStore, Session};

use crate::config::Settings;
use crate::error::Error;
use crate::hooks::{MigrationCheck, MigrationSource};
use crate::{assemble, ServiceHandle};

/// Extensions served by default, in composition order.
pub fn default_extensions(catalog: &Arc<PgCatalogClient>) -> Vec<Arc<dyn Extension>> {
    vec![
        Arc::new(TransactionExtension::new(catalog.clone())),
        Arc::new(BulkTransactionExtension::new(catalog.clone())),
        Arc::new(FieldsExtension::new()),
        Arc::new(QueryExtension::new()),
        Arc::new(SortExtension::new()),
    ]
}

/// Schema check for `store`: scripts from the configured directory, or the
/// ones compiled into the binary.
pub fn migration_check(
    settings: &Settings,
    store: Arc<dyn SchemaStore>,
) -> Result<MigrationCheck, Error> {
    let source = match &settings.migrations_dir {
        Some(dir) => MigrationSource::Directory(dir.clone()),
        None => MigrationSource::Registry(embedded_registry()?),
    };
    Ok(MigrationCheck::from_source(
        store,
        source,
        settings.migration_target.clone(),
        settings.migration_expected.clone(),
    ))
}

/// Assemble the Postgres-backed service with every extension and the schema
/// check as a startup hook.
///
/// Pools connect lazily, so this performs no network I/O.
pub fn build(settings: Settings) -> Result<ServiceHandle, Error> {
    let session = Session::create_from_settings(&settings.pg);
    let store = Arc::new(PgSchemaStore::new(session.writer().clone()));
    let migration_check = migration_check(&settings, store)?;

    let catalog = Arc::new(PgCatalogClient::new(session));
    let extensions = default_extensions(&catalog);
    let base = catalog.into_base_client();

    Ok(assemble(settings, base, extensions)?.with_startup_hook(Arc::new(migration_check)))
}
