//! STAC Core - Migration gate, client composition and catalog types.
//!
//! This crate holds everything the STAC API service decides independently of
//! a database driver or HTTP framework: the schema revision chain and the
//! startup gate that enforces it, the capability interfaces a backend
//! implements, and the composition of a base client with extensions.

pub mod client;
pub mod error;
pub mod links;
pub mod memory;
pub mod migration;
pub mod search;
pub mod types;

pub use client::{
    compose, compose_routes, BaseClient, BulkTransactionClient, BulkTransactionExtension,
    Capability, CapabilitySet, ComposedClient, CoreClient, Endpoint, Extension, FieldsClient,
    FieldsExtension, HttpMethod, QueryClient, QueryExtension, RouteSpec, RouteTable, SortClient,
    SortExtension, Source, TransactionClient, TransactionExtension,
};
pub use error::{ClientError, ClientResult};
pub use memory::MemoryCatalog;
pub use migration::{
    ensure_ready, ErrorClass, MemorySchemaStore, MigrationError, MigrationRegistry,
    MigrationStep, Readiness, Revision, RevisionSelector, SchemaStore, SchemaVersionGate,
    StepOutcome, UpgradeReport,
};
pub use types::{Collection, Context, FieldsSpec, Item, ItemCollection, Search, SortBy};
