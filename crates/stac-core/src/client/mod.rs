//! Data-access client capabilities and their composition.

pub mod capability;
pub mod composer;
pub mod extension;
pub mod route;
pub mod traits;

pub use capability::{Capability, Source};
pub use composer::{compose, compose_routes, ComposedClient, Wired};
pub use extension::{
    BulkTransactionExtension, Extension, FieldsExtension, QueryExtension, SortExtension,
    TransactionExtension, FIELDS_CONFORMANCE, QUERY_CONFORMANCE, SORT_CONFORMANCE,
    TRANSACTION_CONFORMANCE,
};
pub use route::{core_routes, Endpoint, HttpMethod, RouteEntry, RouteSpec, RouteTable, CORE_OWNER};
pub use traits::{
    BaseClient, BulkTransactionClient, CapabilitySet, CoreClient, FieldsClient, ItemPage,
    QueryClient, SortClient, TransactionClient,
};
