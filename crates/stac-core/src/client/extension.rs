//! Capability extensions.
//!
//! An extension is a named, independently enabled unit that may supply
//! capability implementations, contribute routes and advertise conformance
//! classes. The built-in extensions mirror the STAC API extensions the
//! service supports.

use std::sync::Arc;

use super::route::{Endpoint, HttpMethod, RouteSpec};
use super::traits::{BulkTransactionClient, CapabilitySet, TransactionClient};
use crate::search::{JsonFields, JsonQuery, JsonSort};

/// Conformance class of the transaction extension.
pub const TRANSACTION_CONFORMANCE: &str =
    "https://api.stacspec.org/v1.0.0/ogcapi-features/extensions/transaction";
/// Conformance class of the fields extension.
pub const FIELDS_CONFORMANCE: &str = "https://api.stacspec.org/v1.0.0/item-search#fields";
/// Conformance class of the query extension.
pub const QUERY_CONFORMANCE: &str = "https://api.stacspec.org/v1.0.0/item-search#query";
/// Conformance class of the sort extension.
pub const SORT_CONFORMANCE: &str = "https://api.stacspec.org/v1.0.0/item-search#sort";

/// A pluggable unit of catalog behaviour.
pub trait Extension: Send + Sync {
    /// Unique name; also the owner recorded for its routes and capabilities.
    fn name(&self) -> &str;

    /// Capability implementations this extension supplies. They take
    /// precedence over the base client's.
    fn provides(&self) -> CapabilitySet {
        CapabilitySet::default()
    }

    /// Routes this extension serves.
    fn routes(&self) -> Vec<RouteSpec> {
        Vec::new()
    }

    /// Conformance classes this extension adds.
    fn conformance_classes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Create, update and delete collections and items.
#[derive(Clone)]
pub struct TransactionExtension {
    client: Arc<dyn TransactionClient>,
}

impl TransactionExtension {
    /// Serve transactions with `client`.
    pub fn new(client: Arc<dyn TransactionClient>) -> Self {
        Self { client }
    }
}

impl Extension for TransactionExtension {
    fn name(&self) -> &str {
        "transaction"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_transaction(Arc::clone(&self.client))
    }

    fn routes(&self) -> Vec<RouteSpec> {
        use Endpoint::*;
        use HttpMethod::*;

        vec![
            RouteSpec::new(Post, "/collections", CreateCollection),
            RouteSpec::new(Put, "/collections", UpdateCollection),
            RouteSpec::new(Delete, "/collections/{collection_id}", DeleteCollection),
            RouteSpec::new(Post, "/collections/{collection_id}/items", CreateItem),
            RouteSpec::new(Put, "/collections/{collection_id}/items/{item_id}", UpdateItem),
            RouteSpec::new(Delete, "/collections/{collection_id}/items/{item_id}", DeleteItem),
        ]
    }

    fn conformance_classes(&self) -> Vec<String> {
        vec![TRANSACTION_CONFORMANCE.to_string()]
    }
}

/// Insert many items in one request.
#[derive(Clone)]
pub struct BulkTransactionExtension {
    client: Arc<dyn BulkTransactionClient>,
}

impl BulkTransactionExtension {
    /// Serve bulk inserts with `client`.
    pub fn new(client: Arc<dyn BulkTransactionClient>) -> Self {
        Self { client }
    }
}

impl Extension for BulkTransactionExtension {
    fn name(&self) -> &str {
        "bulk_transaction"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_bulk_transaction(Arc::clone(&self.client))
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(
            HttpMethod::Post,
            "/collections/{collection_id}/bulk_items",
            Endpoint::BulkItems,
        )]
    }
}

/// Include/exclude fields in search results.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsExtension;

impl FieldsExtension {
    /// Create the extension with the JSON projection.
    pub fn new() -> Self {
        Self
    }
}

impl Extension for FieldsExtension {
    fn name(&self) -> &str {
        "fields"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_fields(Arc::new(JsonFields))
    }

    fn conformance_classes(&self) -> Vec<String> {
        vec![FIELDS_CONFORMANCE.to_string()]
    }
}

/// Filter search results on item properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExtension;

impl QueryExtension {
    /// Create the extension with the JSON evaluator.
    pub fn new() -> Self {
        Self
    }
}

impl Extension for QueryExtension {
    fn name(&self) -> &str {
        "query"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_query(Arc::new(JsonQuery))
    }

    fn conformance_classes(&self) -> Vec<String> {
        vec![QUERY_CONFORMANCE.to_string()]
    }
}

/// Order search results.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortExtension;

impl SortExtension {
    /// Create the extension with the JSON comparator.
    pub fn new() -> Self {
        Self
    }
}

impl Extension for SortExtension {
    fn name(&self) -> &str {
        "sort"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_sort(Arc::new(JsonSort))
    }

    fn conformance_classes(&self) -> Vec<String> {
        vec![SORT_CONFORMANCE.to_string()]
    }
}
