//! Capability interfaces and the base client.

use std::sync::Arc;

use async_trait::async_trait;

use super::capability::Capability;
use crate::error::ClientResult;
use crate::types::{Collection, FieldsSpec, Item, QueryExpr, Search, SortBy};

/// Reads collections and items.
///
/// `search` returns every item matching the backend-level predicates of the
/// request (`collections`, `ids`, `bbox`, `datetime`), in a stable order.
/// Query filtering, sorting, paging and projection are applied on top by the
/// composed client. Backends that can page natively override `search_page`,
/// which the composed client prefers when neither query nor sort applies.
#[async_trait]
pub trait CoreClient: Send + Sync {
    /// All collections.
    async fn all_collections(&self) -> ClientResult<Vec<Collection>>;

    /// One collection.
    async fn get_collection(&self, collection_id: &str) -> ClientResult<Collection>;

    /// One item.
    async fn get_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item>;

    /// Items matching the backend-level predicates of `search`.
    async fn search(&self, search: &Search) -> ClientResult<Vec<Item>>;

    /// The `limit` items after the first `offset` of what `search` would
    /// return, in the same order, with the total match count.
    ///
    /// `None` when the backend cannot page this request exactly; the caller
    /// then pages the output of `search`.
    async fn search_page(
        &self,
        _search: &Search,
        _offset: usize,
        _limit: usize,
    ) -> ClientResult<Option<ItemPage>> {
        Ok(None)
    }
}

/// One page of backend search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    /// Items on the page.
    pub items: Vec<Item>,
    /// Items matching the request across all pages.
    pub matched: usize,
}

/// Single-resource mutations.
#[async_trait]
pub trait TransactionClient: Send + Sync {
    /// Insert a collection. Conflict if it exists.
    async fn create_collection(&self, collection: Collection) -> ClientResult<Collection>;

    /// Replace a collection. Not found if it does not exist.
    async fn update_collection(&self, collection: Collection) -> ClientResult<Collection>;

    /// Delete a collection and its items, returning the collection.
    async fn delete_collection(&self, collection_id: &str) -> ClientResult<Collection>;

    /// Insert an item into a collection. Conflict if it exists.
    async fn create_item(&self, collection_id: &str, item: Item) -> ClientResult<Item>;

    /// Replace an item. Not found if it does not exist.
    async fn update_item(&self, collection_id: &str, item_id: &str, item: Item)
        -> ClientResult<Item>;

    /// Delete an item, returning it.
    async fn delete_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item>;
}

/// Bulk item insertion.
#[async_trait]
pub trait BulkTransactionClient: Send + Sync {
    /// Insert `items` into a collection, `chunk_size` items per statement
    /// batch. All items are committed together or not at all. Returns the
    /// number of inserted items.
    async fn bulk_item_insert(
        &self,
        collection_id: &str,
        items: Vec<Item>,
        chunk_size: Option<usize>,
    ) -> ClientResult<usize>;
}

/// Field projection.
pub trait FieldsClient: Send + Sync {
    /// Keep/drop the fields named in `fields`.
    fn project(&self, item: Item, fields: &FieldsSpec) -> Item;
}

/// Property filtering.
pub trait QueryClient: Send + Sync {
    /// Whether `item` satisfies every clause of `query`.
    fn matches(&self, item: &Item, query: &QueryExpr) -> ClientResult<bool>;
}

/// Result ordering.
pub trait SortClient: Send + Sync {
    /// Order `items` by `sortby`, first key most significant.
    fn sort(&self, items: &mut [Item], sortby: &[SortBy]) -> ClientResult<()>;
}

/// Optional capability implementations.
///
/// Used both for what a base client offers and for what an extension supplies.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    /// Single-resource mutations.
    pub transaction: Option<Arc<dyn TransactionClient>>,
    /// Bulk insertion.
    pub bulk_transaction: Option<Arc<dyn BulkTransactionClient>>,
    /// Field projection.
    pub fields: Option<Arc<dyn FieldsClient>>,
    /// Property filtering.
    pub query: Option<Arc<dyn QueryClient>>,
    /// Result ordering.
    pub sort: Option<Arc<dyn SortClient>>,
}

impl CapabilitySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply transactions.
    pub fn with_transaction(mut self, client: Arc<dyn TransactionClient>) -> Self {
        self.transaction = Some(client);
        self
    }

    /// Supply bulk transactions.
    pub fn with_bulk_transaction(mut self, client: Arc<dyn BulkTransactionClient>) -> Self {
        self.bulk_transaction = Some(client);
        self
    }

    /// Supply field projection.
    pub fn with_fields(mut self, client: Arc<dyn FieldsClient>) -> Self {
        self.fields = Some(client);
        self
    }

    /// Supply property filtering.
    pub fn with_query(mut self, client: Arc<dyn QueryClient>) -> Self {
        self.query = Some(client);
        self
    }

    /// Supply ordering.
    pub fn with_sort(mut self, client: Arc<dyn SortClient>) -> Self {
        self.sort = Some(client);
        self
    }

    /// Capabilities present in the set, in wiring order.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut present = Vec::new();
        if self.transaction.is_some() {
            present.push(Capability::Transaction);
        }
        if self.bulk_transaction.is_some() {
            present.push(Capability::BulkTransaction);
        }
        if self.fields.is_some() {
            present.push(Capability::Fields);
        }
        if self.query.is_some() {
            present.push(Capability::Query);
        }
        if self.sort.is_some() {
            present.push(Capability::Sort);
        }
        present
    }

    /// Whether the set supplies `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// A backend's data-access client: the required read capability plus
/// whatever optional capabilities the backend implements.
#[derive(Clone)]
pub struct BaseClient {
    /// Read capability.
    pub core: Arc<dyn CoreClient>,
    /// Optional capabilities.
    pub provided: CapabilitySet,
}

impl BaseClient {
    /// A base client offering reads only.
    pub fn new(core: Arc<dyn CoreClient>) -> Self {
        Self {
            core,
            provided: CapabilitySet::default(),
        }
    }

    /// Set the optional capabilities.
    pub fn with_capabilities(mut self, provided: CapabilitySet) -> Self {
        self.provided = provided;
        self
    }
}

impl std::fmt::Debug for BaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClient")
            .field("provided", &self.provided)
            .finish()
    }
}
