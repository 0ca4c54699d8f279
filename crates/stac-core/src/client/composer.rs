//! Composition of a base client with capability extensions.
//!
//! Wiring is decided once, at assembly time: every optional capability slot is
//! filled from the base client and then overwritten by each extension that
//! supplies it, in the order the extensions are given. The result is a fixed
//! record; requests never rediscover implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::capability::{Capability, Source};
use super::extension::Extension;
use super::route::{core_routes, RouteTable, CORE_OWNER};
use super::traits::{
    BaseClient, BulkTransactionClient, CapabilitySet, CoreClient, FieldsClient, QueryClient,
    SortClient, TransactionClient,
};
use crate::error::{ClientError, ClientResult};
use crate::types::{Collection, Context, Item, ItemCollection, Search};

/// An implementation together with where it came from.
pub struct Wired<T: ?Sized> {
    /// Where the implementation came from.
    pub source: Source,
    /// The implementation.
    pub client: Arc<T>,
}

impl<T: ?Sized> Clone for Wired<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

fn overlay<T: ?Sized>(slot: &mut Option<Wired<T>>, supplied: Option<Arc<T>>, source: &Source) {
    if let Some(client) = supplied {
        *slot = Some(Wired {
            source: source.clone(),
            client,
        });
    }
}

/// Base client with extension implementations wired in.
///
/// Stateless apart from the wiring; safe to share across concurrent requests.
#[derive(Clone)]
pub struct ComposedClient {
    core: Arc<dyn CoreClient>,
    transaction: Option<Wired<dyn TransactionClient>>,
    bulk_transaction: Option<Wired<dyn BulkTransactionClient>>,
    fields: Option<Wired<dyn FieldsClient>>,
    query: Option<Wired<dyn QueryClient>>,
    sort: Option<Wired<dyn SortClient>>,
}

impl ComposedClient {
    fn layer(&mut self, supplied: CapabilitySet, source: &Source) {
        overlay(&mut self.transaction, supplied.transaction, source);
        overlay(&mut self.bulk_transaction, supplied.bulk_transaction, source);
        overlay(&mut self.fields, supplied.fields, source);
        overlay(&mut self.query, supplied.query, source);
        overlay(&mut self.sort, supplied.sort, source);
    }

    fn source_of(&self, capability: Capability) -> Option<&Source> {
        match capability {
            Capability::Read => Some(&Source::Base),
            Capability::Transaction => self.transaction.as_ref().map(|w| &w.source),
            Capability::BulkTransaction => self.bulk_transaction.as_ref().map(|w| &w.source),
            Capability::Fields => self.fields.as_ref().map(|w| &w.source),
            Capability::Query => self.query.as_ref().map(|w| &w.source),
            Capability::Sort => self.sort.as_ref().map(|w| &w.source),
        }
    }

    /// Capability → implementation source, for every wired capability.
    pub fn wiring(&self) -> BTreeMap<Capability, Source> {
        Capability::ALL
            .iter()
            .filter_map(|&capability| {
                self.source_of(capability)
                    .map(|source| (capability, source.clone()))
            })
            .collect()
    }

    /// Whether `capability` is wired.
    pub fn supports(&self, capability: Capability) -> bool {
        self.source_of(capability).is_some()
    }

    /// Read capability.
    pub fn core(&self) -> &dyn CoreClient {
        self.core.as_ref()
    }

    /// Transaction capability.
    pub fn transactions(&self) -> ClientResult<&dyn TransactionClient> {
        wired(&self.transaction, Capability::Transaction)
    }

    /// Bulk transaction capability.
    pub fn bulk_transactions(&self) -> ClientResult<&dyn BulkTransactionClient> {
        wired(&self.bulk_transaction, Capability::BulkTransaction)
    }

    /// Field projection capability.
    pub fn fields(&self) -> ClientResult<&dyn FieldsClient> {
        wired(&self.fields, Capability::Fields)
    }

    /// Query capability.
    pub fn query(&self) -> ClientResult<&dyn QueryClient> {
        wired(&self.query, Capability::Query)
    }

    /// Sort capability.
    pub fn sort(&self) -> ClientResult<&dyn SortClient> {
        wired(&self.sort, Capability::Sort)
    }

    /// All collections.
    pub async fn all_collections(&self) -> ClientResult<Vec<Collection>> {
        self.core.all_collections().await
    }

    /// One collection.
    pub async fn get_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        self.core.get_collection(collection_id).await
    }

    /// One item.
    pub async fn get_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        self.core.get_item(collection_id, item_id).await
    }

    /// Items of one collection. Not found if the collection does not exist.
    pub async fn item_collection(
        &self,
        collection_id: &str,
        limit: Option<usize>,
        token: Option<String>,
    ) -> ClientResult<ItemCollection> {
        self.core.get_collection(collection_id).await?;
        let search = Search {
            limit,
            token,
            ..Search::in_collection(collection_id)
        };
        self.search(&search).await
    }

    /// Run a search: backend predicates, then query filter, sort, paging
    /// and field projection. Without query or sort, paging is left to the
    /// backend when it supports it.
    ///
    /// Capabilities the request needs are resolved before the backend is
    /// touched, so an unsupported request fails without side effects.
    pub async fn search(&self, search: &Search) -> ClientResult<ItemCollection> {
        search.validate()?;
        let limit = search.effective_limit()?;
        let offset = search.offset()?;

        let query = match &search.query {
            Some(expr) if !expr.is_empty() => Some((self.query()?, expr)),
            _ => None,
        };
        let sortby = match &search.sortby {
            Some(keys) if !keys.is_empty() => Some((self.sort()?, keys)),
            _ => None,
        };
        let fields = match &search.fields {
            Some(spec) if !spec.is_empty() => Some((self.fields()?, spec)),
            _ => None,
        };

        let native = match (&query, &sortby) {
            (None, None) => self.core.search_page(search, offset, limit).await?,
            _ => None,
        };

        let (mut page, matched) = match native {
            Some(native) => (native.items, native.matched),
            None => {
                let mut items = self.core.search(search).await?;

                if let Some((client, expr)) = query {
                    let mut kept = Vec::with_capacity(items.len());
                    for item in items {
                        if client.matches(&item, expr)? {
                            kept.push(item);
                        }
                    }
                    items = kept;
                }
                if let Some((client, keys)) = sortby {
                    client.sort(&mut items, keys)?;
                }

                let matched = items.len();
                let page: Vec<Item> = items.into_iter().skip(offset).take(limit).collect();
                (page, matched)
            }
        };
        let next_token = (offset + page.len() < matched).then(|| format!("next:{}", offset + limit));

        if let Some((client, spec)) = fields {
            page = page.into_iter().map(|item| client.project(item, spec)).collect();
        }

        let mut collection = ItemCollection::new(page);
        collection.context = Some(Context {
            returned: collection.features.len(),
            limit,
            matched,
        });
        collection.next_token = next_token;
        Ok(collection)
    }
}

fn wired<T: ?Sized>(slot: &Option<Wired<T>>, capability: Capability) -> ClientResult<&T> {
    slot.as_ref()
        .map(|w| w.client.as_ref())
        .ok_or(ClientError::Unsupported { capability })
}

impl std::fmt::Debug for ComposedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedClient")
            .field("wiring", &self.wiring())
            .finish()
    }
}

/// Wire `base` with `extensions`. Later extensions override earlier ones and
/// the base client.
pub fn compose(base: BaseClient, extensions: &[Arc<dyn Extension>]) -> ComposedClient {
    let mut composed = ComposedClient {
        core: base.core,
        transaction: None,
        bulk_transaction: None,
        fields: None,
        query: None,
        sort: None,
    };
    composed.layer(base.provided, &Source::Base);

    for extension in extensions {
        let source = Source::Extension(extension.name().to_string());
        let supplied = extension.provides();
        debug!(
            extension = extension.name(),
            capabilities = ?supplied.capabilities(),
            "wiring extension"
        );
        composed.layer(supplied, &source);
    }

    composed
}

/// Core routes followed by each extension's routes, later registrations
/// winning collisions.
pub fn compose_routes(extensions: &[Arc<dyn Extension>]) -> RouteTable {
    let mut table = RouteTable::new();
    table.register(CORE_OWNER, &core_routes());
    for extension in extensions {
        table.register(extension.name(), &extension.routes());
    }
    table
}
