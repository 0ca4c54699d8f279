//! In-memory catalog backend.
//!
//! Useful for tests and for running the HTTP surface without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::client::{BaseClient, BulkTransactionClient, CapabilitySet, CoreClient, TransactionClient};
use crate::error::{ClientError, ClientResult};
use crate::links::strip_inferred;
use crate::search::matches_base;
use crate::types::{prepare_item, resource_id, Collection, Item, Search};

#[derive(Default)]
struct CatalogState {
    collections: BTreeMap<String, Collection>,
    items: BTreeMap<String, BTreeMap<String, Item>>,
}

/// Catalog held in process memory.
///
/// Items are returned ordered by collection, then id.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base client offering reads, transactions and bulk insertion.
    pub fn into_base_client(self: Arc<Self>) -> BaseClient {
        let provided = CapabilitySet::new()
            .with_transaction(self.clone())
            .with_bulk_transaction(self.clone());
        BaseClient::new(self).with_capabilities(provided)
    }

    /// Number of items stored across all collections.
    pub fn item_count(&self) -> usize {
        self.state.read().items.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl CoreClient for MemoryCatalog {
    async fn all_collections(&self) -> ClientResult<Vec<Collection>> {
        Ok(self.state.read().collections.values().cloned().collect())
    }

    async fn get_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        self.state
            .read()
            .collections
            .get(collection_id)
            .cloned()
            .ok_or_else(|| ClientError::collection_not_found(collection_id))
    }

    async fn get_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        self.state
            .read()
            .items
            .get(collection_id)
            .and_then(|items| items.get(item_id))
            .cloned()
            .ok_or_else(|| ClientError::item_not_found(collection_id, item_id))
    }

    async fn search(&self, search: &Search) -> ClientResult<Vec<Item>> {
        let state = self.state.read();
        let mut found = Vec::new();
        for item in state.items.values().flat_map(BTreeMap::values) {
            if matches_base(item, search)? {
                found.push(item.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl TransactionClient for MemoryCatalog {
    async fn create_collection(&self, mut collection: Collection) -> ClientResult<Collection> {
        let id = resource_id(&collection)?.to_string();
        strip_inferred(&mut collection);
        let mut state = self.state.write();
        if state.collections.contains_key(&id) {
            return Err(ClientError::Conflict(format!("collection {} already exists", id)));
        }
        state.collections.insert(id.clone(), collection.clone());
        state.items.entry(id).or_default();
        Ok(collection)
    }

    async fn update_collection(&self, mut collection: Collection) -> ClientResult<Collection> {
        let id = resource_id(&collection)?.to_string();
        strip_inferred(&mut collection);
        let mut state = self.state.write();
        match state.collections.get_mut(&id) {
            Some(stored) => {
                *stored = collection.clone();
                Ok(collection)
            }
            None => Err(ClientError::collection_not_found(&id)),
        }
    }

    async fn delete_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        let mut state = self.state.write();
        let removed = state
            .collections
            .remove(collection_id)
            .ok_or_else(|| ClientError::collection_not_found(collection_id))?;
        state.items.remove(collection_id);
        Ok(removed)
    }

    async fn create_item(&self, collection_id: &str, item: Item) -> ClientResult<Item> {
        let (id, item) = prepare_item(collection_id, item)?;
        let mut state = self.state.write();
        if !state.collections.contains_key(collection_id) {
            return Err(ClientError::collection_not_found(collection_id));
        }
        let items = state.items.entry(collection_id.to_string()).or_default();
        if items.contains_key(&id) {
            return Err(ClientError::Conflict(format!(
                "item {} already exists in collection {}",
                id, collection_id
            )));
        }
        items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        collection_id: &str,
        item_id: &str,
        item: Item,
    ) -> ClientResult<Item> {
        let (id, item) = prepare_item(collection_id, item)?;
        if id != item_id {
            return Err(ClientError::Validation(format!(
                "item id {} does not match path id {}",
                id, item_id
            )));
        }
        let mut state = self.state.write();
        match state
            .items
            .get_mut(collection_id)
            .and_then(|items| items.get_mut(item_id))
        {
            Some(stored) => {
                *stored = item.clone();
                Ok(item)
            }
            None => Err(ClientError::item_not_found(collection_id, item_id)),
        }
    }

    async fn delete_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        self.state
            .write()
            .items
            .get_mut(collection_id)
            .and_then(|items| items.remove(item_id))
            .ok_or_else(|| ClientError::item_not_found(collection_id, item_id))
    }
}

#[async_trait]
impl BulkTransactionClient for MemoryCatalog {
    async fn bulk_item_insert(
        &self,
        collection_id: &str,
        items: Vec<Item>,
        _chunk_size: Option<usize>,
    ) -> ClientResult<usize> {
        let prepared = items
            .into_iter()
            .map(|item| prepare_item(collection_id, item))
            .collect::<ClientResult<Vec<_>>>()?;

        let mut state = self.state.write();
        if !state.collections.contains_key(collection_id) {
            return Err(ClientError::collection_not_found(collection_id));
        }
        let stored = state.items.entry(collection_id.to_string()).or_default();
        let mut batch = BTreeMap::new();
        for (id, item) in prepared {
            if stored.contains_key(&id) || batch.insert(id.clone(), item).is_some() {
                return Err(ClientError::Conflict(format!(
                    "item {} already exists in collection {}",
                    id, collection_id
                )));
            }
        }
        let inserted = batch.len();
        stored.extend(batch);
        Ok(inserted)
    }
}
