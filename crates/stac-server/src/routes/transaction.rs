//! Transaction and bulk transaction endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use stac_core::links::{decorate_collection, decorate_item};
use stac_core::types::{Collection, Item, ItemCollection};
use tracing::info;

use super::BaseUrl;
use crate::error::AppError;
use crate::AppState;

/// Insert a collection.
pub async fn create_collection(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<Collection>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(collection) = payload?;
    let mut created = state.client.transactions()?.create_collection(collection).await?;
    decorate_collection(&mut created, base.as_str());
    Ok(Json(Value::Object(created)))
}

/// Replace a collection.
pub async fn update_collection(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<Collection>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(collection) = payload?;
    let mut updated = state.client.transactions()?.update_collection(collection).await?;
    decorate_collection(&mut updated, base.as_str());
    Ok(Json(Value::Object(updated)))
}

/// Delete a collection and its items.
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let mut deleted = state
        .client
        .transactions()?
        .delete_collection(&collection_id)
        .await?;
    decorate_collection(&mut deleted, base.as_str());
    Ok(Json(Value::Object(deleted)))
}

/// Insert an item, or every feature of a feature collection.
pub async fn create_item(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    base: BaseUrl,
    payload: Result<Json<Item>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = payload?;
    let transactions = state.client.transactions()?;

    if body.get("type").and_then(Value::as_str) == Some("FeatureCollection") {
        let features: Vec<Item> = serde_json::from_value(
            body.get("features").cloned().unwrap_or(Value::Array(Vec::new())),
        )?;
        let mut created = Vec::with_capacity(features.len());
        for feature in features {
            let mut item = transactions.create_item(&collection_id, feature).await?;
            decorate_item(&mut item, base.as_str());
            created.push(item);
        }
        return Ok(Json(serde_json::to_value(ItemCollection::new(created))?));
    }

    let mut item = transactions.create_item(&collection_id, body).await?;
    decorate_item(&mut item, base.as_str());
    Ok(Json(Value::Object(item)))
}

/// Replace an item.
pub async fn update_item(
    State(state): State<AppState>,
    Path((collection_id, item_id)): Path<(String, String)>,
    base: BaseUrl,
    payload: Result<Json<Item>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(item) = payload?;
    let mut updated = state
        .client
        .transactions()?
        .update_item(&collection_id, &item_id, item)
        .await?;
    decorate_item(&mut updated, base.as_str());
    Ok(Json(Value::Object(updated)))
}

/// Delete an item.
pub async fn delete_item(
    State(state): State<AppState>,
    Path((collection_id, item_id)): Path<(String, String)>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let mut deleted = state
        .client
        .transactions()?
        .delete_item(&collection_id, &item_id)
        .await?;
    decorate_item(&mut deleted, base.as_str());
    Ok(Json(Value::Object(deleted)))
}

/// Body of a bulk insert: items keyed by id.
#[derive(Debug, Deserialize)]
pub struct BulkItems {
    /// Items to insert.
    pub items: BTreeMap<String, Item>,
    /// Items per statement batch.
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

/// Insert many items in one transaction.
pub async fn bulk_items(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    payload: Result<Json<BulkItems>, JsonRejection>,
) -> Result<Json<String>, AppError> {
    let Json(bulk) = payload?;
    let items: Vec<Item> = bulk.items.into_values().collect();
    let inserted = state
        .client
        .bulk_transactions()?
        .bulk_item_insert(&collection_id, items, bulk.chunk_size)
        .await?;
    info!(collection = %collection_id, inserted, "bulk insert finished");
    Ok(Json(format!("Successfully added {} Items.", inserted)))
}
