//! Catalog client over JSONB tables.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use stac_core::client::{
    BaseClient, BulkTransactionClient, CapabilitySet, CoreClient, ItemPage, TransactionClient,
};
use stac_core::error::{ClientError, ClientResult};
use stac_core::links::strip_inferred;
use stac_core::search::{item_time_range, matches_base, DatetimeInterval};
use stac_core::types::{prepare_item, resource_id, Collection, Item, Search};

use crate::error::{client_error, is_foreign_key_violation, is_unique_violation};
use crate::session::Session;

/// Items per `INSERT` statement when the caller gives no chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Bind parameters per inserted item row.
const BINDS_PER_ROW: usize = 4;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize / BINDS_PER_ROW;

/// Reads, transactions and bulk insertion against the `collections` and
/// `items` tables.
#[derive(Debug, Clone)]
pub struct PgCatalogClient {
    session: Session,
}

impl PgCatalogClient {
    /// Create a client on `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session the client uses.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Base client offering reads only; transactions come from extensions.
    pub fn into_base_client(self: Arc<Self>) -> BaseClient {
        BaseClient::new(self)
    }

    /// Base client offering reads, transactions and bulk insertion.
    pub fn into_full_client(self: Arc<Self>) -> BaseClient {
        let provided = CapabilitySet::new()
            .with_transaction(self.clone())
            .with_bulk_transaction(self.clone());
        BaseClient::new(self).with_capabilities(provided)
    }
}

fn item_datetime(item: &Item) -> Option<DateTime<Utc>> {
    item_time_range(item).map(|(start, _)| start)
}

const ORDER_BY: &str = " ORDER BY datetime DESC NULLS LAST, collection_id, id";

fn datetime_interval(search: &Search) -> ClientResult<Option<DatetimeInterval>> {
    search.datetime.as_deref().map(DatetimeInterval::parse).transpose()
}

/// Whether the SQL predicates alone select exactly the items `matches_base`
/// keeps. The `datetime` column holds the start of an item's range, so only
/// an upper bound translates.
fn pages_in_sql(search: &Search, interval: Option<&DatetimeInterval>) -> bool {
    search.bbox.is_none() && interval.map_or(true, |interval| interval.start.is_none())
}

/// `select` restricted by the predicates that map onto columns.
fn filtered(
    select: &str,
    search: &Search,
    interval: Option<&DatetimeInterval>,
) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(select);
    query.push(" WHERE TRUE");
    if let Some(collections) = &search.collections {
        query.push(" AND collection_id = ANY(");
        query.push_bind(collections.clone());
        query.push(")");
    }
    if let Some(ids) = &search.ids {
        query.push(" AND id = ANY(");
        query.push_bind(ids.clone());
        query.push(")");
    }
    if let Some(interval) = interval {
        query.push(" AND datetime IS NOT NULL");
        if let Some(end) = interval.end {
            query.push(" AND datetime <= ");
            query.push_bind(end);
        }
    }
    query
}

/// Rows per `INSERT` are capped so the bind parameters of one statement stay
/// within the protocol limit of 65535.
fn effective_chunk_size(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_CHUNK_SIZE)
        .clamp(1, MAX_CHUNK_SIZE)
}

fn insert_error(err: sqlx::Error, collection_id: &str, item_id: &str) -> ClientError {
    if is_unique_violation(&err) {
        ClientError::Conflict(format!(
            "item {} already exists in collection {}",
            item_id, collection_id
        ))
    } else if is_foreign_key_violation(&err) {
        ClientError::collection_not_found(collection_id)
    } else {
        client_error(err)
    }
}

#[async_trait]
impl CoreClient for PgCatalogClient {
    async fn all_collections(&self) -> ClientResult<Vec<Collection>> {
        let rows: Vec<Json<Collection>> =
            sqlx::query_scalar("SELECT content FROM collections ORDER BY id")
                .fetch_all(self.session.reader())
                .await
                .map_err(client_error)?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn get_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        let row: Option<Json<Collection>> =
            sqlx::query_scalar("SELECT content FROM collections WHERE id = $1")
                .bind(collection_id)
                .fetch_optional(self.session.reader())
                .await
                .map_err(client_error)?;
        row.map(|Json(c)| c)
            .ok_or_else(|| ClientError::collection_not_found(collection_id))
    }

    async fn get_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        let row: Option<Json<Item>> = sqlx::query_scalar(
            "SELECT content FROM items WHERE collection_id = $1 AND id = $2",
        )
        .bind(collection_id)
        .bind(item_id)
        .fetch_optional(self.session.reader())
        .await
        .map_err(client_error)?;
        row.map(|Json(i)| i)
            .ok_or_else(|| ClientError::item_not_found(collection_id, item_id))
    }

    async fn search(&self, search: &Search) -> ClientResult<Vec<Item>> {
        let interval = datetime_interval(search)?;
        let mut query = filtered("SELECT content FROM items", search, interval.as_ref());
        query.push(ORDER_BY);

        let rows: Vec<Json<Item>> = query
            .build_query_scalar()
            .fetch_all(self.session.reader())
            .await
            .map_err(client_error)?;

        // bbox and the datetime start bound are checked on the decoded items.
        let mut found = Vec::with_capacity(rows.len());
        for Json(item) in rows {
            if matches_base(&item, search)? {
                found.push(item);
            }
        }
        debug!(matched = found.len(), "search candidates");
        Ok(found)
    }

    async fn search_page(
        &self,
        search: &Search,
        offset: usize,
        limit: usize,
    ) -> ClientResult<Option<ItemPage>> {
        let interval = datetime_interval(search)?;
        if !pages_in_sql(search, interval.as_ref()) {
            return Ok(None);
        }

        let matched = filtered("SELECT COUNT(*) FROM items", search, interval.as_ref())
            .build_query_scalar::<i64>()
            .fetch_one(self.session.reader())
            .await
            .map_err(client_error)?;

        let mut query = filtered("SELECT content FROM items", search, interval.as_ref());
        query.push(ORDER_BY);
        query.push(" LIMIT ");
        query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let rows: Vec<Json<Item>> = query
            .build_query_scalar()
            .fetch_all(self.session.reader())
            .await
            .map_err(client_error)?;

        debug!(matched, offset, returned = rows.len(), "search page");
        Ok(Some(ItemPage {
            items: rows.into_iter().map(|Json(item)| item).collect(),
            matched: usize::try_from(matched).unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl TransactionClient for PgCatalogClient {
    async fn create_collection(&self, mut collection: Collection) -> ClientResult<Collection> {
        let id = resource_id(&collection)?.to_string();
        strip_inferred(&mut collection);
        sqlx::query("INSERT INTO collections (id, content) VALUES ($1, $2)")
            .bind(&id)
            .bind(Json(&collection))
            .execute(self.session.writer())
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ClientError::Conflict(format!("collection {} already exists", id))
                } else {
                    client_error(err)
                }
            })?;
        Ok(collection)
    }

    async fn update_collection(&self, mut collection: Collection) -> ClientResult<Collection> {
        let id = resource_id(&collection)?.to_string();
        strip_inferred(&mut collection);
        let result = sqlx::query("UPDATE collections SET content = $2 WHERE id = $1")
            .bind(&id)
            .bind(Json(&collection))
            .execute(self.session.writer())
            .await
            .map_err(client_error)?;
        if result.rows_affected() == 0 {
            return Err(ClientError::collection_not_found(&id));
        }
        Ok(collection)
    }

    async fn delete_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        let row: Option<Json<Collection>> =
            sqlx::query_scalar("DELETE FROM collections WHERE id = $1 RETURNING content")
                .bind(collection_id)
                .fetch_optional(self.session.writer())
                .await
                .map_err(client_error)?;
        row.map(|Json(c)| c)
            .ok_or_else(|| ClientError::collection_not_found(collection_id))
    }

    async fn create_item(&self, collection_id: &str, item: Item) -> ClientResult<Item> {
        let (id, item) = prepare_item(collection_id, item)?;
        sqlx::query(
            "INSERT INTO items (collection_id, id, datetime, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(collection_id)
        .bind(&id)
        .bind(item_datetime(&item))
        .bind(Json(&item))
        .execute(self.session.writer())
        .await
        .map_err(|err| insert_error(err, collection_id, &id))?;
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
        let result = sqlx::query(
            "UPDATE items SET datetime = $3, content = $4 WHERE collection_id = $1 AND id = $2",
        )
        .bind(collection_id)
        .bind(item_id)
        .bind(item_datetime(&item))
        .bind(Json(&item))
        .execute(self.session.writer())
        .await
        .map_err(client_error)?;
        if result.rows_affected() == 0 {
            return Err(ClientError::item_not_found(collection_id, item_id));
        }
        Ok(item)
    }

    async fn delete_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        let row: Option<Json<Item>> = sqlx::query_scalar(
            "DELETE FROM items WHERE collection_id = $1 AND id = $2 RETURNING content",
        )
        .bind(collection_id)
        .bind(item_id)
        .fetch_optional(self.session.writer())
        .await
        .map_err(client_error)?;
        row.map(|Json(i)| i)
            .ok_or_else(|| ClientError::item_not_found(collection_id, item_id))
    }
}

#[async_trait]
impl BulkTransactionClient for PgCatalogClient {
    async fn bulk_item_insert(
        &self,
        collection_id: &str,
        items: Vec<Item>,
        chunk_size: Option<usize>,
    ) -> ClientResult<usize> {
        let prepared = items
            .into_iter()
            .map(|item| prepare_item(collection_id, item))
            .collect::<ClientResult<Vec<_>>>()?;
        let chunk_size = effective_chunk_size(chunk_size);

        let mut tx = self.session.begin().await.map_err(client_error)?;
        for chunk in prepared.chunks(chunk_size) {
            let mut insert: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO items (collection_id, id, datetime, content) ");
            insert.push_values(chunk, |mut row, (id, item)| {
                row.push_bind(collection_id.to_string())
                    .push_bind(id.clone())
                    .push_bind(item_datetime(item))
                    .push_bind(Json(item.clone()));
            });
            insert
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        ClientError::Conflict(format!(
                            "bulk insert into collection {} repeats an existing item id",
                            collection_id
                        ))
                    } else {
                        insert_error(err, collection_id, "")
                    }
                })?;
        }
        tx.commit().await.map_err(client_error)?;

        info!(
            collection = collection_id,
            inserted = prepared.len(),
            chunk_size,
            "bulk inserted items"
        );
        Ok(prepared.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_stays_within_bind_limit() {
        assert_eq!(effective_chunk_size(None), DEFAULT_CHUNK_SIZE);
        assert_eq!(effective_chunk_size(Some(0)), 1);
        assert_eq!(effective_chunk_size(Some(100)), 100);
        assert_eq!(effective_chunk_size(Some(20_000)), MAX_CHUNK_SIZE);
        assert!(effective_chunk_size(Some(usize::MAX)) * BINDS_PER_ROW <= u16::MAX as usize);
    }

    #[test]
    fn test_only_exact_predicates_page_in_sql() {
        let search = Search::in_collection("landsat");
        assert!(pages_in_sql(&search, None));

        let open_start = DatetimeInterval::parse("../2020-01-01T00:00:00Z").unwrap();
        assert!(pages_in_sql(&search, Some(&open_start)));

        let closed = DatetimeInterval::parse("2019-01-01T00:00:00Z/2020-01-01T00:00:00Z").unwrap();
        assert!(!pages_in_sql(&search, Some(&closed)));

        let mut boxed = Search::in_collection("landsat");
        boxed.bbox = Some(vec![0.0, 0.0, 1.0, 1.0]);
        assert!(!pages_in_sql(&boxed, None));
    }

    #[test]
    fn test_filtered_pushes_datetime_end_bound() {
        let mut search = Search::in_collection("landsat");
        search.datetime = Some("../2020-01-01T00:00:00Z".to_string());
        let interval = datetime_interval(&search).unwrap();
        let sql = filtered("SELECT COUNT(*) FROM items", &search, interval.as_ref())
            .into_sql();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM items WHERE TRUE AND collection_id = ANY($1) \
             AND datetime IS NOT NULL AND datetime <= $2"
        );
    }
}
