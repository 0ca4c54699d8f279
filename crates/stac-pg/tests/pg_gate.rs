//! Gate and catalog tests against a live PostgreSQL instance.
//!
//! Requires DATABASE_URL pointing at a disposable database; the tests drop
//! and recreate the catalog tables. Run with `--ignored`.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use stac_core::client::{BulkTransactionClient, CoreClient, TransactionClient};
use stac_core::error::ClientError;
use stac_core::migration::{Revision, RevisionSelector, SchemaStore, SchemaVersionGate};
use stac_core::types::Search;
use stac_pg::{embedded_registry, PgCatalogClient, PgSchemaStore, Session, PINNED_REVISION};

async fn fresh_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL environment variable not set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to PostgreSQL");
    sqlx::raw_sql(
        "DROP TABLE IF EXISTS items CASCADE;
         DROP TABLE IF EXISTS collections CASCADE;
         DROP TABLE IF EXISTS stac_schema_version;",
    )
    .execute(&pool)
    .await
    .expect("Failed to reset schema");
    pool
}

fn resource(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_gate_migrates_fresh_database() {
    let pool = fresh_pool().await;
    let store = PgSchemaStore::new(pool.clone());
    assert_eq!(store.current_revision().await.unwrap(), None);

    let pinned = RevisionSelector::Pinned(Revision::new(PINNED_REVISION));
    let gate = SchemaVersionGate::new(embedded_registry().unwrap());
    let ready = gate.ensure_ready(&store, &pinned, &pinned).await.unwrap();
    assert_eq!(ready.revision.as_str(), PINNED_REVISION);
    assert_eq!(ready.upgrade.applied.len(), 3);

    let again = gate.ensure_ready(&store, &pinned, &pinned).await.unwrap();
    assert!(again.upgrade.applied.is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_gates_apply_each_step_once() {
    let pool = fresh_pool().await;
    let gate = Arc::new(SchemaVersionGate::new(embedded_registry().unwrap()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let store = PgSchemaStore::new(pool.clone());
            tokio::spawn(async move {
                gate.ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for result in futures::future::join_all(handles).await {
        let ready = result.unwrap().unwrap();
        applied += ready.upgrade.applied.len();
    }
    assert_eq!(applied, 3);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_recorded_revision_fails_gate() {
    let pool = fresh_pool().await;
    sqlx::raw_sql(
        "CREATE TABLE stac_schema_version (revision TEXT NOT NULL);
         INSERT INTO stac_schema_version (revision) VALUES ('aaa111');",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = PgSchemaStore::new(pool);
    let err = SchemaVersionGate::new(embedded_registry().unwrap())
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("aaa111"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_catalog_round_trip() {
    let pool = fresh_pool().await;
    let store = PgSchemaStore::new(pool.clone());
    SchemaVersionGate::new(embedded_registry().unwrap())
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap();

    let client = PgCatalogClient::new(Session::from_pools(pool.clone(), pool));
    client
        .create_collection(resource(json!({"id": "landsat"})))
        .await
        .unwrap();
    client
        .create_item(
            "landsat",
            resource(json!({
                "id": "scene-1",
                "bbox": [0.0, 0.0, 1.0, 1.0],
                "properties": {"datetime": "2020-06-01T00:00:00Z"}
            })),
        )
        .await
        .unwrap();

    let err = client
        .create_item("landsat", resource(json!({"id": "scene-1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Conflict(_)));

    let err = client
        .create_item("missing", resource(json!({"id": "scene-2"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let found = client.search(&Search::in_collection("landsat")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["collection"], "landsat");

    client.delete_collection("landsat").await.unwrap();
    assert!(client.get_item("landsat", "scene-1").await.is_err());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_search_page_limits_in_sql() {
    let pool = fresh_pool().await;
    let store = PgSchemaStore::new(pool.clone());
    SchemaVersionGate::new(embedded_registry().unwrap())
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap();

    let client = PgCatalogClient::new(Session::from_pools(pool.clone(), pool));
    client
        .create_collection(resource(json!({"id": "landsat"})))
        .await
        .unwrap();
    let items: Vec<_> = (0..20_000)
        .map(|i| {
            resource(json!({
                "id": format!("scene-{:05}", i),
                "properties": {"datetime": format!("2020-01-01T00:00:{:02}Z", i % 60)}
            }))
        })
        .collect();
    let inserted = client
        .bulk_item_insert("landsat", items, Some(20_000))
        .await
        .unwrap();
    assert_eq!(inserted, 20_000);

    let search = Search::in_collection("landsat");
    let page = client.search_page(&search, 10, 5).await.unwrap().unwrap();
    assert_eq!(page.matched, 20_000);
    assert_eq!(page.items.len(), 5);
    let all = client.search(&search).await.unwrap();
    assert_eq!(page.items, all[10..15].to_vec());

    let mut bounded = Search::in_collection("landsat");
    bounded.datetime = Some("../2020-01-01T00:00:09Z".to_string());
    let page = client.search_page(&bounded, 0, 1).await.unwrap().unwrap();
    assert_eq!(page.matched, 20_000 / 60 * 10 + 10);

    bounded.datetime = Some("2020-01-01T00:00:09Z/..".to_string());
    assert!(client.search_page(&bounded, 0, 1).await.unwrap().is_none());
}
