//! Client composition and search orchestration over the in-memory catalog.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use stac_core::client::{
    compose, compose_routes, BaseClient, BulkTransactionExtension, Capability, CapabilitySet,
    CoreClient, Endpoint, Extension, FieldsExtension, HttpMethod, ItemPage, QueryExtension,
    RouteSpec, SortClient, SortExtension, Source, TransactionClient, TransactionExtension,
};
use stac_core::error::{ClientError, ClientResult};
use stac_core::types::{Collection, FieldsSpec, Item, Search, SortBy};
use stac_core::MemoryCatalog;

fn resource(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn catalog() -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .create_collection(resource(json!({"id": "landsat"})))
        .await
        .unwrap();
    for (id, cloud) in [("scene-1", 40), ("scene-2", 5), ("scene-3", 20)] {
        catalog
            .create_item(
                "landsat",
                resource(json!({
                    "id": id,
                    "bbox": [0.0, 0.0, 1.0, 1.0],
                    "properties": {"datetime": "2020-06-01T00:00:00Z", "eo:cloud_cover": cloud}
                })),
            )
            .await
            .unwrap();
    }
    catalog
}

fn read_only(catalog: Arc<MemoryCatalog>) -> BaseClient {
    BaseClient::new(catalog)
}

fn standard_extensions(catalog: &Arc<MemoryCatalog>) -> Vec<Arc<dyn Extension>> {
    vec![
        Arc::new(TransactionExtension::new(catalog.clone())),
        Arc::new(BulkTransactionExtension::new(catalog.clone())),
        Arc::new(FieldsExtension::new()),
        Arc::new(QueryExtension::new()),
        Arc::new(SortExtension::new()),
    ]
}

/// Sorts by id descending regardless of the request.
struct ReverseIds;

impl SortClient for ReverseIds {
    fn sort(&self, items: &mut [Item], _sortby: &[SortBy]) -> ClientResult<()> {
        items.sort_by(|a, b| b["id"].as_str().cmp(&a["id"].as_str()));
        Ok(())
    }
}

struct CustomSort;

impl Extension for CustomSort {
    fn name(&self) -> &str {
        "custom_sort"
    }

    fn provides(&self) -> CapabilitySet {
        CapabilitySet::new().with_sort(Arc::new(ReverseIds))
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(HttpMethod::Get, "/search", Endpoint::GetSearch)]
    }
}

/// Claims `GET /search` without providing any capability.
struct SearchPage;

impl Extension for SearchPage {
    fn name(&self) -> &str {
        "search_page"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(HttpMethod::Get, "/search", Endpoint::GetSearch)]
    }
}

/// Pages natively and records every full scan and page request.
struct PagingCatalog {
    inner: Arc<MemoryCatalog>,
    scans: Mutex<usize>,
    pages: Mutex<Vec<(usize, usize)>>,
}

impl PagingCatalog {
    fn new(inner: Arc<MemoryCatalog>) -> Self {
        Self {
            inner,
            scans: Mutex::new(0),
            pages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CoreClient for PagingCatalog {
    async fn all_collections(&self) -> ClientResult<Vec<Collection>> {
        self.inner.all_collections().await
    }

    async fn get_collection(&self, collection_id: &str) -> ClientResult<Collection> {
        self.inner.get_collection(collection_id).await
    }

    async fn get_item(&self, collection_id: &str, item_id: &str) -> ClientResult<Item> {
        self.inner.get_item(collection_id, item_id).await
    }

    async fn search(&self, search: &Search) -> ClientResult<Vec<Item>> {
        *self.scans.lock() += 1;
        self.inner.search(search).await
    }

    async fn search_page(
        &self,
        search: &Search,
        offset: usize,
        limit: usize,
    ) -> ClientResult<Option<ItemPage>> {
        self.pages.lock().push((offset, limit));
        let items = self.inner.search(search).await?;
        Ok(Some(ItemPage {
            matched: items.len(),
            items: items.into_iter().skip(offset).take(limit).collect(),
        }))
    }
}

fn ids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i["id"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_base_only_reports_missing_capabilities() {
    let composed = compose(read_only(catalog().await), &[]);

    assert!(composed.supports(Capability::Read));
    assert!(!composed.supports(Capability::Transaction));
    let err = composed.transactions().err().unwrap();
    assert!(matches!(
        err,
        ClientError::Unsupported {
            capability: Capability::Transaction
        }
    ));

    let mut search = Search::in_collection("landsat");
    search.sortby = Some(SortBy::parse_list("id"));
    let err = composed.search(&search).await.unwrap_err();
    assert_eq!(err.to_string(), "sort is not supported by this service");
}

#[tokio::test]
async fn test_base_capabilities_are_wired() {
    let catalog = catalog().await;
    let composed = compose(catalog.into_base_client(), &[]);

    let wiring = composed.wiring();
    assert_eq!(wiring[&Capability::Transaction], Source::Base);
    assert_eq!(wiring[&Capability::BulkTransaction], Source::Base);
    assert!(!wiring.contains_key(&Capability::Sort));
}

#[tokio::test]
async fn test_later_extension_wins() {
    let catalog = catalog().await;
    let mut extensions = standard_extensions(&catalog);
    extensions.push(Arc::new(CustomSort));
    let composed = compose(catalog.clone().into_base_client(), &extensions);

    assert_eq!(
        composed.wiring()[&Capability::Sort],
        Source::Extension("custom_sort".to_string())
    );
    assert_eq!(
        composed.wiring()[&Capability::Transaction],
        Source::Extension("transaction".to_string())
    );

    let mut search = Search::in_collection("landsat");
    search.sortby = Some(SortBy::parse_list("eo:cloud_cover"));
    let page = composed.search(&search).await.unwrap();
    assert_eq!(ids(&page.features), vec!["scene-3", "scene-2", "scene-1"]);
}

#[tokio::test]
async fn test_composition_is_deterministic() {
    let catalog = catalog().await;
    let extensions = standard_extensions(&catalog);
    let first = compose(catalog.clone().into_base_client(), &extensions);
    let second = compose(catalog.clone().into_base_client(), &extensions);
    assert_eq!(first.wiring(), second.wiring());

    let routes_first = compose_routes(&extensions);
    let routes_second = compose_routes(&extensions);
    assert_eq!(routes_first, routes_second);
}

#[tokio::test]
async fn test_reversed_order_flips_precedence() {
    let catalog = catalog().await;
    let custom_last: Vec<Arc<dyn Extension>> =
        vec![Arc::new(SortExtension::new()), Arc::new(CustomSort)];
    let sort_last: Vec<Arc<dyn Extension>> =
        vec![Arc::new(CustomSort), Arc::new(SortExtension::new())];

    let first = compose(catalog.clone().into_base_client(), &custom_last);
    let second = compose(catalog.clone().into_base_client(), &sort_last);
    assert_eq!(
        first.wiring()[&Capability::Sort],
        Source::Extension("custom_sort".to_string())
    );
    assert_eq!(
        second.wiring()[&Capability::Sort],
        Source::Extension("sort".to_string())
    );

    let mut search = Search::in_collection("landsat");
    search.sortby = Some(SortBy::parse_list("eo:cloud_cover"));
    let page = second.search(&search).await.unwrap();
    assert_eq!(ids(&page.features), vec!["scene-2", "scene-3", "scene-1"]);

    // Only the capability that both extensions provide differs.
    let mut first_wiring = first.wiring();
    let mut second_wiring = second.wiring();
    first_wiring.remove(&Capability::Sort);
    second_wiring.remove(&Capability::Sort);
    assert_eq!(first_wiring, second_wiring);
}

#[tokio::test]
async fn test_reversed_order_flips_route_owner() {
    let custom_last: Vec<Arc<dyn Extension>> = vec![Arc::new(SearchPage), Arc::new(CustomSort)];
    let page_last: Vec<Arc<dyn Extension>> = vec![Arc::new(CustomSort), Arc::new(SearchPage)];

    let routes_first = compose_routes(&custom_last);
    let routes_second = compose_routes(&page_last);
    assert_eq!(
        routes_first.get(HttpMethod::Get, "/search").unwrap().owner,
        "custom_sort"
    );
    assert_eq!(
        routes_second.get(HttpMethod::Get, "/search").unwrap().owner,
        "search_page"
    );
    assert_eq!(routes_first.len(), routes_second.len());
    assert_ne!(routes_first, routes_second);
    assert_eq!(
        routes_first.get(HttpMethod::Post, "/search"),
        routes_second.get(HttpMethod::Post, "/search")
    );
}

#[tokio::test]
async fn test_route_override_records_owner() {
    let extensions: Vec<Arc<dyn Extension>> = vec![Arc::new(CustomSort)];
    let routes = compose_routes(&extensions);

    let entry = routes.get(HttpMethod::Get, "/search").unwrap();
    assert_eq!(entry.owner, "custom_sort");
    let entry = routes.get(HttpMethod::Post, "/search").unwrap();
    assert_eq!(entry.owner, "core");
    assert!(routes.get(HttpMethod::Post, "/collections").is_none());
}

#[tokio::test]
async fn test_search_query_sort_page_and_fields() {
    let catalog = catalog().await;
    let composed = compose(
        catalog.clone().into_base_client(),
        &standard_extensions(&catalog),
    );

    let search: Search = serde_json::from_value(json!({
        "collections": ["landsat"],
        "query": {"eo:cloud_cover": {"lt": 30}},
        "sortby": [{"field": "eo:cloud_cover", "direction": "asc"}],
        "limit": 1,
        "fields": {"include": ["properties.eo:cloud_cover"], "exclude": ["bbox"]}
    }))
    .unwrap();

    let page = composed.search(&search).await.unwrap();
    assert_eq!(ids(&page.features), vec!["scene-2"]);
    assert!(!page.features[0].contains_key("bbox"));
    let context = page.context.unwrap();
    assert_eq!((context.returned, context.limit, context.matched), (1, 1, 2));
    assert_eq!(page.next_token.as_deref(), Some("next:1"));

    let next = Search {
        token: page.next_token,
        ..search
    };
    let page = composed.search(&next).await.unwrap();
    assert_eq!(ids(&page.features), vec!["scene-3"]);
    assert!(page.next_token.is_none());
}

#[tokio::test]
async fn test_item_collection_for_missing_collection() {
    let catalog = catalog().await;
    let composed = compose(catalog.into_base_client(), &[]);
    let err = composed.item_collection("nope", None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn test_transactions_through_extension() {
    let catalog = catalog().await;
    let composed = compose(
        read_only(catalog.clone()),
        &[Arc::new(TransactionExtension::new(catalog.clone())) as Arc<dyn Extension>],
    );

    composed
        .transactions()
        .unwrap()
        .delete_item("landsat", "scene-1")
        .await
        .unwrap();
    assert_eq!(catalog.item_count(), 2);
}

#[tokio::test]
async fn test_invalid_search_rejected_before_backend() {
    let composed = compose(read_only(catalog().await), &[]);
    let mut search = Search::default();
    search.bbox = Some(vec![0.0, 1.0, 2.0]);
    assert!(matches!(
        composed.search(&search).await,
        Err(ClientError::Validation(_))
    ));

    let search = Search {
        fields: Some(FieldsSpec::parse("id")),
        ..Search::default()
    };
    assert!(matches!(
        composed.search(&search).await,
        Err(ClientError::Unsupported {
            capability: Capability::Fields
        })
    ));
}

#[tokio::test]
async fn test_unsorted_search_pages_in_backend() {
    let paging = Arc::new(PagingCatalog::new(catalog().await));
    let composed = compose(BaseClient::new(paging.clone()), &standard_extensions(&paging.inner));

    let mut search = Search::in_collection("landsat");
    search.limit = Some(2);
    let page = composed.search(&search).await.unwrap();
    assert_eq!(page.features.len(), 2);
    assert_eq!(page.context.as_ref().unwrap().matched, 3);
    assert_eq!(page.next_token.as_deref(), Some("next:2"));

    search.token = page.next_token;
    let page = composed.search(&search).await.unwrap();
    assert_eq!(page.features.len(), 1);
    assert!(page.next_token.is_none());
    assert_eq!(*paging.pages.lock(), vec![(0, 2), (2, 2)]);
    assert_eq!(*paging.scans.lock(), 0);

    // Sorting needs every match, so the backend page is skipped.
    let mut search = Search::in_collection("landsat");
    search.sortby = Some(SortBy::parse_list("eo:cloud_cover"));
    search.limit = Some(1);
    let page = composed.search(&search).await.unwrap();
    assert_eq!(ids(&page.features), vec!["scene-2"]);
    assert_eq!(paging.pages.lock().len(), 2);
    assert_eq!(*paging.scans.lock(), 1);
}
