//! Core catalog endpoints: landing page, conformance, collections, items and
//! search.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, RawQuery, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use stac_core::links::{decorate_collection, decorate_item, urljoin};
use stac_core::types::{FieldsSpec, ItemCollection, QueryExpr, Search, SortBy, STAC_VERSION};

use super::BaseUrl;
use crate::error::AppError;
use crate::AppState;

const MIME_JSON: &str = "application/json";
const MIME_GEOJSON: &str = "application/geo+json";

/// Conformance classes of the core API.
pub const CORE_CONFORMANCE: [&str; 7] = [
    "https://api.stacspec.org/v1.0.0/core",
    "https://api.stacspec.org/v1.0.0/collections",
    "https://api.stacspec.org/v1.0.0/ogcapi-features",
    "https://api.stacspec.org/v1.0.0/item-search",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/core",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/oas30",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/geojson",
];

fn link(rel: &str, media_type: &str, href: String) -> Value {
    json!({"rel": rel, "type": media_type, "href": href})
}

/// Landing page.
pub async fn landing_page(
    State(state): State<AppState>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let base = base.as_str();
    let mut links = vec![
        link("self", MIME_JSON, base.to_string()),
        link("root", MIME_JSON, base.to_string()),
        link("data", MIME_JSON, urljoin(base, "collections")),
        link("conformance", MIME_JSON, urljoin(base, "conformance")),
        json!({"rel": "search", "type": MIME_GEOJSON, "href": urljoin(base, "search"), "method": "GET"}),
        json!({"rel": "search", "type": MIME_GEOJSON, "href": urljoin(base, "search"), "method": "POST"}),
    ];
    for collection in state.client.all_collections().await? {
        if let Some(id) = collection.get("id").and_then(Value::as_str) {
            let mut child = link("child", MIME_JSON, urljoin(base, &format!("collections/{}", id)));
            if let Some(title) = collection.get("title") {
                child["title"] = title.clone();
            }
            links.push(child);
        }
    }

    let settings = &state.settings;
    Ok(Json(json!({
        "type": "Catalog",
        "stac_version": STAC_VERSION,
        "id": settings.catalog_id,
        "title": settings.title,
        "description": settings.description,
        "conformsTo": state.conformance.as_slice(),
        "links": links,
    })))
}

/// Conformance classes of the assembled service.
pub async fn conformance(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "conformsTo": state.conformance.as_slice() }))
}

/// Liveness probe.
pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "PONG" }))
}

/// All collections.
pub async fn all_collections(
    State(state): State<AppState>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let base = base.as_str();
    let mut collections = state.client.all_collections().await?;
    for collection in &mut collections {
        decorate_collection(collection, base);
    }
    Ok(Json(json!({
        "collections": collections,
        "links": [
            link("root", MIME_JSON, base.to_string()),
            link("self", MIME_JSON, urljoin(base, "collections")),
        ],
    })))
}

/// One collection.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let mut collection = state.client.get_collection(&collection_id).await?;
    decorate_collection(&mut collection, base.as_str());
    Ok(Json(Value::Object(collection)))
}

/// Paging parameters of an item listing.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsParams {
    /// Page size.
    pub limit: Option<usize>,
    /// Token from a previous `next` link.
    pub token: Option<String>,
}

/// Items of one collection.
pub async fn item_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    params: Result<Query<ItemsParams>, QueryRejection>,
    base: BaseUrl,
) -> Result<Json<ItemCollection>, AppError> {
    let Query(params) = params?;
    let base = base.as_str();
    let page = state
        .client
        .item_collection(&collection_id, params.limit, params.token)
        .await?;

    let own = urljoin(base, &format!("collections/{}", collection_id));
    let mut links = vec![
        link("self", MIME_GEOJSON, format!("{}/items", own)),
        link("parent", MIME_JSON, own.clone()),
        link("root", MIME_JSON, base.to_string()),
    ];
    if let Some(token) = &page.next_token {
        let limit = page.context.as_ref().map(|c| c.limit).unwrap_or_default();
        links.push(link(
            "next",
            MIME_GEOJSON,
            format!("{}/items?limit={}&token={}", own, limit, token),
        ));
    }
    Ok(Json(finish_page(page, base, links)))
}

/// One item.
pub async fn get_item(
    State(state): State<AppState>,
    Path((collection_id, item_id)): Path<(String, String)>,
    base: BaseUrl,
) -> Result<Json<Value>, AppError> {
    let mut item = state.client.get_item(&collection_id, &item_id).await?;
    decorate_item(&mut item, base.as_str());
    Ok(Json(Value::Object(item)))
}

/// Query parameters of `GET /search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Comma separated collection ids.
    pub collections: Option<String>,
    /// Comma separated item ids.
    pub ids: Option<String>,
    /// Comma separated bounding box.
    pub bbox: Option<String>,
    /// Instant or interval.
    pub datetime: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
    /// Paging token.
    pub token: Option<String>,
    /// Fields extension, `-` prefix excludes.
    pub fields: Option<String>,
    /// Sort extension, `-` prefix sorts descending.
    pub sortby: Option<String>,
    /// Query extension, JSON encoded.
    pub query: Option<String>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl TryFrom<SearchParams> for Search {
    type Error = AppError;

    fn try_from(params: SearchParams) -> Result<Self, Self::Error> {
        let bbox = params
            .bbox
            .as_deref()
            .map(|raw| {
                split_list(raw)
                    .iter()
                    .map(|v| v.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| AppError::BadRequest(format!("invalid bbox `{}`", raw)))
            })
            .transpose()?;
        let query = params
            .query
            .as_deref()
            .map(serde_json::from_str::<QueryExpr>)
            .transpose()?;

        Ok(Search {
            collections: params.collections.as_deref().map(split_list),
            ids: params.ids.as_deref().map(split_list),
            bbox,
            datetime: params.datetime,
            limit: params.limit,
            token: params.token,
            fields: params.fields.as_deref().map(FieldsSpec::parse),
            query,
            sortby: params.sortby.as_deref().map(SortBy::parse_list),
        })
    }
}

/// Search with query parameters.
pub async fn get_search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
    RawQuery(raw): RawQuery,
    base: BaseUrl,
) -> Result<Json<ItemCollection>, AppError> {
    let Query(params) = params?;
    let search = Search::try_from(params)?;
    let page = state.client.search(&search).await?;

    let base = base.as_str();
    let own = urljoin(base, "search");
    let mut links = vec![
        link("self", MIME_GEOJSON, own.clone()),
        link("root", MIME_JSON, base.to_string()),
    ];
    if let Some(token) = &page.next_token {
        let mut pairs: Vec<String> = raw
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty() && !pair.starts_with("token="))
            .map(str::to_string)
            .collect();
        pairs.push(format!("token={}", token));
        links.push(link("next", MIME_GEOJSON, format!("{}?{}", own, pairs.join("&"))));
    }
    Ok(Json(finish_page(page, base, links)))
}

/// Search with a JSON body.
pub async fn post_search(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<Search>, JsonRejection>,
) -> Result<Json<ItemCollection>, AppError> {
    let Json(search) = payload?;
    let page = state.client.search(&search).await?;

    let base = base.as_str();
    let own = urljoin(base, "search");
    let mut links = vec![
        link("self", MIME_GEOJSON, own.clone()),
        link("root", MIME_JSON, base.to_string()),
    ];
    if let Some(token) = &page.next_token {
        links.push(json!({
            "rel": "next",
            "type": MIME_GEOJSON,
            "href": own,
            "method": "POST",
            "body": {"token": token},
            "merge": true,
        }));
    }
    Ok(Json(finish_page(page, base, links)))
}

/// Attach page links and regenerate item links. Items projected without
/// `links` are left without them.
fn finish_page(mut page: ItemCollection, base: &str, links: Vec<Value>) -> ItemCollection {
    for item in &mut page.features {
        if item.contains_key("links") {
            decorate_item(item, base);
        }
    }
    page.links = links;
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_core::types::Direction;

    #[test]
    fn test_search_params_conversion() {
        let params = SearchParams {
            collections: Some("landsat, sentinel".to_string()),
            bbox: Some("0,0,10,10".to_string()),
            sortby: Some("-properties.datetime".to_string()),
            query: Some(r#"{"eo:cloud_cover":{"lt":10}}"#.to_string()),
            ..SearchParams::default()
        };
        let search = Search::try_from(params).unwrap();
        assert_eq!(
            search.collections,
            Some(vec!["landsat".to_string(), "sentinel".to_string()])
        );
        assert_eq!(search.bbox, Some(vec![0.0, 0.0, 10.0, 10.0]));
        assert_eq!(search.sortby.unwrap()[0].direction, Direction::Desc);
        assert_eq!(search.query.unwrap()["eo:cloud_cover"]["lt"], json!(10));
    }

    #[test]
    fn test_search_params_bad_bbox() {
        let params = SearchParams {
            bbox: Some("0,0,east,10".to_string()),
            ..SearchParams::default()
        };
        assert!(matches!(Search::try_from(params), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_search_params_bad_query_json() {
        let params = SearchParams {
            query: Some("{not json".to_string()),
            ..SearchParams::default()
        };
        assert!(Search::try_from(params).is_err());
    }
}
