//! HTTP route handlers.
//!
//! The router is built from a resolved [`RouteTable`]: every `(method, path)`
//! entry is bound to the handler of its [`Endpoint`]. Handlers dispatch to the
//! composed client, so a route whose capability is not wired answers 501.

pub mod catalog;
pub mod transaction;

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use stac_core::client::{Endpoint, HttpMethod, RouteTable};

use crate::AppState;

/// Build the router for a route table.
pub fn routes(table: &RouteTable) -> Router<AppState> {
    let mut router = Router::new();
    for (path, methods) in table.paths() {
        let mut method_router = MethodRouter::new();
        for (method, entry) in methods {
            method_router = bind(method_router, method_filter(*method), entry.endpoint);
        }
        router = router.route(&axum_path(path), method_router);
    }
    router
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

fn bind(
    router: MethodRouter<AppState>,
    filter: MethodFilter,
    endpoint: Endpoint,
) -> MethodRouter<AppState> {
    match endpoint {
        Endpoint::LandingPage => router.on(filter, catalog::landing_page),
        Endpoint::Conformance => router.on(filter, catalog::conformance),
        Endpoint::Ping => router.on(filter, catalog::ping),
        Endpoint::AllCollections => router.on(filter, catalog::all_collections),
        Endpoint::GetCollection => router.on(filter, catalog::get_collection),
        Endpoint::ItemCollection => router.on(filter, catalog::item_collection),
        Endpoint::GetItem => router.on(filter, catalog::get_item),
        Endpoint::GetSearch => router.on(filter, catalog::get_search),
        Endpoint::PostSearch => router.on(filter, catalog::post_search),
        Endpoint::CreateCollection => router.on(filter, transaction::create_collection),
        Endpoint::UpdateCollection => router.on(filter, transaction::update_collection),
        Endpoint::DeleteCollection => router.on(filter, transaction::delete_collection),
        Endpoint::CreateItem => router.on(filter, transaction::create_item),
        Endpoint::UpdateItem => router.on(filter, transaction::update_item),
        Endpoint::DeleteItem => router.on(filter, transaction::delete_item),
        Endpoint::BulkItems => router.on(filter, transaction::bulk_items),
    }
}

/// `{name}` placeholders to the router's `:name` form.
fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => format!(":{}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Base URL of the request, `scheme://host/`, used to build links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    /// The URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");
        Ok(BaseUrl(format!("{}://{}/", scheme, host)))
    }
}
