//! Route declarations and collision resolution.
//!
//! Extensions declare the `(method, path)` pairs they serve as data. The
//! HTTP layer turns the resolved table into a router; resolution itself is
//! pure so it can be tested without a server.

use std::collections::BTreeMap;

use super::capability::Capability;

/// HTTP methods used by the catalog API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// Request handlers the HTTP layer knows how to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    /// Landing page.
    LandingPage,
    /// Conformance classes.
    Conformance,
    /// Liveness probe.
    Ping,
    /// List collections.
    AllCollections,
    /// Read one collection.
    GetCollection,
    /// List the items of a collection.
    ItemCollection,
    /// Read one item.
    GetItem,
    /// Search with query parameters.
    GetSearch,
    /// Search with a JSON body.
    PostSearch,
    /// Insert a collection.
    CreateCollection,
    /// Replace a collection.
    UpdateCollection,
    /// Delete a collection.
    DeleteCollection,
    /// Insert an item.
    CreateItem,
    /// Replace an item.
    UpdateItem,
    /// Delete an item.
    DeleteItem,
    /// Insert many items.
    BulkItems,
}

impl Endpoint {
    /// Capability the handler dispatches to.
    pub fn capability(&self) -> Capability {
        match self {
            Endpoint::LandingPage
            | Endpoint::Conformance
            | Endpoint::Ping
            | Endpoint::AllCollections
            | Endpoint::GetCollection
            | Endpoint::ItemCollection
            | Endpoint::GetItem
            | Endpoint::GetSearch
            | Endpoint::PostSearch => Capability::Read,
            Endpoint::CreateCollection
            | Endpoint::UpdateCollection
            | Endpoint::DeleteCollection
            | Endpoint::CreateItem
            | Endpoint::UpdateItem
            | Endpoint::DeleteItem => Capability::Transaction,
            Endpoint::BulkItems => Capability::BulkTransaction,
        }
    }
}

/// A route contributed by the core API or an extension.
///
/// Paths use `{name}` placeholders. Placeholder names must be consistent
/// across routes sharing a prefix (`{collection_id}`, `{item_id}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template.
    pub path: &'static str,
    /// Handler.
    pub endpoint: Endpoint,
}

impl RouteSpec {
    /// Create a route.
    pub const fn new(method: HttpMethod, path: &'static str, endpoint: Endpoint) -> Self {
        Self {
            method,
            path,
            endpoint,
        }
    }
}

/// Name under which the core routes are registered.
pub const CORE_OWNER: &str = "core";

/// Routes every service exposes.
pub fn core_routes() -> Vec<RouteSpec> {
    use Endpoint::*;
    use HttpMethod::*;

    vec![
        RouteSpec::new(Get, "/", LandingPage),
        RouteSpec::new(Get, "/conformance", Conformance),
        RouteSpec::new(Get, "/_mgmt/ping", Ping),
        RouteSpec::new(Get, "/collections", AllCollections),
        RouteSpec::new(Get, "/collections/{collection_id}", GetCollection),
        RouteSpec::new(Get, "/collections/{collection_id}/items", ItemCollection),
        RouteSpec::new(Get, "/collections/{collection_id}/items/{item_id}", GetItem),
        RouteSpec::new(Get, "/search", GetSearch),
        RouteSpec::new(Post, "/search", PostSearch),
    ]
}

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Handler.
    pub endpoint: Endpoint,
    /// Core or extension that registered it last.
    pub owner: String,
}

/// Routes after collision resolution, keyed by path then method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<String, BTreeMap<HttpMethod, RouteEntry>>,
}

impl RouteTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `routes` on behalf of `owner`.
    ///
    /// A `(method, path)` pair that is already registered is taken over by
    /// the new registration.
    pub fn register(&mut self, owner: &str, routes: &[RouteSpec]) {
        for route in routes {
            let methods = self.routes.entry(route.path.to_string()).or_default();
            let entry = RouteEntry {
                endpoint: route.endpoint,
                owner: owner.to_string(),
            };
            if let Some(previous) = methods.insert(route.method, entry) {
                tracing::debug!(
                    method = %route.method,
                    path = route.path,
                    previous = %previous.owner,
                    owner,
                    "route overridden"
                );
            }
        }
    }

    /// Look up a route.
    pub fn get(&self, method: HttpMethod, path: &str) -> Option<&RouteEntry> {
        self.routes.get(path).and_then(|methods| methods.get(&method))
    }

    /// Iterate paths with their methods, in path order.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &BTreeMap<HttpMethod, RouteEntry>)> {
        self.routes
            .iter()
            .map(|(path, methods)| (path.as_str(), methods))
    }

    /// Number of `(method, path)` pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
