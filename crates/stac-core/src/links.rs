//! Inferred links.
//!
//! Links a resource can derive from its own location (`self`, `parent`,
//! `collection`, `root`, `item`) are never stored. They are stripped on write
//! and regenerated against the request's base URL on read.

use serde_json::{json, Value};

use crate::types::{Collection, Item};

/// Link relations generated at read time.
pub const INFERRED_LINK_RELS: &[&str] = &["self", "item", "parent", "collection", "root"];

const MIME_JSON: &str = "application/json";
const MIME_GEOJSON: &str = "application/geo+json";

fn rel(link: &Value) -> Option<&str> {
    link.get("rel").and_then(Value::as_str)
}

/// Drop links whose relation is inferred.
pub fn filter_links(links: &[Value]) -> Vec<Value> {
    links
        .iter()
        .filter(|link| !rel(link).is_some_and(|r| INFERRED_LINK_RELS.contains(&r)))
        .cloned()
        .collect()
}

/// Drop inferred links and make the remaining hrefs absolute.
pub fn resolve_links(links: &[Value], base_url: &str) -> Vec<Value> {
    let mut resolved = filter_links(links);
    for link in &mut resolved {
        if let Some(Value::String(href)) = link.get_mut("href") {
            *href = urljoin(base_url, href);
        }
    }
    resolved
}

/// Components of a URI reference (RFC 3986 section 3).
#[derive(Debug, Default, PartialEq, Eq)]
struct UriParts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> UriParts<'a> {
    fn parse(reference: &'a str) -> Self {
        let (rest, fragment) = match reference.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (reference, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (scheme, rest) = match rest.split_once(':') {
            Some((scheme, rest)) if is_scheme(scheme) => (Some(scheme), rest),
            _ => (None, rest),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(rest) => {
                let end = rest.find('/').unwrap_or(rest.len());
                (Some(&rest[..end]), &rest[end..])
            }
            None => (None, rest),
        };
        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }
}

impl std::fmt::Display for UriParts<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(scheme) = self.scheme {
            write!(f, "{}:", scheme)?;
        }
        if let Some(authority) = self.authority {
            write!(f, "//{}", authority)?;
        }
        f.write_str(self.path)?;
        if let Some(query) = self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Remove `.` and `..` segments from a path (RFC 3986 section 5.2.4).
fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output = String::with_capacity(path.len());
    let pop_segment = |output: &mut String| {
        let cut = output.rfind('/').unwrap_or(0);
        output.truncate(cut);
    };

    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") {
            input = &input[3..];
            pop_segment(&mut output);
        } else if input == "/.." {
            input = "/";
            pop_segment(&mut output);
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let skip = usize::from(input.starts_with('/'));
            let end = input[skip..].find('/').map_or(input.len(), |p| p + skip);
            output.push_str(&input[..end]);
            input = &input[end..];
        }
    }
    output
}

/// Resolve `reference` against `base` (RFC 3986 section 5.2), as a browser
/// resolves a relative href.
pub fn urljoin(base: &str, reference: &str) -> String {
    let base = UriParts::parse(base);
    let reference = UriParts::parse(reference);

    if reference.scheme.is_some() || reference.authority.is_some() {
        let path = remove_dot_segments(reference.path);
        return UriParts {
            scheme: reference.scheme.or(base.scheme),
            path: &path,
            ..reference
        }
        .to_string();
    }
    if reference.path.is_empty() {
        return UriParts {
            query: reference.query.or(base.query),
            fragment: reference.fragment,
            ..base
        }
        .to_string();
    }

    let merged = if reference.path.starts_with('/') {
        reference.path.to_string()
    } else if base.authority.is_some() && base.path.is_empty() {
        format!("/{}", reference.path)
    } else {
        let dir_end = base.path.rfind('/').map_or(0, |p| p + 1);
        format!("{}{}", &base.path[..dir_end], reference.path)
    };
    let path = remove_dot_segments(&merged);
    UriParts {
        path: &path,
        query: reference.query,
        fragment: reference.fragment,
        ..base
    }
    .to_string()
}

fn link(rel: &str, media_type: &str, href: String) -> Value {
    json!({"rel": rel, "type": media_type, "href": href})
}

/// Links inferred for a collection.
#[derive(Debug, Clone)]
pub struct CollectionLinks<'a> {
    pub collection_id: &'a str,
    pub base_url: &'a str,
}

impl CollectionLinks<'_> {
    pub fn create_links(&self) -> Vec<Value> {
        let own = urljoin(self.base_url, &format!("collections/{}", self.collection_id));
        vec![
            link("self", MIME_JSON, own.clone()),
            link("parent", MIME_JSON, self.base_url.to_string()),
            link("items", MIME_GEOJSON, format!("{}/items", own)),
            link("root", MIME_JSON, self.base_url.to_string()),
        ]
    }
}

/// Links inferred for an item, including the alternate `tiles` link.
#[derive(Debug, Clone)]
pub struct ItemLinks<'a> {
    pub collection_id: &'a str,
    pub item_id: &'a str,
    pub base_url: &'a str,
}

impl ItemLinks<'_> {
    pub fn create_links(&self) -> Vec<Value> {
        let collection = urljoin(self.base_url, &format!("collections/{}", self.collection_id));
        let own = format!("{}/items/{}", collection, self.item_id);
        vec![
            link("self", MIME_GEOJSON, own.clone()),
            link("parent", MIME_JSON, collection.clone()),
            link("collection", MIME_JSON, collection),
            link("root", MIME_JSON, self.base_url.to_string()),
            json!({
                "rel": "alternate",
                "type": MIME_JSON,
                "title": "tiles",
                "href": format!("{}/tiles", own),
            }),
        ]
    }
}

fn stored_links(resource: &serde_json::Map<String, Value>) -> Vec<Value> {
    resource
        .get("links")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Strip inferred links before a resource is stored.
pub fn strip_inferred(resource: &mut serde_json::Map<String, Value>) {
    let kept = filter_links(&stored_links(resource));
    resource.insert("links".to_string(), Value::Array(kept));
}

/// Regenerate a collection's links against `base_url`.
pub fn decorate_collection(collection: &mut Collection, base_url: &str) {
    let Some(id) = collection.get("id").and_then(Value::as_str).map(str::to_owned) else {
        return;
    };
    let mut links = CollectionLinks {
        collection_id: &id,
        base_url,
    }
    .create_links();
    links.extend(resolve_links(&stored_links(collection), base_url));
    collection.insert("links".to_string(), Value::Array(links));
}

/// Regenerate an item's links against `base_url`.
pub fn decorate_item(item: &mut Item, base_url: &str) {
    let id = item.get("id").and_then(Value::as_str).map(str::to_owned);
    let collection = item
        .get("collection")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let (Some(item_id), Some(collection_id)) = (id, collection) else {
        return;
    };
    let mut links = ItemLinks {
        collection_id: &collection_id,
        item_id: &item_id,
        base_url,
    }
    .create_links();
    links.extend(resolve_links(&stored_links(item), base_url));
    item.insert("links".to_string(), Value::Array(links));
}
