//! Catalog resource types.
//!
//! Items and collections are carried as JSON objects; the service does not
//! validate their STAC schema beyond the few members it needs (`id`,
//! `collection`, `bbox`, `properties.datetime`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A STAC item (GeoJSON feature).
pub type Item = Map<String, Value>;

/// A STAC collection.
pub type Collection = Map<String, Value>;

/// Default page size for item listings and searches.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest page size a client may request.
pub const MAX_LIMIT: usize = 10_000;

/// STAC version reported on generated documents.
pub const STAC_VERSION: &str = "1.0.0";

/// Read the `id` member of a resource.
pub fn resource_id(resource: &Map<String, Value>) -> Result<&str, ClientError> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ClientError::Validation("resource is missing a string `id`".to_string()))
}

/// Read the `collection` member of an item.
pub fn item_collection_id(item: &Item) -> Option<&str> {
    item.get("collection").and_then(Value::as_str)
}

/// Bind an item to `collection_id` before it is stored.
///
/// Fills `collection` when absent, rejects an item declaring another
/// collection and strips inferred links. Returns the item id with the item.
pub fn prepare_item(collection_id: &str, mut item: Item) -> Result<(String, Item), ClientError> {
    let id = resource_id(&item)?.to_string();
    match item_collection_id(&item) {
        Some(declared) if declared != collection_id => {
            return Err(ClientError::Validation(format!(
                "item {} declares collection {} but was sent to {}",
                id, declared, collection_id
            )))
        }
        Some(_) => {}
        None => {
            item.insert(
                "collection".to_string(),
                Value::String(collection_id.to_string()),
            );
        }
    }
    crate::links::strip_inferred(&mut item);
    Ok((id, item))
}

/// Field include/exclude sets for the fields extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsSpec {
    /// Dotted paths to keep.
    #[serde(default)]
    pub include: Vec<String>,
    /// Dotted paths to drop.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FieldsSpec {
    /// Parse the GET form: comma separated, `-` prefix excludes, `+` or no
    /// prefix includes.
    pub fn parse(param: &str) -> Self {
        let mut spec = Self::default();
        for field in param.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            if let Some(excluded) = field.strip_prefix('-') {
                spec.exclude.push(excluded.to_string());
            } else {
                spec.include.push(field.trim_start_matches('+').to_string());
            }
        }
        spec
    }

    /// Whether the projection changes nothing.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    /// Dotted path of the field, e.g. `properties.datetime`.
    pub field: String,
    /// Direction.
    #[serde(default)]
    pub direction: Direction,
}

impl SortBy {
    /// Parse the GET form: comma separated, `-` prefix sorts descending.
    pub fn parse_list(param: &str) -> Vec<Self> {
        param
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|field| match field.strip_prefix('-') {
                Some(desc) => SortBy {
                    field: desc.to_string(),
                    direction: Direction::Desc,
                },
                None => SortBy {
                    field: field.trim_start_matches('+').to_string(),
                    direction: Direction::Asc,
                },
            })
            .collect()
    }
}

/// Comparison operators of the query extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Substring.
    Contains,
    /// Member of a list.
    In,
}

impl std::str::FromStr for QueryOp {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(QueryOp::Eq),
            "neq" => Ok(QueryOp::Neq),
            "lt" => Ok(QueryOp::Lt),
            "lte" => Ok(QueryOp::Lte),
            "gt" => Ok(QueryOp::Gt),
            "gte" => Ok(QueryOp::Gte),
            "startsWith" => Ok(QueryOp::StartsWith),
            "endsWith" => Ok(QueryOp::EndsWith),
            "contains" => Ok(QueryOp::Contains),
            "in" => Ok(QueryOp::In),
            other => Err(ClientError::Validation(format!(
                "unsupported query operator `{}`",
                other
            ))),
        }
    }
}

/// Query extension expression: property name to operator name to operand.
///
/// Operator names are parsed with [`QueryOp::from_str`](std::str::FromStr)
/// when the expression is evaluated, so an unknown operator is a validation
/// error rather than a decoding error.
pub type QueryExpr = BTreeMap<String, BTreeMap<String, Value>>;

/// Item search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Search {
    /// Restrict to these collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    /// Restrict to these item ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Bounding box `[minx, miny, maxx, maxy]` that item bboxes must intersect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    /// RFC 3339 instant or `start/end` interval; `..` or empty leaves a side open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Paging token from a previous `next` link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Fields extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldsSpec>,
    /// Query extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryExpr>,
    /// Sort extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortby: Option<Vec<SortBy>>,
}

impl Search {
    /// Search restricted to a single collection.
    pub fn in_collection(collection_id: impl Into<String>) -> Self {
        Self {
            collections: Some(vec![collection_id.into()]),
            ..Self::default()
        }
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Page size after defaults and bounds.
    pub fn effective_limit(&self) -> Result<usize, ClientError> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(0) => Err(ClientError::Validation("limit must be at least 1".to_string())),
            Some(limit) if limit > MAX_LIMIT => Err(ClientError::Validation(format!(
                "limit must not exceed {}",
                MAX_LIMIT
            ))),
            Some(limit) => Ok(limit),
        }
    }

    /// Offset encoded in the paging token.
    pub fn offset(&self) -> Result<usize, ClientError> {
        match self.token.as_deref() {
            None | Some("") => Ok(0),
            Some(token) => token
                .strip_prefix("next:")
                .unwrap_or(token)
                .parse()
                .map_err(|_| ClientError::Validation(format!("invalid paging token `{}`", token))),
        }
    }

    /// Check the parts of the request that do not depend on a backend.
    pub fn validate(&self) -> Result<(), ClientError> {
        self.effective_limit()?;
        self.offset()?;
        if let Some(bbox) = &self.bbox {
            if bbox.len() != 4 && bbox.len() != 6 {
                return Err(ClientError::Validation(
                    "bbox must have 4 or 6 numbers".to_string(),
                ));
            }
        }
        if let Some(datetime) = &self.datetime {
            crate::search::DatetimeInterval::parse(datetime)?;
        }
        Ok(())
    }
}

/// Paging and count information returned with an item collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Items in this page.
    pub returned: usize,
    /// Requested page size.
    pub limit: usize,
    /// Items matching the search in total.
    pub matched: usize,
}

/// GeoJSON feature collection returned by item listings and searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    /// Always `FeatureCollection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Items in this page.
    pub features: Vec<Item>,
    /// Navigation links.
    #[serde(default)]
    pub links: Vec<Value>,
    /// Paging context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    /// Token for the next page, if any. Rendered into a `next` link.
    #[serde(skip)]
    pub next_token: Option<String>,
}

impl ItemCollection {
    /// Create a page of features.
    pub fn new(features: Vec<Item>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            links: Vec::new(),
            context: None,
            next_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_spec_parse() {
        let spec = FieldsSpec::parse("id,+properties.eo:cloud_cover,-geometry");
        assert_eq!(spec.include, vec!["id", "properties.eo:cloud_cover"]);
        assert_eq!(spec.exclude, vec!["geometry"]);
    }

    #[test]
    fn test_sortby_parse() {
        let sort = SortBy::parse_list("-properties.datetime,id");
        assert_eq!(sort[0].direction, Direction::Desc);
        assert_eq!(sort[0].field, "properties.datetime");
        assert_eq!(sort[1].direction, Direction::Asc);
    }

    #[test]
    fn test_search_deserializes_post_body() {
        let search: Search = serde_json::from_value(json!({
            "collections": ["landsat"],
            "limit": 5,
            "query": {"eo:cloud_cover": {"lt": 10}},
            "sortby": [{"field": "properties.datetime", "direction": "desc"}],
            "fields": {"include": ["id"]}
        }))
        .unwrap();
        assert_eq!(search.effective_limit().unwrap(), 5);
        let query = search.query.unwrap();
        assert_eq!(query["eo:cloud_cover"]["lt"], json!(10));
        assert_eq!(search.sortby.unwrap()[0].direction, Direction::Desc);
    }

    #[test]
    fn test_query_op_from_str() {
        assert_eq!("startsWith".parse::<QueryOp>().unwrap(), QueryOp::StartsWith);
        assert!("like".parse::<QueryOp>().is_err());
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(Search::default().effective_limit().unwrap(), DEFAULT_LIMIT);
        assert!(Search::default().with_limit(0).effective_limit().is_err());
        assert!(Search::default().with_limit(MAX_LIMIT + 1).effective_limit().is_err());
    }

    #[test]
    fn test_offset_token() {
        let mut search = Search::default();
        assert_eq!(search.offset().unwrap(), 0);
        search.token = Some("next:20".to_string());
        assert_eq!(search.offset().unwrap(), 20);
        search.token = Some("garbage".to_string());
        assert!(search.offset().is_err());
    }

    #[test]
    fn test_resource_id() {
        let item = json!({"id": "a"}).as_object().cloned().unwrap();
        assert_eq!(resource_id(&item).unwrap(), "a");
        let empty = Item::new();
        assert!(resource_id(&empty).is_err());
    }
}
