//! In-memory search evaluation over JSON items.
//!
//! Backends use [`matches_base`] for the predicates every search supports.
//! The fields, query and sort extensions use [`JsonFields`], [`JsonQuery`]
//! and [`JsonSort`].

mod fields;
mod query;
mod sort;

pub use fields::{JsonFields, DEFAULT_INCLUDES};
pub use query::JsonQuery;
pub use sort::JsonSort;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::types::{item_collection_id, Item, Search};

/// Value at a dotted path such as `properties.eo:cloud_cover`.
pub fn lookup<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = item.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Value of a property name as used by the query and sort extensions: the
/// dotted path from the item root if it resolves, else `properties.<name>`.
pub fn lookup_property<'a>(item: &'a Item, name: &str) -> Option<&'a Value> {
    lookup(item, name).or_else(|| {
        item.get("properties")
            .and_then(Value::as_object)
            .and_then(|properties| properties.get(name))
    })
}

/// Closed or half-open datetime interval from a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeInterval {
    /// Inclusive start; `None` is open.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive end; `None` is open.
    pub end: Option<DateTime<Utc>>,
}

impl DatetimeInterval {
    /// Parse an RFC 3339 instant or a `start/end` interval where either side
    /// may be `..` or empty.
    pub fn parse(value: &str) -> ClientResult<Self> {
        let bound = |part: &str| -> ClientResult<Option<DateTime<Utc>>> {
            let part = part.trim();
            if part.is_empty() || part == ".." {
                return Ok(None);
            }
            parse_instant(part).map(Some)
        };

        match value.split_once('/') {
            Some((start, end)) => {
                let interval = Self {
                    start: bound(start)?,
                    end: bound(end)?,
                };
                if interval.start.is_none() && interval.end.is_none() {
                    return Err(ClientError::Validation(
                        "datetime interval must have at least one bound".to_string(),
                    ));
                }
                if let (Some(start), Some(end)) = (interval.start, interval.end) {
                    if start > end {
                        return Err(ClientError::Validation(format!(
                            "datetime interval start {} is after end {}",
                            start, end
                        )));
                    }
                }
                Ok(interval)
            }
            None => {
                let instant = parse_instant(value.trim())?;
                Ok(Self {
                    start: Some(instant),
                    end: Some(instant),
                })
            }
        }
    }

    /// Whether `[start, end]` overlaps this interval.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let after_start = self.start.map_or(true, |s| end >= s);
        let before_end = self.end.map_or(true, |e| start <= e);
        after_start && before_end
    }
}

fn parse_instant(value: &str) -> ClientResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClientError::Validation(format!("invalid datetime `{}`: {}", value, e)))
}

/// Time span of an item: `properties.datetime`, or the
/// `start_datetime`/`end_datetime` pair when it is null.
pub fn item_time_range(item: &Item) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let properties = item.get("properties")?.as_object()?;
    let instant = |key: &str| {
        properties
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| parse_instant(s).ok())
    };
    match instant("datetime") {
        Some(dt) => Some((dt, dt)),
        None => Some((instant("start_datetime")?, instant("end_datetime")?)),
    }
}

fn planar_bbox(values: &[f64]) -> Option<[f64; 4]> {
    match values {
        [minx, miny, maxx, maxy] => Some([*minx, *miny, *maxx, *maxy]),
        [minx, miny, _, maxx, maxy, _] => Some([*minx, *miny, *maxx, *maxy]),
        _ => None,
    }
}

fn item_bbox(item: &Item) -> Option<[f64; 4]> {
    let values: Option<Vec<f64>> = item
        .get("bbox")?
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect();
    planar_bbox(&values?)
}

/// Whether two planar boxes intersect (touching counts).
pub fn bbox_intersects(a: &[f64], b: &[f64]) -> bool {
    match (planar_bbox(a), planar_bbox(b)) {
        (Some(a), Some(b)) => a[0] <= b[2] && b[0] <= a[2] && a[1] <= b[3] && b[1] <= a[3],
        _ => false,
    }
}

/// Whether `item` satisfies the `collections`, `ids`, `bbox` and `datetime`
/// members of `search`.
pub fn matches_base(item: &Item, search: &Search) -> ClientResult<bool> {
    if let Some(collections) = &search.collections {
        let collection = item_collection_id(item).unwrap_or_default();
        if !collections.iter().any(|c| c == collection) {
            return Ok(false);
        }
    }
    if let Some(ids) = &search.ids {
        let id = item.get("id").and_then(Value::as_str).unwrap_or_default();
        if !ids.iter().any(|i| i == id) {
            return Ok(false);
        }
    }
    if let Some(bbox) = &search.bbox {
        match item_bbox(item) {
            Some(item_box) if bbox_intersects(&item_box, bbox) => {}
            _ => return Ok(false),
        }
    }
    if let Some(datetime) = &search.datetime {
        let interval = DatetimeInterval::parse(datetime)?;
        match item_time_range(item) {
            Some((start, end)) if interval.overlaps(start, end) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
