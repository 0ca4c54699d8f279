use std::cmp::Ordering;

use serde_json::Value;

use super::lookup_property;
use crate::client::SortClient;
use crate::error::ClientResult;
use crate::types::{Direction, Item, SortBy};

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: values of different kinds order by kind
/// (null, bool, number, string, array, object), then by value.
fn total_cmp(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::Number(l), Value::Number(r)) => {
            let l = l.as_f64().unwrap_or(f64::NAN);
            let r = r.as_f64().unwrap_or(f64::NAN);
            l.total_cmp(&r)
        }
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Array(l), Value::Array(r)) => l
            .iter()
            .zip(r.iter())
            .map(|(l, r)| total_cmp(l, r))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| l.len().cmp(&r.len())),
        (Value::Object(l), Value::Object(r)) => l.len().cmp(&r.len()),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

/// Stable multi-key sort over JSON items. Missing values sort last in both
/// directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSort;

impl SortClient for JsonSort {
    fn sort(&self, items: &mut [Item], sortby: &[SortBy]) -> ClientResult<()> {
        items.sort_by(|a, b| {
            for key in sortby {
                let ordering = match (lookup_property(a, &key.field), lookup_property(b, &key.field)) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => return Ordering::Greater,
                    (Some(_), None) => return Ordering::Less,
                    (Some(l), Some(r)) => total_cmp(l, r),
                };
                let ordering = match key.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene(id: &str, cloud: Option<i64>) -> Item {
        let mut properties = serde_json::Map::new();
        if let Some(cloud) = cloud {
            properties.insert("eo:cloud_cover".to_string(), json!(cloud));
        }
        json!({"id": id, "properties": properties})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_sort_descending_with_missing_last() {
        let mut items = vec![scene("a", Some(5)), scene("b", None), scene("c", Some(40))];
        JsonSort
            .sort(&mut items, &SortBy::parse_list("-eo:cloud_cover"))
            .unwrap();
        assert_eq!(ids(&items), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_secondary_key() {
        let mut items = vec![scene("b", Some(5)), scene("a", Some(5)), scene("c", Some(1))];
        JsonSort
            .sort(&mut items, &SortBy::parse_list("eo:cloud_cover,id"))
            .unwrap();
        assert_eq!(ids(&items), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sort_mixed_types_is_total() {
        let mut items: Vec<Item> = (0..2000)
            .map(|i| {
                let k = if i % 3 == 0 {
                    json!(format!("s{}", (i * 7919) % 2000))
                } else {
                    json!((i * 7919) % 2000)
                };
                json!({"id": format!("item-{}", i), "properties": {"k": k}})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        JsonSort.sort(&mut items, &SortBy::parse_list("k")).unwrap();

        let keys: Vec<&Value> = items.iter().map(|i| &i["properties"]["k"]).collect();
        let first_string = keys.iter().position(|k| k.is_string()).unwrap();
        assert_eq!(first_string, 1333);
        assert!(keys[..first_string].iter().all(|k| k.is_number()));
        assert!(keys[first_string..].iter().all(|k| k.is_string()));
        for pair in keys.windows(2) {
            assert_ne!(total_cmp(pair[0], pair[1]), Ordering::Greater);
        }

        JsonSort.sort(&mut items, &SortBy::parse_list("-k")).unwrap();
        assert!(items[0]["properties"]["k"].is_string());
        assert!(items[1999]["properties"]["k"].is_number());
    }
}
