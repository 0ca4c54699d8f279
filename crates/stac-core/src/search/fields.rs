use serde_json::{Map, Value};

use crate::client::FieldsClient;
use crate::types::{FieldsSpec, Item};

/// Fields always returned when an include list is given.
pub const DEFAULT_INCLUDES: &[&str] = &[
    "id",
    "type",
    "stac_version",
    "geometry",
    "bbox",
    "links",
    "assets",
    "collection",
    "properties.datetime",
];

/// Dotted-path projection over JSON items.
///
/// With an include list, the result holds the default includes plus the
/// listed paths; without one it holds the whole item. Excludes are removed
/// afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFields;

fn copy_path(source: &Map<String, Value>, target: &mut Map<String, Value>, path: &[&str]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let Some(value) = source.get(*first) else {
        return;
    };
    if rest.is_empty() {
        target.insert(first.to_string(), value.clone());
        return;
    }
    let Some(inner) = value.as_object() else {
        return;
    };
    let slot = target
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(slot) = slot {
        copy_path(inner, slot, rest);
    }
}

fn remove_path(target: &mut Map<String, Value>, path: &[&str]) {
    match path {
        [] => {}
        [last] => {
            target.remove(*last);
        }
        [first, rest @ ..] => {
            if let Some(Value::Object(inner)) = target.get_mut(*first) {
                remove_path(inner, rest);
            }
        }
    }
}

impl FieldsClient for JsonFields {
    fn project(&self, item: Item, fields: &FieldsSpec) -> Item {
        let mut projected = if fields.include.is_empty() {
            item
        } else {
            let mut kept = Map::new();
            let includes = DEFAULT_INCLUDES
                .iter()
                .copied()
                .chain(fields.include.iter().map(String::as_str));
            for path in includes {
                let segments: Vec<&str> = path.split('.').collect();
                copy_path(&item, &mut kept, &segments);
            }
            kept
        };

        for path in &fields.exclude {
            let segments: Vec<&str> = path.split('.').collect();
            remove_path(&mut projected, &segments);
        }
        projected
    }
}
