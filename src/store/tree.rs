use super::path::{StorePath, WriteBatch, WriteMode};
use super::StoreError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Look up the node at `path`
pub fn get<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    match node {
        Value::Null => None,
        other => Some(other),
    }
}

/// Children of the node at `path`
pub fn children(root: &Value, path: &StorePath) -> BTreeMap<String, Value> {
    match get(root, path) {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Replace the node at `path`, creating intermediate objects. Non-object
/// intermediates are replaced. A `null` value removes the node.
pub fn set(root: &mut Value, path: &StorePath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let parent = ensure_object(node);
    if value.is_null() {
        parent.remove(last);
    } else {
        parent.insert(last.clone(), value);
    }
}

/// Validate then apply the batch, returning how many entries were written.
/// Create-only entries whose path is already occupied are left out.
pub fn apply(root: &mut Value, batch: &WriteBatch) -> Result<usize, StoreError> {
    batch.validate()?;
    let mut applied = 0;
    for (path, mode, value) in batch.iter() {
        if mode == WriteMode::CreateOnly && get(root, path).is_some() {
            continue;
        }
        set(root, path, value.clone());
        applied += 1;
    }
    Ok(applied)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
