//! Load-many-by-ids helpers shared by every batched relation.
//!
//! A page of N rows references related entities (authors, users, media,
//! likes). Each helper collects the distinct keys, calls the loader once with
//! all of them, and indexes the result so assembly is a map lookup per row.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Distinct keys in first-seen order
pub fn unique_ids<T, K, F>(items: &[T], key_of: F) -> Vec<K>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for item in items {
        let key = key_of(item);
        if seen.insert(key.clone()) {
            ids.push(key);
        }
    }
    ids
}

/// Load entities for `ids` in one call and index them by key.
///
/// The loader is not called for an empty id list. Ids the loader does not
/// return are simply absent from the map.
pub fn load_keyed<K, V, E, L, F>(ids: &[K], loader: L, key_of: F) -> Result<HashMap<K, V>, E>
where
    K: Eq + Hash,
    L: FnOnce(&[K]) -> Result<Vec<V>, E>,
    F: Fn(&V) -> K,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(loader(ids)?
        .into_iter()
        .map(|value| (key_of(&value), value))
        .collect())
}

/// Load child rows for `ids` in one call and group them by parent key.
///
/// Rows keep the order the loader returned them in within each group.
pub fn load_grouped<K, V, E, L, F>(ids: &[K], loader: L, key_of: F) -> Result<HashMap<K, Vec<V>>, E>
where
    K: Eq + Hash,
    L: FnOnce(&[K]) -> Result<Vec<V>, E>,
    F: Fn(&V) -> K,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
    for value in loader(ids)? {
        grouped.entry(key_of(&value)).or_default().push(value);
    }
    Ok(grouped)
}
