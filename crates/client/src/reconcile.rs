//! Reconciliation of a local list against authoritative server state.
//!
//! Both order reloads and shift plan saves end with a fresh server list that
//! has to replace whatever the client was showing, without losing persisted
//! identity and without ever keeping a temporary id once the server has
//! answered for the same natural key.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use countertop_core::{EntityId, RemoteEntity};

/// What to do with persisted local entries the server did not return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retain {
    /// Keep them. Used when the server list may be a partial view.
    Persisted,
    /// Drop them. Used when the server list is the complete collection.
    ServerOnly,
}

/// Merge `server` into `local`.
///
/// - Server entries sharing a key collapse to the preferred one (smallest
///   [`EntityId`]: persisted before temporary, then the smaller id).
/// - Local order is kept: a local entry whose key the server knows is replaced
///   by the server entry, once per key.
/// - Local entries the server does not know are dropped when temporary, and
///   kept or dropped per `retain` when persisted.
/// - Server-only entries are appended in server order.
///
/// `merge(&merge(l, s, k, r), s, k, r) == merge(l, s, k, r)`.
pub fn merge<T, K, F>(local: &[T], server: &[T], key_fn: F, retain: Retain) -> Vec<T>
where
    T: RemoteEntity + Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let preferred = preferred_by_key(server, &key_fn);

    let mut emitted: HashSet<K> = HashSet::new();
    let mut merged = Vec::with_capacity(server.len().max(local.len()));

    // Persisted local-only entries compete per key like server entries do.
    let mut kept_local: HashMap<K, (usize, EntityId)> = HashMap::new();
    if retain == Retain::Persisted {
        for (index, entry) in local.iter().enumerate() {
            let id = entry.entity_id();
            let key = key_fn(entry);
            if !id.is_persisted() || preferred.contains_key(&key) {
                continue;
            }
            kept_local
                .entry(key)
                .and_modify(|current| {
                    if id < current.1 {
                        *current = (index, id);
                    }
                })
                .or_insert((index, id));
        }
    }

    for (index, entry) in local.iter().enumerate() {
        let key = key_fn(entry);
        if emitted.contains(&key) {
            continue;
        }
        if let Some(server_entry) = preferred.get(&key) {
            merged.push((*server_entry).clone());
            emitted.insert(key);
        } else if kept_local.get(&key).is_some_and(|(kept, _)| *kept == index) {
            merged.push(entry.clone());
            emitted.insert(key);
        }
    }

    for entry in server {
        let key = key_fn(entry);
        if emitted.contains(&key) {
            continue;
        }
        if let Some(preferred_entry) = preferred.get(&key) {
            merged.push((*preferred_entry).clone());
            emitted.insert(key);
        }
    }

    merged
}

/// Collapse entries sharing a key to the preferred one, keeping first-seen
/// order of keys.
pub fn dedupe<T, K, F>(list: &[T], key_fn: F) -> Vec<T>
where
    T: RemoteEntity + Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let preferred = preferred_by_key(list, &key_fn);
    let mut emitted: HashSet<K> = HashSet::new();

    list.iter()
        .filter_map(|entry| {
            let key = key_fn(entry);
            let chosen = preferred.get(&key)?;
            emitted.insert(key).then(|| (*chosen).clone())
        })
        .collect()
}

/// Replace the entry at `index` with `updated`. Out-of-range is a no-op.
pub fn patch<T>(list: &mut [T], index: usize, updated: T) -> bool {
    list.get_mut(index).map(|slot| *slot = updated).is_some()
}

/// Remove the entry at `index`. Out-of-range is a no-op.
pub fn remove<T>(list: &mut Vec<T>, index: usize) -> Option<T> {
    (index < list.len()).then(|| list.remove(index))
}

fn preferred_by_key<'a, T, K, F, I>(entries: I, key_fn: &F) -> HashMap<K, &'a T>
where
    T: RemoteEntity + 'a,
    K: Eq + Hash,
    F: Fn(&T) -> K,
    I: IntoIterator<Item = &'a T>,
{
    let mut preferred: HashMap<K, &'a T> = HashMap::new();
    for entry in entries {
        preferred
            .entry(key_fn(entry))
            .and_modify(|current| {
                if entry.entity_id() < current.entity_id() {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    preferred
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use countertop_core::{ShiftId, TempId};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        id: EntityId,
        key: &'static str,
        value: u32,
    }

    impl RemoteEntity for Row {
        fn entity_id(&self) -> EntityId {
            self.id
        }
    }

    fn persisted(id: i64, key: &'static str, value: u32) -> Row {
        Row {
            id: ShiftId::new(id).into(),
            key,
            value,
        }
    }

    fn temporary(id: i64, key: &'static str) -> Row {
        Row {
            id: TempId::new(id).into(),
            key,
            value: 0,
        }
    }

    fn by_key(row: &Row) -> &'static str {
        row.key
    }

    #[test]
    fn test_server_replaces_local_in_local_order() {
        let local = vec![persisted(1, "a", 1), persisted(2, "b", 1)];
        let server = vec![persisted(2, "b", 9), persisted(1, "a", 9)];

        let merged = merge(&local, &server, by_key, Retain::ServerOnly);

        assert_eq!(merged, vec![persisted(1, "a", 9), persisted(2, "b", 9)]);
    }

    #[test]
    fn test_temporary_local_never_survives() {
        let local = vec![temporary(1_000, "a"), temporary(1_001, "z")];
        let server = vec![persisted(7, "a", 3)];

        let merged = merge(&local, &server, by_key, Retain::Persisted);

        assert_eq!(merged, vec![persisted(7, "a", 3)]);
    }

    #[test]
    fn test_persisted_preferred_over_temporary_on_server() {
        let server = vec![temporary(1_000, "a"), persisted(7, "a", 3)];

        let merged = merge(&[], &server, by_key, Retain::ServerOnly);

        assert_eq!(merged, vec![persisted(7, "a", 3)]);
    }

    #[test]
    fn test_smaller_persisted_id_wins() {
        let server = vec![persisted(9, "a", 1), persisted(4, "a", 2)];
        let merged = merge(&[], &server, by_key, Retain::ServerOnly);
        assert_eq!(merged, vec![persisted(4, "a", 2)]);
    }

    #[test]
    fn test_retain_policy_for_persisted_local_only() {
        let local = vec![persisted(1, "gone", 1), persisted(2, "b", 1)];
        let server = vec![persisted(2, "b", 2)];

        let kept = merge(&local, &server, by_key, Retain::Persisted);
        let dropped = merge(&local, &server, by_key, Retain::ServerOnly);

        assert_eq!(kept, vec![persisted(1, "gone", 1), persisted(2, "b", 2)]);
        assert_eq!(dropped, vec![persisted(2, "b", 2)]);
    }

    #[test]
    fn test_retained_local_duplicates_collapse() {
        let local = vec![persisted(5, "x", 1), persisted(3, "x", 2)];

        let merged = merge(&local, &[], by_key, Retain::Persisted);

        assert_eq!(merged, vec![persisted(3, "x", 2)]);
    }

    #[test]
    fn test_server_only_entries_appended() {
        let local = vec![persisted(1, "a", 1)];
        let server = vec![persisted(3, "c", 1), persisted(1, "a", 1), persisted(2, "b", 1)];

        let keys: Vec<_> = merge(&local, &server, by_key, Retain::ServerOnly)
            .iter()
            .map(|r| r.key)
            .collect();

        assert_eq!(keys, ["a", "c", "b"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = vec![
            temporary(1_000, "a"),
            persisted(1, "b", 1),
            persisted(8, "d", 1),
            persisted(6, "d", 2),
        ];
        let server = vec![
            persisted(4, "a", 1),
            temporary(1_002, "c"),
            persisted(2, "a", 1),
            persisted(3, "c", 1),
        ];

        for retain in [Retain::Persisted, Retain::ServerOnly] {
            let once = merge(&local, &server, by_key, retain);
            let twice = merge(&once, &server, by_key, retain);
            assert_eq!(once, twice, "{retain:?}");
        }
    }

    #[test]
    fn test_dedupe_keeps_first_seen_key_order() {
        let list = vec![
            temporary(1_000, "b"),
            persisted(1, "a", 1),
            persisted(2, "b", 1),
        ];

        let deduped = dedupe(&list, by_key);

        assert_eq!(deduped, vec![persisted(2, "b", 1), persisted(1, "a", 1)]);
    }

    #[test]
    fn test_patch_and_remove_out_of_range() {
        let mut list = vec![persisted(1, "a", 1)];
        assert!(!patch(&mut list, 3, persisted(2, "b", 1)));
        assert!(remove(&mut list, 3).is_none());
        assert!(patch(&mut list, 0, persisted(1, "a", 2)));
        assert_eq!(list[0].value, 2);
        assert_eq!(remove(&mut list, 0).unwrap().key, "a");
        assert!(list.is_empty());
    }
}
