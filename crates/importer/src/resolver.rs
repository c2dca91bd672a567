//! Deduplicator / resolver
//!
//! Collapses staged rows to one record per natural key and maps free-text
//! foreign-key references onto surrogate ids already persisted in the store.
//! Resolution precedence is expressed as an ordered list of strategies so the
//! slug-first, normalized-name-fallback rule stays auditable in one place.

use std::collections::HashMap;

/// Result of a deduplication pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduped<T> {
    /// One record per distinct key, in first-occurrence order
    pub unique: Vec<T>,
    /// How many input records were collapsed away
    pub duplicates: usize,
}

/// Collapse records sharing a key to a single record.
///
/// First-occurrence order is preserved; when a key repeats, the values from
/// the final record win (deterministic last-wins). Only the count of dropped
/// records is returned, not the records themselves.
pub fn dedupe_by_key<T, K, F>(records: Vec<T>, key_fn: F) -> Deduped<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut unique: Vec<T> = Vec::with_capacity(records.len());
    let mut seen: HashMap<K, usize> = HashMap::new();
    let mut duplicates = 0;

    for record in records {
        let key = key_fn(&record);
        match seen.get(&key) {
            Some(&idx) => {
                unique[idx] = record;
                duplicates += 1;
            }
            None => {
                seen.insert(key, unique.len());
                unique.push(record);
            }
        }
    }

    Deduped { unique, duplicates }
}

/// Key -> surrogate id map built from rows already persisted in the store
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    entries: HashMap<String, i64>,
}

impl Lookup {
    /// Build from (key, id) pairs. When multiple persisted rows normalize to
    /// the same key, the first one encountered wins (deterministic by input
    /// order).
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut entries = HashMap::new();
        for (key, id) in pairs {
            entries.entry(key).or_insert(id);
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One step in a foreign-key resolution pipeline: derive a matching key from
/// the raw reference text, then look it up.
pub struct Strategy<'a> {
    pub key_fn: fn(&str) -> String,
    pub lookup: &'a Lookup,
}

impl<'a> Strategy<'a> {
    pub fn new(key_fn: fn(&str) -> String, lookup: &'a Lookup) -> Self {
        Self { key_fn, lookup }
    }

    fn resolve(&self, raw: &str) -> Option<i64> {
        let key = (self.key_fn)(raw);
        if key.is_empty() {
            return None;
        }
        self.lookup.get(&key)
    }
}

/// Try each strategy in order; the first hit wins. Returns `None` when no
/// strategy resolves — the caller decides whether that is fatal for the row
/// (it is for Medicine -> Generic, nullable for the other references).
pub fn resolve_reference(raw: &str, strategies: &[Strategy<'_>]) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    strategies.iter().find_map(|s| s.resolve(raw))
}
