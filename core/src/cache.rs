//! On-disk cache of derived encryption tables, keyed by password.
//!
//! Deriving a table costs 1023 stable sorts; the remote dispatcher may
//! consult this cache to skip that cost on a warm restart. The format is a
//! flat JSON map (password -> 256-byte encode array); unknown or stale
//! entries already present in the file are preserved verbatim rather than
//! pruned, so the file survives being shared across dispatcher versions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::table::EncryptionTable;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TableCache {
    #[serde(flatten)]
    entries: HashMap<String, [u8; 256]>,
}

impl TableCache {
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)
    }

    /// Returns the cached table for `password`, if present.
    pub fn get(&self, password: &str) -> Option<EncryptionTable> {
        self.entries
            .get(password)
            .map(|encode| EncryptionTable::from_encode(*encode))
    }

    /// Inserts (or refreshes) the entry for `password`.
    pub fn insert(&mut self, password: String, table: &EncryptionTable) {
        self.entries.insert(password, *table.encode());
    }
}

/// Returns the table for `password`, consulting `cache` first when
/// provided and persisting a freshly-derived table back into it.
pub fn table_for(password: &str, cache: Option<(&mut TableCache, &Path)>) -> EncryptionTable {
    if let Some((cache, path)) = cache {
        if let Some(table) = cache.get(password) {
            return table;
        }
        let table = EncryptionTable::new(password);
        cache.insert(password.to_string(), &table);
        if let Err(e) = cache.save(path) {
            log::warn!("failed to persist table cache to {}: {e}", path.display());
        }
        return table;
    }
    EncryptionTable::new(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_the_same_table_without_rederiving() {
        let mut cache = TableCache::default();
        let derived = EncryptionTable::new("swordfish");
        cache.insert("swordfish".to_string(), &derived);

        let hit = cache.get("swordfish").expect("cache hit");
        assert_eq!(hit.encode(), derived.encode());
    }

    #[test]
    fn miss_returns_none() {
        let cache = TableCache::default();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn unknown_entries_survive_a_round_trip() {
        let mut cache = TableCache::default();
        cache.insert("kept".to_string(), &EncryptionTable::new("kept"));
        let json = serde_json::to_string(&cache).unwrap();
        let reloaded: TableCache = serde_json::from_str(&json).unwrap();
        assert!(reloaded.get("kept").is_some());
    }
}
