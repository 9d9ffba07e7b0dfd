//! In-memory store backend.
//!
//! `MemoryStore` is the reference backend: fully functional, no
//! persistence. It can present either grouping capability, which is how the
//! group-index strategies are exercised against one implementation.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use intarsia_core::{IntarsiaResult, StoreError, Tree};
use tokio::sync::RwLock;

use crate::store::{GroupingCapability, Store};

/// In-memory key/value store with optional tagged-set support.
pub struct MemoryStore {
    grouping: GroupingCapability,
    entries: RwLock<HashMap<String, Tree>>,
    // tag -> entry keys; entry values live in `entries` under a
    // `tag:`-prefixed namespace.
    tag_sets: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryStore {
    /// A store that advertises plain key/value grouping.
    pub fn list_indexed() -> Self {
        Self::new(GroupingCapability::ListIndexed)
    }

    /// A store that advertises native tagged sets.
    pub fn set_indexed() -> Self {
        Self::new(GroupingCapability::SetIndexed)
    }

    pub fn new(grouping: GroupingCapability) -> Self {
        Self {
            grouping,
            entries: RwLock::new(HashMap::new()),
            tag_sets: RwLock::new(HashMap::new()),
        }
    }

    fn tag_entry_key(tag: &str, key: &str) -> String {
        format!("tag:{}:{}", tag, key)
    }

    /// Number of stored entries, tagged entries included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// All stored keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop every entry and every tag set.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.tag_sets.write().await.clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::list_indexed()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> IntarsiaResult<Option<Tree>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> IntarsiaResult<HashMap<String, Tree>> {
        let entries = self.entries.read().await;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = entries.get(key) {
                found.insert(key.clone(), value.clone());
            }
        }
        Ok(found)
    }

    async fn set_forever(&self, key: &str, value: &Tree) -> IntarsiaResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn forget(&self, key: &str) -> IntarsiaResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn grouping(&self) -> GroupingCapability {
        self.grouping
    }

    async fn tag_forever(&self, tag: &str, key: &str, value: &Tree) -> IntarsiaResult<()> {
        if self.grouping != GroupingCapability::SetIndexed {
            return Err(StoreError::TagsUnsupported.into());
        }
        let entry_key = Self::tag_entry_key(tag, key);
        self.entries
            .write()
            .await
            .insert(entry_key.clone(), value.clone());
        self.tag_sets
            .write()
            .await
            .entry(tag.to_string())
            .or_default()
            .insert(entry_key);
        Ok(())
    }

    async fn tag_entry_keys(&self, tag: &str) -> IntarsiaResult<Vec<String>> {
        if self.grouping != GroupingCapability::SetIndexed {
            return Err(StoreError::TagsUnsupported.into());
        }
        Ok(self
            .tag_sets
            .read()
            .await
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn tag_flush(&self, tag: &str) -> IntarsiaResult<()> {
        if self.grouping != GroupingCapability::SetIndexed {
            return Err(StoreError::TagsUnsupported.into());
        }
        if let Some(entry_keys) = self.tag_sets.write().await.remove(tag) {
            let mut entries = self.entries.write().await;
            for entry_key in entry_keys {
                entries.remove(&entry_key);
            }
        }
        Ok(())
    }
}
