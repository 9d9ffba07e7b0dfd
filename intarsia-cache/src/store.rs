//! Store backend contract.
//!
//! The cache layer runs against any key/value store with write-once-forever
//! semantics: `set_forever` has no expiry and entries disappear only through
//! `forget` or a group invalidation. Backends additionally declare how group
//! membership should be indexed.

use std::collections::HashMap;

use async_trait::async_trait;
use intarsia_core::{IntarsiaResult, StoreError, Tree};
use serde::{Deserialize, Serialize};

/// How a backend can index group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingCapability {
    /// The backend keeps native tagged sets; the `tag_*` operations work.
    SetIndexed,
    /// Plain key/value only; groups are stored as serialized member lists.
    ListIndexed,
}

/// Backend contract the cache layer runs against.
///
/// # Capability model
///
/// [`Store::grouping`] declares how the group index is maintained. A
/// `SetIndexed` backend must implement the three `tag_*` operations; a
/// `ListIndexed` backend leaves them at their defaults, which return
/// [`StoreError::TagsUnsupported`]. The group index picks its strategy from
/// this flag once, at construction.
///
/// # Failure semantics
///
/// Store failures are surfaced as [`StoreError`] values and propagated
/// unchanged; the cache layer never retries on behalf of a backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one value.
    async fn get(&self, key: &str) -> IntarsiaResult<Option<Tree>>;

    /// Fetch many values. Missing keys are absent from the result map.
    ///
    /// The default implementation loops [`Store::get`]; backends with a
    /// native multi-get should override it.
    async fn get_many(&self, keys: &[String]) -> IntarsiaResult<HashMap<String, Tree>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Store a value with no expiry. Rewriting a key is allowed; the cache
    /// layer only ever rewrites a key with identical content.
    async fn set_forever(&self, key: &str, value: &Tree) -> IntarsiaResult<()>;

    /// Remove one value. Unknown keys are not an error.
    async fn forget(&self, key: &str) -> IntarsiaResult<()>;

    /// How this backend indexes group membership.
    fn grouping(&self) -> GroupingCapability;

    /// Store a value as an entry of a tagged set (set-indexed backends).
    /// The entry lives under a backend-chosen entry key that plain
    /// [`Store::get`] can fetch.
    async fn tag_forever(&self, _tag: &str, _key: &str, _value: &Tree) -> IntarsiaResult<()> {
        Err(StoreError::TagsUnsupported.into())
    }

    /// Enumerate the entry keys currently in a tagged set. Each entry key
    /// resolves to its stored value through plain [`Store::get`].
    async fn tag_entry_keys(&self, _tag: &str) -> IntarsiaResult<Vec<String>> {
        Err(StoreError::TagsUnsupported.into())
    }

    /// Drop a tagged set: its entries and its index records.
    async fn tag_flush(&self, _tag: &str) -> IntarsiaResult<()> {
        Err(StoreError::TagsUnsupported.into())
    }
}
