//! Group index: which cache keys belong together.
//!
//! Every cached entry is registered under one or more group keys; clearing
//! a group deletes its members and recurses into nested groups (member
//! keys carrying the `group_` marker). Two strategies implement the same
//! contract:
//!
//! - [`SetIndexedGroups`] rides a backend's native tagged sets. The set
//!   holds entry keys whose stored values are the actual cache keys, so
//!   enumeration costs one more `get` per member.
//! - [`ListIndexedGroups`] needs nothing but plain key/value: the group key
//!   stores the member list as a serialized sequence.
//!
//! The strategy is chosen once, from the store's declared capability;
//! nothing branches on capability after construction.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use intarsia_core::{is_nested_group, CacheKey, GroupKey, IntarsiaResult, Tree};
use tracing::debug;

use crate::store::{GroupingCapability, Store};

/// Membership index over cache keys.
///
/// `add` only grows a group; `clear` is the only delete. Group records
/// never expire on their own.
#[async_trait]
pub trait GroupIndex: Send + Sync {
    /// Record keys as members of a group. An empty key slice is a no-op
    /// and must not create a group record.
    async fn add(&self, group: &GroupKey, keys: &[CacheKey]) -> IntarsiaResult<()>;

    /// Current members of a group. Unknown groups are empty.
    async fn members(&self, group: &GroupKey) -> IntarsiaResult<Vec<CacheKey>>;

    /// Delete every member of a group, recursing into nested groups, then
    /// delete the group record itself. Unknown groups are a no-op.
    async fn clear(&self, group: &GroupKey) -> IntarsiaResult<()>;
}

/// Pick the strategy matching the store's declared capability.
pub fn group_index_for<S: Store + 'static>(store: Arc<S>) -> Box<dyn GroupIndex> {
    match store.grouping() {
        GroupingCapability::SetIndexed => Box::new(SetIndexedGroups::new(store)),
        GroupingCapability::ListIndexed => Box::new(ListIndexedGroups::new(store)),
    }
}

// ============================================================================
// SET-INDEXED STRATEGY
// ============================================================================

/// Group index over native tagged sets.
///
/// Members are stored as tagged entries whose value is the member key
/// itself. The set enumerates entry keys, not member keys, so `members`
/// and `clear` resolve each entry with one more `get`.
pub struct SetIndexedGroups<S> {
    store: Arc<S>,
}

impl<S: Store> SetIndexedGroups<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn resolve_members(&self, group: &str) -> IntarsiaResult<Vec<String>> {
        let entry_keys = self.store.tag_entry_keys(group).await?;
        let mut members = Vec::with_capacity(entry_keys.len());
        for entry_key in entry_keys {
            match self.store.get(&entry_key).await? {
                Some(Tree::String(member)) if !member.is_empty() => members.push(member),
                // A vanished or malformed entry has nothing to clear.
                _ => {}
            }
        }
        Ok(members)
    }
}

#[async_trait]
impl<S: Store> GroupIndex for SetIndexedGroups<S> {
    async fn add(&self, group: &GroupKey, keys: &[CacheKey]) -> IntarsiaResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        for key in keys {
            let value = Tree::String(key.as_str().to_string());
            self.store
                .tag_forever(group.as_str(), key.as_str(), &value)
                .await?;
        }
        debug!(group = %group, keys = keys.len(), "registered keys in tagged group");
        Ok(())
    }

    async fn members(&self, group: &GroupKey) -> IntarsiaResult<Vec<CacheKey>> {
        Ok(self
            .resolve_members(group.as_str())
            .await?
            .into_iter()
            .map(CacheKey::from_raw)
            .collect())
    }

    async fn clear(&self, group: &GroupKey) -> IntarsiaResult<()> {
        // Worklist with a visited set, so cyclic group graphs terminate.
        let mut pending = vec![group.as_str().to_string()];
        let mut visited: HashSet<String> = HashSet::new();
        let mut cleared = 0usize;
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for member in self.resolve_members(&current).await? {
                if is_nested_group(&member) {
                    pending.push(member);
                } else {
                    self.store.forget(&member).await?;
                    cleared += 1;
                }
            }
            self.store.tag_flush(&current).await?;
        }
        debug!(group = %group, cleared, "cleared tagged group");
        Ok(())
    }
}

// ============================================================================
// LIST-INDEXED STRATEGY
// ============================================================================

/// Group index over plain key/value storage.
///
/// The group key stores its member keys as a serialized sequence.
/// `add` is read-union-rewrite and is not atomic across concurrent
/// writers: two writers can interleave between the read and the rewrite,
/// and the second write wins. Safety is bounded by the store's per-key
/// atomicity.
pub struct ListIndexedGroups<S> {
    store: Arc<S>,
}

impl<S: Store> ListIndexedGroups<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn read_list(&self, group: &str) -> IntarsiaResult<Vec<String>> {
        match self.store.get(group).await? {
            Some(Tree::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Tree::String(key) if !key.is_empty() => Some(key),
                    _ => None,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl<S: Store> GroupIndex for ListIndexedGroups<S> {
    async fn add(&self, group: &GroupKey, keys: &[CacheKey]) -> IntarsiaResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let current = self.read_list(group.as_str()).await?;
        let already_present = keys
            .iter()
            .all(|key| current.iter().any(|member| member == key.as_str()));
        if already_present {
            // Nothing new; skip the rewrite.
            return Ok(());
        }
        let mut union = current;
        for key in keys {
            if !union.iter().any(|member| member == key.as_str()) {
                union.push(key.as_str().to_string());
            }
        }
        let list = Tree::Array(union.into_iter().map(Tree::String).collect());
        self.store.set_forever(group.as_str(), &list).await?;
        debug!(group = %group, keys = keys.len(), "registered keys in group list");
        Ok(())
    }

    async fn members(&self, group: &GroupKey) -> IntarsiaResult<Vec<CacheKey>> {
        Ok(self
            .read_list(group.as_str())
            .await?
            .into_iter()
            .map(CacheKey::from_raw)
            .collect())
    }

    async fn clear(&self, group: &GroupKey) -> IntarsiaResult<()> {
        // Worklist with a visited set, so cyclic group graphs terminate.
        // Nested groups are only enqueued here; their member lists must
        // still be readable when they are popped.
        let mut pending = vec![group.as_str().to_string()];
        let mut visited: HashSet<String> = HashSet::new();
        let mut cleared = 0usize;
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for member in self.read_list(&current).await? {
                if is_nested_group(&member) {
                    pending.push(member);
                } else {
                    self.store.forget(&member).await?;
                    cleared += 1;
                }
            }
            self.store.forget(&current).await?;
        }
        debug!(group = %group, cleared, "cleared group");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
