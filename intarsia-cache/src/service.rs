//! The cache facade: serialize once, read many, invalidate by group.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use intarsia_core::{
    CacheConfig, CacheKey, Cacheable, GroupKey, IntarsiaResult, QueryShape, Tree,
};

use crate::groups::{group_index_for, GroupIndex};
use crate::registry::TransformerSet;
use crate::splice::Splicer;
use crate::store::Store;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// One serialize-and-cache request: the objects, the dispatch table that
/// picks a transformer per object, and the query shape folded into every
/// derived key.
pub struct BatchRequest<'a> {
    objects: Vec<&'a dyn Cacheable>,
    transformers: TransformerSet,
    shape: QueryShape,
    extra_keys: Vec<CacheKey>,
}

impl<'a> BatchRequest<'a> {
    pub fn new(objects: Vec<&'a dyn Cacheable>, transformers: TransformerSet) -> Self {
        Self {
            objects,
            transformers,
            shape: QueryShape::default(),
            extra_keys: Vec::new(),
        }
    }

    /// Single-object convenience.
    pub fn single(object: &'a dyn Cacheable, transformers: TransformerSet) -> Self {
        Self::new(vec![object], transformers)
    }

    /// The query shape the transformer output depends on. Shapes are
    /// canonicalized during key derivation, so list order does not matter.
    pub fn with_shape(mut self, shape: QueryShape) -> Self {
        self.shape = shape;
        self
    }

    /// Caller-provided keys registered into each object's group alongside
    /// the derived key. Nesting transformers use this to propagate outer
    /// keys into inner objects' groups, so invalidating an inner object
    /// also drops the outer entries built from it.
    pub fn with_extra_keys(mut self, keys: Vec<CacheKey>) -> Self {
        self.extra_keys = keys;
        self
    }
}

/// One read-path result. `value` is `None` when the key missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: CacheKey,
    pub value: Option<Tree>,
}

impl CachedEntry {
    pub fn is_hit(&self) -> bool {
        self.value.is_some()
    }
}

// ============================================================================
// CACHE SERVICE
// ============================================================================

/// Write-once memoization of transformer output over a [`Store`].
///
/// # Write path
///
/// [`cache_items`](Self::cache_items) derives a deterministic key per
/// object, registers it (plus any caller keys) in the object's group, and
/// on a miss runs the transformer, extracts marked subtrees into
/// content-addressed fragments, and stores fragments before the stripped
/// entry that points at them.
///
/// # Read path
///
/// [`get_cached_items`](Self::get_cached_items) batch-fetches the stored
/// trees, gathers referenced fragments to a fixed point, and splices them
/// back in. Misses keep their position in the output.
///
/// # Invalidation
///
/// Entries never expire. [`clear_cache_keys`](Self::clear_cache_keys)
/// drops everything registered for one object, recursing through nested
/// groups.
pub struct CacheService<S: Store + 'static> {
    store: Arc<S>,
    groups: Box<dyn GroupIndex>,
    config: CacheConfig,
    splicer: OnceCell<Splicer>,
}

impl<S: Store + 'static> CacheService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: CacheConfig) -> Self {
        let groups = group_index_for(store.clone());
        Self {
            store,
            groups,
            config,
            splicer: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn splicer(&self) -> &Splicer {
        self.splicer
            .get_or_init(|| Splicer::new(self.config.markers.clone()))
    }

    // ===== write path =====

    /// Serialize and cache a batch, returning the stored trees in input
    /// order. Objects with no matching transformer are skipped.
    ///
    /// Returned trees are the stored form: extracted subtrees appear as
    /// fragment pointers, not inline. The read path splices them back.
    pub async fn cache_items(&self, request: &BatchRequest<'_>) -> IntarsiaResult<Vec<Tree>> {
        Ok(self
            .cache_batch(request)
            .await?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Same flow as [`cache_items`](Self::cache_items), returning the
    /// derived keys instead of the values.
    pub async fn cache_item_keys(
        &self,
        request: &BatchRequest<'_>,
    ) -> IntarsiaResult<Vec<CacheKey>> {
        Ok(self
            .cache_batch(request)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    async fn cache_batch(
        &self,
        request: &BatchRequest<'_>,
    ) -> IntarsiaResult<Vec<(CacheKey, Tree)>> {
        let mut results = Vec::with_capacity(request.objects.len());
        for object in &request.objects {
            let object = *object;
            let transformer = match request.transformers.resolve(object) {
                Some(transformer) => transformer,
                None => {
                    debug!(
                        type_tag = object.type_tag(),
                        identity = %object.identity(),
                        "no transformer matched; skipping object"
                    );
                    continue;
                }
            };

            let key = CacheKey::transform(
                transformer.identity(),
                &request.shape,
                object,
                self.config.fingerprint,
            );
            let group = GroupKey::for_object(object);

            // Registration runs on every call, hit or miss. The group
            // index skips writes that add nothing, and the transformer
            // sink is how nesting transformers learn the outer keys.
            let mut registered = Vec::with_capacity(1 + request.extra_keys.len());
            registered.push(key.clone());
            registered.extend(request.extra_keys.iter().cloned());
            self.groups.add(&group, &registered).await?;
            transformer.add_cache_keys(&registered);

            let value = match self.store.get(key.as_str()).await? {
                Some(value) => {
                    debug!(key = %key, "transform cache hit");
                    value
                }
                None => {
                    debug!(key = %key, "transform cache miss");
                    let tree = transformer.transform(object, &request.shape).await?;
                    let extraction = self.splicer().extract(&tree);
                    // Fragments land before the entry that points at them.
                    for (fragment_key, body) in &extraction.fragments {
                        self.store.set_forever(fragment_key.as_str(), body).await?;
                    }
                    self.store.set_forever(key.as_str(), &extraction.stripped).await?;
                    self.groups.add(&group, &extraction.fragment_keys()).await?;
                    extraction.stripped
                }
            };
            results.push((key, value));
        }
        Ok(results)
    }

    // ===== read path =====

    /// Fetch stored trees and splice their fragments back in. One entry
    /// per requested key, in request order; misses carry `None`.
    pub async fn get_cached_items(&self, keys: &[CacheKey]) -> IntarsiaResult<Vec<CachedEntry>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: Vec<String> = keys.iter().map(|key| key.as_str().to_string()).collect();
        let fetched = self.store.get_many(&wanted).await?;
        let resolvable = self.gather_resolvable(&fetched).await?;

        let splicer = self.splicer();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = fetched
                .get(key.as_str())
                .map(|tree| splicer.resolve(tree, &resolvable));
            if value.is_none() {
                debug!(key = %key, "cache miss");
            }
            entries.push(CachedEntry {
                key: key.clone(),
                value,
            });
        }
        Ok(entries)
    }

    /// Everything the resolver may need: the fetched roots plus all
    /// fragments reachable from them. Fragments can reference further
    /// fragments, so gathering iterates one store round-trip per level,
    /// bounded by `max_resolve_passes`.
    async fn gather_resolvable(
        &self,
        roots: &HashMap<String, Tree>,
    ) -> IntarsiaResult<HashMap<String, Tree>> {
        let splicer = self.splicer();
        let mut resolvable = roots.clone();
        let mut wanted = BTreeSet::new();
        for tree in roots.values() {
            for key in splicer.pointer_keys(tree) {
                if !resolvable.contains_key(&key) {
                    wanted.insert(key);
                }
            }
        }

        let mut passes = 0;
        while !wanted.is_empty() && passes < self.config.max_resolve_passes {
            let batch: Vec<String> = wanted.iter().cloned().collect();
            // Keys the store no longer holds stay unresolved; their raw
            // pointer strings survive in the output.
            let fetched = self.store.get_many(&batch).await?;
            let mut next = BTreeSet::new();
            for (key, tree) in fetched {
                for pointer in splicer.pointer_keys(&tree) {
                    if !resolvable.contains_key(&pointer) && !wanted.contains(&pointer) {
                        next.insert(pointer);
                    }
                }
                resolvable.insert(key, tree);
            }
            wanted = next;
            passes += 1;
        }
        Ok(resolvable)
    }

    // ===== ad-hoc path =====

    /// Fetch-or-compute for a caller-derived key, optionally registering
    /// the key in a group for later invalidation. The computed value is
    /// stored as-is, with no extraction.
    pub async fn remember<F, Fut>(
        &self,
        key: &CacheKey,
        group: Option<&GroupKey>,
        compute: F,
    ) -> IntarsiaResult<Tree>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = IntarsiaResult<Tree>>,
    {
        if let Some(group) = group {
            self.groups.add(group, std::slice::from_ref(key)).await?;
        }
        if let Some(value) = self.store.get(key.as_str()).await? {
            debug!(key = %key, "ad-hoc cache hit");
            return Ok(value);
        }
        let value = compute().await?;
        self.store.set_forever(key.as_str(), &value).await?;
        debug!(key = %key, "ad-hoc value computed and stored");
        Ok(value)
    }

    // ===== invalidation =====

    /// Drop every entry registered for one object: transform entries,
    /// fragments, ad-hoc keys, and nested groups.
    pub async fn clear_cache_keys(&self, object: &dyn Cacheable) -> IntarsiaResult<()> {
        self.clear_cache_group(&GroupKey::for_object(object)).await
    }

    /// Drop every entry registered under a group key.
    pub async fn clear_cache_group(&self, group: &GroupKey) -> IntarsiaResult<()> {
        self.groups.clear(group).await
    }

    /// Keys currently registered under a group.
    pub async fn group_cache_keys(&self, group: &GroupKey) -> IntarsiaResult<Vec<CacheKey>> {
        self.groups.members(group).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::GroupingCapability;
    use async_trait::async_trait;
    use intarsia_core::{FingerprintMode, StoreError, TransformError, Transformer};
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Post {
        id: u64,
        title: String,
    }

    impl Cacheable for Post {
        fn type_tag(&self) -> &str {
            "post"
        }

        fn identity(&self) -> String {
            self.id.to_string()
        }

        fn capabilities(&self) -> &[&'static str] {
            &["content"]
        }

        fn content_snapshot(&self) -> Option<Tree> {
            Some(json!({"title": self.title}))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Draft {
        id: u64,
    }

    impl Cacheable for Draft {
        fn type_tag(&self) -> &str {
            "draft"
        }

        fn identity(&self) -> String {
            self.id.to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Serializes posts with a marked root and a marked author subtree.
    struct PostTransformer {
        calls: AtomicUsize,
        seen_keys: Mutex<Vec<CacheKey>>,
    }

    impl PostTransformer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen_keys: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transformer for PostTransformer {
        fn identity(&self) -> &str {
            "post.v1"
        }

        async fn transform(
            &self,
            object: &dyn Cacheable,
            _shape: &QueryShape,
        ) -> IntarsiaResult<Tree> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let post = object
                .as_any()
                .downcast_ref::<Post>()
                .ok_or_else(|| TransformError::Failed {
                    transformer: "post.v1".to_string(),
                    type_tag: object.type_tag().to_string(),
                    identity: object.identity(),
                    reason: "not a post".to_string(),
                })?;
            Ok(json!({
                "cached_data": "",
                "id": post.id,
                "title": post.title,
                "author": {"cached_data": "", "name": "Ada"}
            }))
        }

        fn add_cache_keys(&self, keys: &[CacheKey]) {
            self.seen_keys.lock().unwrap().extend(keys.iter().cloned());
        }
    }

    /// Serializes posts as a marked collection whose items are themselves
    /// marked, so reading needs more than one fragment pass.
    struct CollectionTransformer;

    #[async_trait]
    impl Transformer for CollectionTransformer {
        fn identity(&self) -> &str {
            "collection.v1"
        }

        async fn transform(
            &self,
            _object: &dyn Cacheable,
            _shape: &QueryShape,
        ) -> IntarsiaResult<Tree> {
            Ok(json!({
                "cached_data": "",
                "items_data": [
                    {"cached_data": "", "n": 1},
                    {"cached_data": "", "n": 2}
                ]
            }))
        }
    }

    fn post_set(transformer: Arc<PostTransformer>) -> TransformerSet {
        TransformerSet::new().for_type("post", transformer)
    }

    fn service() -> (Arc<MemoryStore>, CacheService<MemoryStore>) {
        let store = Arc::new(MemoryStore::list_indexed());
        (store.clone(), CacheService::new(store))
    }

    #[tokio::test]
    async fn test_miss_transforms_and_returns_stored_form() {
        let (store, service) = service();
        let transformer = PostTransformer::new();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(transformer.clone()));
        let values = service.cache_items(&request).await.unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 1);
        // Stored form: the marked root became a fragment pointer.
        let pointer = values[0]["cached_data"].as_str().unwrap();
        assert!(pointer.starts_with("fragment:"));
        assert!(!store.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_call_hits_without_transforming_again() {
        let (_store, service) = service();
        let transformer = PostTransformer::new();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(transformer.clone()));
        let first = service.cache_items(&request).await.unwrap();
        let second = service.cache_items(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_objects_without_transformer_are_skipped_in_order() {
        let (_store, service) = service();
        let transformer = PostTransformer::new();
        let first = Post {
            id: 1,
            title: "one".to_string(),
        };
        let draft = Draft { id: 2 };
        let third = Post {
            id: 3,
            title: "three".to_string(),
        };

        let objects: Vec<&dyn Cacheable> = vec![&first, &draft, &third];
        let request = BatchRequest::new(objects, post_set(transformer));
        let keys = service.cache_item_keys(&request).await.unwrap();

        assert_eq!(keys.len(), 2);
        assert!(keys[0]
            .as_str()
            .contains(&intarsia_core::object_fingerprint(&first)));
        assert!(keys[1]
            .as_str()
            .contains(&intarsia_core::object_fingerprint(&third)));
    }

    #[tokio::test]
    async fn test_returned_keys_match_direct_derivation() {
        let (_store, service) = service();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let shape = QueryShape::new().with_includes(["author"]);

        let request =
            BatchRequest::single(&post, post_set(PostTransformer::new())).with_shape(shape.clone());
        let keys = service.cache_item_keys(&request).await.unwrap();

        let expected =
            CacheKey::transform("post.v1", &shape, &post, FingerprintMode::IdentityOnly);
        assert_eq!(keys, vec![expected]);
    }

    #[tokio::test]
    async fn test_registration_happens_on_every_call() {
        let (_store, service) = service();
        let transformer = PostTransformer::new();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(transformer.clone()));
        let keys = service.cache_item_keys(&request).await.unwrap();
        service.cache_items(&request).await.unwrap();

        // The sink saw the derived key once per call, hit included.
        let seen = transformer.seen_keys.lock().unwrap();
        assert_eq!(seen.as_slice(), &[keys[0].clone(), keys[0].clone()]);
    }

    #[tokio::test]
    async fn test_extra_keys_flow_into_group_and_sink() {
        let (_store, service) = service();
        let transformer = PostTransformer::new();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let extra = CacheKey::ad_hoc("feed", "front_page", &json!(null), &json!([1]));

        let request = BatchRequest::single(&post, post_set(transformer.clone()))
            .with_extra_keys(vec![extra.clone()]);
        service.cache_items(&request).await.unwrap();

        let members = service
            .group_cache_keys(&GroupKey::for_object(&post))
            .await
            .unwrap();
        assert!(members.contains(&extra));
        assert!(transformer.seen_keys.lock().unwrap().contains(&extra));
    }

    #[tokio::test]
    async fn test_fragments_join_the_object_group_on_miss() {
        let (_store, service) = service();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(PostTransformer::new()));
        let keys = service.cache_item_keys(&request).await.unwrap();

        let members = service
            .group_cache_keys(&GroupKey::for_object(&post))
            .await
            .unwrap();
        // The derived key plus two fragments: the root body and the
        // author subtree.
        assert_eq!(members.len(), 3);
        assert!(members.contains(&keys[0]));
        assert_eq!(
            members
                .iter()
                .filter(|key| key.as_str().starts_with("fragment:"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_get_cached_items_resolves_stored_pointers() {
        let (_store, service) = service();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(PostTransformer::new()));
        let keys = service.cache_item_keys(&request).await.unwrap();
        let entries = service.get_cached_items(&keys).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_hit());
        assert_eq!(
            entries[0].value,
            Some(json!({
                "id": 7,
                "title": "hello",
                "author": {"name": "Ada"}
            }))
        );
    }

    #[tokio::test]
    async fn test_get_cached_items_keeps_misses_in_place() {
        let (_store, service) = service();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(PostTransformer::new()));
        let mut keys = service.cache_item_keys(&request).await.unwrap();
        keys.push(CacheKey::from_raw("transform:deadbeef:cafebabe"));

        let entries = service.get_cached_items(&keys).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_hit());
        assert!(!entries[1].is_hit());
        assert_eq!(entries[1].key, keys[1]);
    }

    #[tokio::test]
    async fn test_get_cached_items_with_no_keys_is_empty() {
        let (_store, service) = service();
        assert!(service.get_cached_items(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_follows_fragment_chains_across_passes() {
        let (_store, service) = service();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let set = TransformerSet::new().for_type("post", Arc::new(CollectionTransformer));

        let request = BatchRequest::single(&post, set);
        let keys = service.cache_item_keys(&request).await.unwrap();
        let entries = service.get_cached_items(&keys).await.unwrap();

        // Item fragments sit one hop behind the collection fragment; a
        // fully resolved collection unpacks to its sequence.
        assert_eq!(entries[0].value, Some(json!([{"n": 1}, {"n": 2}])));
    }

    #[tokio::test]
    async fn test_resolution_passes_are_bounded_by_config() {
        let store = Arc::new(MemoryStore::list_indexed());
        let writer = CacheService::new(store.clone());
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let set = TransformerSet::new().for_type("post", Arc::new(CollectionTransformer));

        let request = BatchRequest::single(&post, set);
        let keys = writer.cache_item_keys(&request).await.unwrap();

        // One pass reaches the collection fragment but not its items, so
        // the item pointer nodes come back unexpanded.
        let shallow = CacheService::with_config(
            store,
            CacheConfig::default().with_max_resolve_passes(1),
        );
        let entries = shallow.get_cached_items(&keys).await.unwrap();
        let expected = json!([
            {"cached_data": CacheKey::fragment(&json!({"n": 1})).as_str()},
            {"cached_data": CacheKey::fragment(&json!({"n": 2})).as_str()},
        ]);
        assert_eq!(entries[0].value, Some(expected));
    }

    #[tokio::test]
    async fn test_clear_cache_keys_invalidates_object_entries() {
        let (store, service) = service();
        let transformer = PostTransformer::new();
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(transformer.clone()));
        let keys = service.cache_item_keys(&request).await.unwrap();

        service.clear_cache_keys(&post).await.unwrap();

        assert!(store.is_empty().await);
        let entries = service.get_cached_items(&keys).await.unwrap();
        assert!(!entries[0].is_hit());

        // The next call is a fresh miss.
        service.cache_items(&request).await.unwrap();
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remember_computes_once() {
        let (_store, service) = service();
        let key = CacheKey::ad_hoc("reports", "weekly_total", &json!(null), &json!([7]));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let first = service
            .remember(&key, None, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"total": 41}))
            })
            .await
            .unwrap();

        let counter = calls.clone();
        let second = service
            .remember(&key, None, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"total": 999}))
            })
            .await
            .unwrap();

        assert_eq!(first, json!({"total": 41}));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remember_registers_group_membership() {
        let (store, service) = service();
        let key = CacheKey::ad_hoc("reports", "weekly_total", &json!(null), &json!([7]));
        let group = GroupKey::ad_hoc("reports", "weekly_total", &json!(null));

        service
            .remember(&key, Some(&group), || async { Ok(json!(41)) })
            .await
            .unwrap();

        let members = service.group_cache_keys(&group).await.unwrap();
        assert_eq!(members, vec![key.clone()]);

        service.clear_cache_group(&group).await.unwrap();
        assert_eq!(store.get(key.as_str()).await.unwrap(), None);
    }

    struct FailingStore;

    #[async_trait]
    impl Store for FailingStore {
        async fn get(&self, _key: &str) -> IntarsiaResult<Option<Tree>> {
            Err(StoreError::Unavailable {
                reason: "backend offline".to_string(),
            }
            .into())
        }

        async fn set_forever(&self, _key: &str, _value: &Tree) -> IntarsiaResult<()> {
            Err(StoreError::Unavailable {
                reason: "backend offline".to_string(),
            }
            .into())
        }

        async fn forget(&self, _key: &str) -> IntarsiaResult<()> {
            Ok(())
        }

        fn grouping(&self) -> GroupingCapability {
            GroupingCapability::ListIndexed
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let service = CacheService::new(Arc::new(FailingStore));
        let post = Post {
            id: 7,
            title: "hello".to_string(),
        };

        let request = BatchRequest::single(&post, post_set(PostTransformer::new()));
        let err = service.cache_items(&request).await.unwrap_err();
        assert!(matches!(
            err,
            intarsia_core::IntarsiaError::Store(StoreError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_content_sensitive_keys_roll_with_content() {
        let store = Arc::new(MemoryStore::list_indexed());
        let service = CacheService::with_config(
            store.clone(),
            CacheConfig::default().with_fingerprint(FingerprintMode::ContentSensitive),
        );
        let transformer = PostTransformer::new();
        let before = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let after = Post {
            id: 7,
            title: "hello, edited".to_string(),
        };

        let first = service
            .cache_item_keys(&BatchRequest::single(&before, post_set(transformer.clone())))
            .await
            .unwrap();
        let second = service
            .cache_item_keys(&BatchRequest::single(&after, post_set(transformer.clone())))
            .await
            .unwrap();

        assert_ne!(first[0], second[0]);
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 2);

        // Both generations share the identity-keyed group, so one clear
        // drops them together.
        service.clear_cache_keys(&after).await.unwrap();
        assert_eq!(store.get(first[0].as_str()).await.unwrap(), None);
        assert_eq!(store.get(second[0].as_str()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identity_only_keys_survive_content_change() {
        let (_store, service) = service();
        let transformer = PostTransformer::new();
        let before = Post {
            id: 7,
            title: "hello".to_string(),
        };
        let after = Post {
            id: 7,
            title: "hello, edited".to_string(),
        };

        let first = service
            .cache_items(&BatchRequest::single(&before, post_set(transformer.clone())))
            .await
            .unwrap();
        let second = service
            .cache_items(&BatchRequest::single(&after, post_set(transformer.clone())))
            .await
            .unwrap();

        // Same key, so the edit does not re-transform; the entry is stale
        // until the object's group is cleared.
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second[0]["cached_data"], first[0]["cached_data"]);
    }
}
