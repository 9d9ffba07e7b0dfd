//! Intarsia Test Utilities
//!
//! Centralized test infrastructure for the Intarsia workspace:
//! - A small blog-shaped domain (posts, authors) implementing `Cacheable`
//! - Transformers exercising markers, shape gating, nesting, and the key
//!   sink
//! - Proptest generators for trees, shapes, and identities
//! - Pre-built fixtures for common scenarios
//!
//! Everything here assumes the default marker configuration
//! (`cached_data` / `items_data`).

// Re-export the runtime types fixtures are built from
pub use intarsia_cache::{
    BatchRequest, CacheService, CachedEntry, GroupIndex, GroupingCapability, MemoryStore,
    Splicer, Store, TransformerSet,
};
pub use intarsia_core::{
    CacheConfig, CacheKey, Cacheable, FingerprintMode, GroupKey, IntarsiaError, IntarsiaResult,
    MarkerConfig, QueryShape, TransformError, Transformer, Tree,
};

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// SAMPLE DOMAIN
// ============================================================================

/// A blog author. Identity is a UUIDv7; content is the display name.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::now_v7(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Cacheable for Author {
    fn type_tag(&self) -> &str {
        "author"
    }

    fn identity(&self) -> String {
        self.id.to_string()
    }

    fn capabilities(&self) -> &[&'static str] {
        &["profile"]
    }

    fn content_snapshot(&self) -> Option<Tree> {
        Some(json!({"name": self.name}))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A blog post with an embedded author.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author: Author,
}

impl Post {
    pub fn new(title: impl Into<String>, body: impl Into<String>, author: Author) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            body: body.into(),
            author,
        }
    }
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
        Some(json!({"title": self.title, "body": self.body}))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// SAMPLE TRANSFORMERS
// ============================================================================

fn not_my_type(transformer: &str, object: &dyn Cacheable) -> TransformError {
    TransformError::Failed {
        transformer: transformer.to_string(),
        type_tag: object.type_tag().to_string(),
        identity: object.identity(),
        reason: "unexpected object type".to_string(),
    }
}

/// Serializes an [`Author`] as one marked node.
#[derive(Debug, Default)]
pub struct AuthorTransformer;

#[async_trait]
impl Transformer for AuthorTransformer {
    fn identity(&self) -> &str {
        "author.v1"
    }

    async fn transform(
        &self,
        object: &dyn Cacheable,
        _shape: &QueryShape,
    ) -> IntarsiaResult<Tree> {
        let author = object
            .as_any()
            .downcast_ref::<Author>()
            .ok_or_else(|| not_my_type("author.v1", object))?;
        Ok(json!({
            "cached_data": "",
            "id": author.id.to_string(),
            "name": author.name
        }))
    }
}

/// Serializes a [`Post`] with a marked root and, when the shape includes
/// `author`, a marked author subtree. Non-empty column lists gate the
/// `title` and `body` fields.
#[derive(Debug, Default)]
pub struct PostTransformer;

#[async_trait]
impl Transformer for PostTransformer {
    fn identity(&self) -> &str {
        "post.v1"
    }

    async fn transform(&self, object: &dyn Cacheable, shape: &QueryShape) -> IntarsiaResult<Tree> {
        let post = object
            .as_any()
            .downcast_ref::<Post>()
            .ok_or_else(|| not_my_type("post.v1", object))?;

        let wants = |column: &str| {
            shape.columns.is_empty() || shape.columns.iter().any(|c| c == column)
        };

        let mut out = serde_json::Map::new();
        out.insert("cached_data".to_string(), json!(""));
        out.insert("id".to_string(), json!(post.id.to_string()));
        if wants("title") {
            out.insert("title".to_string(), json!(post.title));
        }
        if wants("body") {
            out.insert("body".to_string(), json!(post.body));
        }
        if shape.includes.iter().any(|include| include == "author") {
            out.insert(
                "author".to_string(),
                json!({
                    "cached_data": "",
                    "id": post.author.id.to_string(),
                    "name": post.author.name
                }),
            );
        }
        Ok(Tree::Object(out))
    }
}

/// Wraps another transformer, counting `transform` invocations and
/// recording every key the facade pushes through the sink.
pub struct RecordingTransformer {
    inner: Arc<dyn Transformer>,
    transform_calls: AtomicUsize,
    sunk_keys: Mutex<Vec<CacheKey>>,
}

impl RecordingTransformer {
    pub fn new(inner: Arc<dyn Transformer>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            transform_calls: AtomicUsize::new(0),
            sunk_keys: Mutex::new(Vec::new()),
        })
    }

    /// How many times `transform` ran. Hits leave this untouched.
    pub fn transform_calls(&self) -> usize {
        self.transform_calls.load(Ordering::SeqCst)
    }

    /// Every key seen through the sink, in arrival order.
    pub fn sunk_keys(&self) -> Vec<CacheKey> {
        self.sunk_keys.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Transformer for RecordingTransformer {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    async fn transform(&self, object: &dyn Cacheable, shape: &QueryShape) -> IntarsiaResult<Tree> {
        self.transform_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(object, shape).await
    }

    fn add_cache_keys(&self, keys: &[CacheKey]) {
        self.sunk_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(keys.iter().cloned());
        self.inner.add_cache_keys(keys);
    }
}

/// Serializes a [`Post`] by caching its author through a nested facade
/// call, embedding the author's derived key as a pointer.
///
/// The sink keys from the outer call are forwarded as extra keys on the
/// inner call, so the author's group also holds the outer post entry.
/// Invalidating the author then drops the post entry built from it.
pub struct NestingPostTransformer {
    service: Arc<CacheService<MemoryStore>>,
    pending: Mutex<Vec<CacheKey>>,
}

impl NestingPostTransformer {
    pub fn new(service: Arc<CacheService<MemoryStore>>) -> Arc<Self> {
        Arc::new(Self {
            service,
            pending: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transformer for NestingPostTransformer {
    fn identity(&self) -> &str {
        "post.nested.v1"
    }

    fn add_cache_keys(&self, keys: &[CacheKey]) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = keys.to_vec();
    }

    async fn transform(&self, object: &dyn Cacheable, _shape: &QueryShape) -> IntarsiaResult<Tree> {
        let post = object
            .as_any()
            .downcast_ref::<Post>()
            .ok_or_else(|| not_my_type("post.nested.v1", object))?;

        let outer_keys = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let set = TransformerSet::new().for_type("author", Arc::new(AuthorTransformer));
        let request =
            BatchRequest::single(&post.author, set).with_extra_keys(outer_keys);
        let author_keys = self.service.cache_item_keys(&request).await?;

        let author = match author_keys.first() {
            Some(key) => json!({"cached_data": key.as_str()}),
            None => Tree::Null,
        };
        Ok(json!({
            "cached_data": "",
            "id": post.id.to_string(),
            "title": post.title,
            "author": author
        }))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Intarsia types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID (for generic identity generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid UUIDv7 (timestamp-sortable), the identity format
    /// fixtures use.
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    /// Mapping field names that never collide with the marker fields.
    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-m][a-z]{0,6}"
    }

    /// Scalar leaves: null, booleans, integers, short strings.
    pub fn arb_scalar() -> impl Strategy<Value = Tree> {
        prop_oneof![
            Just(Tree::Null),
            any::<bool>().prop_map(Tree::from),
            any::<i32>().prop_map(Tree::from),
            "[a-z]{0,8}".prop_map(Tree::from),
        ]
    }

    /// Small unmarked trees.
    pub fn arb_tree() -> impl Strategy<Value = Tree> {
        arb_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Tree::from),
                prop::collection::btree_map(arb_field_name(), inner, 0..4).prop_map(|fields| {
                    let mut map = serde_json::Map::new();
                    for (field, value) in fields {
                        map.insert(field, value);
                    }
                    Tree::Object(map)
                }),
            ]
        })
    }

    /// Small trees whose mappings are randomly marked for extraction.
    pub fn arb_marked_tree() -> impl Strategy<Value = Tree> {
        arb_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Tree::from),
                (
                    prop::collection::btree_map(arb_field_name(), inner, 0..4),
                    any::<bool>()
                )
                    .prop_map(|(fields, marked)| {
                        let mut map = serde_json::Map::new();
                        for (field, value) in fields {
                            map.insert(field, value);
                        }
                        if marked {
                            map.insert("cached_data".to_string(), json!(""));
                        }
                        Tree::Object(map)
                    }),
            ]
        })
    }

    /// Query shapes with small include and column lists.
    pub fn arb_query_shape() -> impl Strategy<Value = QueryShape> {
        (
            prop::collection::vec("[a-z]{1,8}", 0..4),
            prop::collection::vec("[a-z]{1,8}", 0..4),
        )
            .prop_map(|(includes, columns)| {
                QueryShape::new().with_includes(includes).with_columns(columns)
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// An author with a fresh identity.
    pub fn sample_author() -> Author {
        Author::new("Ada Lovelace")
    }

    /// A post by a fresh author.
    pub fn sample_post() -> Post {
        post_by(sample_author())
    }

    /// A post by the given author.
    pub fn post_by(author: Author) -> Post {
        Post::new("Notes on the Engine", "It weaves algebraic patterns.", author)
    }

    /// A cache service over a fresh list-indexed memory store, plus the
    /// store handle for direct assertions.
    pub fn list_indexed_service() -> (Arc<MemoryStore>, Arc<CacheService<MemoryStore>>) {
        let store = Arc::new(MemoryStore::list_indexed());
        (store.clone(), Arc::new(CacheService::new(store)))
    }

    /// Same, over a store with native tagged sets.
    pub fn set_indexed_service() -> (Arc<MemoryStore>, Arc<CacheService<MemoryStore>>) {
        let store = Arc::new(MemoryStore::set_indexed());
        (store.clone(), Arc::new(CacheService::new(store)))
    }

    /// The dispatch table covering both sample types.
    pub fn blog_transformers() -> TransformerSet {
        TransformerSet::new()
            .for_type("post", Arc::new(PostTransformer))
            .for_type("author", Arc::new(AuthorTransformer))
    }
}

// ============================================================================
// TESTS
// ============================================================================
