//! Transformer contract.

use async_trait::async_trait;

use crate::error::IntarsiaResult;
use crate::key::{CacheKey, QueryShape};
use crate::object::Cacheable;
use crate::tree::Tree;

/// Contract for the serialization collaborator.
///
/// A transformer turns one domain object into a tree for external
/// consumption. Subtrees it wants cached independently carry the
/// pointer-marker field with an empty value; extraction replaces them with
/// fragment pointers.
///
/// Transformers that cache nested objects through the facade receive the
/// outer entry's keys via [`Transformer::add_cache_keys`] and pass them
/// along when caching the nested objects. The keys then land in the nested
/// objects' groups, so invalidating a nested object also drops the outer
/// entries built on top of it.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Stable identity folded into transform keys. Different serialization
    /// behavior must use a different identity.
    fn identity(&self) -> &str;

    /// Produce the serialized tree for one object under the given shape.
    async fn transform(&self, object: &dyn Cacheable, shape: &QueryShape) -> IntarsiaResult<Tree>;

    /// Keys the facade is registering for the entry currently being built.
    /// The default implementation ignores them.
    fn add_cache_keys(&self, _keys: &[CacheKey]) {}
}
