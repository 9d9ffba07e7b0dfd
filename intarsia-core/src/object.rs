//! Domain-object contract.

use std::any::Any;

use crate::tree::Tree;

/// Contract a domain object fulfills to be cached.
///
/// Objects declare a stable type tag and identity (key material for
/// fingerprints), an ordered list of capability tags used for transformer
/// dispatch, and an optional content snapshot consulted only for
/// content-sensitive fingerprints.
pub trait Cacheable: Send + Sync {
    /// Stable tag for the object's type, e.g. `"post"`.
    fn type_tag(&self) -> &str;

    /// Stable identity within the type, e.g. the primary key rendered as
    /// text. Type tag and identity together must uniquely name the object.
    fn identity(&self) -> String;

    /// Capability tags in declaration order. When no transformer is
    /// registered for the exact type tag, dispatch picks the first
    /// capability here that has one.
    fn capabilities(&self) -> &[&'static str] {
        &[]
    }

    /// Current content, if the object can snapshot itself.
    fn content_snapshot(&self) -> Option<Tree> {
        None
    }

    /// Concrete-type access for transformers.
    fn as_any(&self) -> &dyn Any;
}
