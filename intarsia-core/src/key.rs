//! Key grammar and fingerprint derivation.
//!
//! Every key in the system is derived here, deterministically, from
//! transformer identity, query shape, and object identity. No timestamps,
//! no randomness: the same inputs always derive the same key, which is what
//! lets independent callers share entries.
//!
//! Key families:
//! - `transform:<transformer_fingerprint>:<object_fingerprint>` for stored
//!   transform results;
//! - `fragment:<digest>` for extracted subtrees, addressed by content;
//! - `cacheKeys:<object_fingerprint>` for per-object invalidation groups;
//! - `<caller_type>_<caller_method>_<hash>` for ad-hoc memoization, with a
//!   `group_` prefix when the key names a group root.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::FingerprintMode;
use crate::object::Cacheable;
use crate::tree::{canonical_json, Tree};

/// Prefix of transform keys.
pub const TRANSFORM_PREFIX: &str = "transform:";

/// Prefix of fragment keys.
pub const FRAGMENT_PREFIX: &str = "fragment:";

/// Prefix of per-object group keys.
pub const GROUP_KEY_PREFIX: &str = "cacheKeys:";

/// Marker prefix identifying nested group roots among group members.
pub const GROUP_MARKER: &str = "group_";

/// Number of digest bytes kept in key material. 16 bytes of SHA-256 give
/// 32 hex characters per fingerprint.
const DIGEST_BYTES: usize = 16;

/// Separator byte between digest input parts, so adjacent parts cannot run
/// together (`"ab" + "c"` must not hash like `"a" + "bc"`).
const PART_SEPARATOR: u8 = 0x1f;

/// Hex digest over separator-joined parts, truncated to `DIGEST_BYTES`.
pub(crate) fn digest_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([PART_SEPARATOR]);
        }
        hasher.update(part);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..DIGEST_BYTES])
}

fn sanitize_caller(caller_type: &str) -> String {
    caller_type.replace("::", "_")
}

// ============================================================================
// QUERY SHAPE
// ============================================================================

/// The caller-declared shape of a transformation request: which relations
/// are included and which columns are selected. Requests with the same
/// shape share cache entries regardless of how the caller ordered the
/// lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryShape {
    pub includes: Vec<String>,
    pub columns: Vec<String>,
}

impl QueryShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes = includes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sorted, deduplicated form. Includes and columns are sets
    /// semantically; fingerprints hash this form.
    pub fn canonical(&self) -> QueryShape {
        let mut includes = self.includes.clone();
        includes.sort();
        includes.dedup();
        let mut columns = self.columns.clone();
        columns.sort();
        columns.dedup();
        QueryShape { includes, columns }
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.columns.is_empty()
    }
}

// ============================================================================
// FINGERPRINTS
// ============================================================================

/// Fingerprint of a transformer in the context of one query shape.
pub fn transformer_fingerprint(identity: &str, shape: &QueryShape) -> String {
    let canonical = shape.canonical();
    let shape_json = canonical_json(&serde_json::json!({
        "columns": canonical.columns,
        "includes": canonical.includes,
    }));
    digest_parts(&[identity.as_bytes(), shape_json.as_bytes()])
}

/// Identity-only fingerprint of a domain object. Group keys always use
/// this form: invalidation must find the group after the content changed.
pub fn object_fingerprint(object: &dyn Cacheable) -> String {
    digest_parts(&[object.type_tag().as_bytes(), object.identity().as_bytes()])
}

/// Fingerprint of a domain object for transform keys. Under
/// `FingerprintMode::ContentSensitive` the object's content snapshot is
/// folded in, so changed content derives a fresh key on its own.
pub fn object_fingerprint_sensitive(object: &dyn Cacheable, mode: FingerprintMode) -> String {
    match (mode, object.content_snapshot()) {
        (FingerprintMode::ContentSensitive, Some(snapshot)) => digest_parts(&[
            object.type_tag().as_bytes(),
            object.identity().as_bytes(),
            canonical_json(&snapshot).as_bytes(),
        ]),
        _ => object_fingerprint(object),
    }
}

/// Whether a member key names a nested group.
pub fn is_nested_group(key: &str) -> bool {
    key.starts_with(GROUP_MARKER)
}

// ============================================================================
// CACHE KEY
// ============================================================================

/// An opaque cache key.
///
/// Derived keys follow the documented grammar; `from_raw` exists for keys
/// read back from a store and for callers that manage their own names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Transform key for one (transformer, shape, object) combination.
    pub fn transform(
        transformer_identity: &str,
        shape: &QueryShape,
        object: &dyn Cacheable,
        mode: FingerprintMode,
    ) -> Self {
        CacheKey(format!(
            "{}{}:{}",
            TRANSFORM_PREFIX,
            transformer_fingerprint(transformer_identity, shape),
            object_fingerprint_sensitive(object, mode),
        ))
    }

    /// Content-addressed key for an extracted fragment body. Identical
    /// subtrees derive identical keys, so shared fragments deduplicate and
    /// rewrites are idempotent.
    pub fn fragment(body: &Tree) -> Self {
        CacheKey(format!(
            "{}{}",
            FRAGMENT_PREFIX,
            digest_parts(&[canonical_json(body).as_bytes()])
        ))
    }

    /// Caller-derived key for memoizing an arbitrary method result. `args`
    /// is hashed positionally; reordering arguments is a different call.
    pub fn ad_hoc(caller_type: &str, caller_method: &str, extra: &Tree, args: &Tree) -> Self {
        let hash = digest_parts(&[
            canonical_json(extra).as_bytes(),
            canonical_json(args).as_bytes(),
        ]);
        CacheKey(format!(
            "{}_{}_{}",
            sanitize_caller(caller_type),
            caller_method,
            hash
        ))
    }

    /// A key not derived here: read back from a store, or supplied by a
    /// caller with its own grammar.
    pub fn from_raw(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// GROUP KEY
// ============================================================================

/// A group key: names a membership record in the group index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Per-object invalidation group. Always identity-only: the group must
    /// still be findable after the object's content changed.
    pub fn for_object(object: &dyn Cacheable) -> Self {
        GroupKey(format!("{}{}", GROUP_KEY_PREFIX, object_fingerprint(object)))
    }

    /// Caller-derived group root. Carries the nested-group marker, so
    /// clearing a parent group recurses into this one; the hash covers only
    /// `extra`, keeping the root stable across calls with different
    /// arguments.
    pub fn ad_hoc(caller_type: &str, caller_method: &str, extra: &Tree) -> Self {
        let hash = digest_parts(&[canonical_json(extra).as_bytes()]);
        GroupKey(format!(
            "{}{}_{}_{}",
            GROUP_MARKER,
            sanitize_caller(caller_type),
            caller_method,
            hash
        ))
    }

    /// An arbitrary caller-chosen group name.
    pub fn named(name: impl Into<String>) -> Self {
        GroupKey(name.into())
    }

    /// This group key in member position; nested groups are stored as
    /// members of their parent group.
    pub fn as_member(&self) -> CacheKey {
        CacheKey(self.0.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
