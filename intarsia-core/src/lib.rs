//! Intarsia Core - Contracts and Key Grammar
//!
//! Pure data model for the intarsia cache layer: the tree type cached
//! values are made of, the key grammar and fingerprint derivations, the
//! collaborator contracts (domain objects and transformers), configuration,
//! and error types. No I/O lives here; the protocol core is in
//! `intarsia-cache`.

pub mod config;
pub mod error;
pub mod key;
pub mod object;
pub mod transform;
pub mod tree;

pub use config::{CacheConfig, FingerprintMode, MarkerConfig};
pub use error::{IntarsiaError, IntarsiaResult, StoreError, TransformError};
pub use key::{
    is_nested_group, object_fingerprint, object_fingerprint_sensitive, transformer_fingerprint,
    CacheKey, GroupKey, QueryShape, FRAGMENT_PREFIX, GROUP_KEY_PREFIX, GROUP_MARKER,
    TRANSFORM_PREFIX,
};
pub use object::Cacheable;
pub use transform::Transformer;
pub use tree::{canonical_json, Tree};
