//! Intarsia Cache - Write-once memoization of serialized object graphs.
//!
//! This crate is the runtime half of the system: [`intarsia_core`] defines
//! the contracts and the key grammar; this crate executes them against a
//! [`Store`].
//!
//! # Architecture
//!
//! - [`store`]: the storage abstraction and its capability model.
//! - [`memory`]: an in-memory store for tests and single-process use.
//! - [`splice`]: pure fragment extraction and pointer resolution.
//! - [`groups`]: membership records that make invalidation possible, with
//!   one strategy per storage capability.
//! - [`registry`]: per-batch transformer dispatch.
//! - [`service`]: the facade tying all of it together.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use intarsia_cache::{BatchRequest, CacheService, MemoryStore, TransformerSet};
//! use intarsia_core::{Cacheable, IntarsiaResult, QueryShape, Transformer, Tree};
//! use serde_json::json;
//!
//! struct Note {
//!     id: u64,
//! }
//!
//! impl Cacheable for Note {
//!     fn type_tag(&self) -> &str {
//!         "note"
//!     }
//!     fn identity(&self) -> String {
//!         self.id.to_string()
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! struct NoteTransformer;
//!
//! #[async_trait]
//! impl Transformer for NoteTransformer {
//!     fn identity(&self) -> &str {
//!         "note.v1"
//!     }
//!
//!     async fn transform(
//!         &self,
//!         object: &dyn Cacheable,
//!         _shape: &QueryShape,
//!     ) -> IntarsiaResult<Tree> {
//!         Ok(json!({"id": object.identity(), "kind": "note"}))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> IntarsiaResult<()> {
//! let service = CacheService::new(Arc::new(MemoryStore::list_indexed()));
//! let note = Note { id: 7 };
//!
//! let set = TransformerSet::new().for_type("note", Arc::new(NoteTransformer));
//! let keys = service
//!     .cache_item_keys(&BatchRequest::single(&note, set))
//!     .await?;
//!
//! let entries = service.get_cached_items(&keys).await?;
//! assert!(entries[0].is_hit());
//!
//! // Editing the note elsewhere? Drop everything derived from it.
//! service.clear_cache_keys(&note).await?;
//! # Ok(())
//! # }
//! ```

pub mod groups;
pub mod memory;
pub mod registry;
pub mod service;
pub mod splice;
pub mod store;

pub use groups::{group_index_for, GroupIndex, ListIndexedGroups, SetIndexedGroups};
pub use memory::MemoryStore;
pub use registry::TransformerSet;
pub use service::{BatchRequest, CacheService, CachedEntry};
pub use splice::{Extraction, Splicer};
pub use store::{GroupingCapability, Store};
