//! Transformer dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use intarsia_core::{Cacheable, Transformer};

/// Dispatch table mapping objects to the transformer that serializes them.
///
/// Resolution precedence: an exact type-tag registration wins; otherwise
/// the first of the *object's* declared capabilities with a registration;
/// otherwise the wildcard, if one was set. Objects that resolve to nothing
/// are skipped by the batch flow rather than treated as errors.
#[derive(Default, Clone)]
pub struct TransformerSet {
    exact: HashMap<String, Arc<dyn Transformer>>,
    capability: HashMap<String, Arc<dyn Transformer>>,
    wildcard: Option<Arc<dyn Transformer>>,
}

impl TransformerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformer for one exact type tag.
    pub fn for_type(
        mut self,
        type_tag: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        self.exact.insert(type_tag.into(), transformer);
        self
    }

    /// Register a transformer for a capability tag.
    pub fn for_capability(
        mut self,
        capability: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        self.capability.insert(capability.into(), transformer);
        self
    }

    /// Register the fallback used when nothing more specific matches.
    pub fn wildcard(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.wildcard = Some(transformer);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.capability.is_empty() && self.wildcard.is_none()
    }

    /// The transformer responsible for one object, or `None` when the
    /// object should be skipped.
    pub fn resolve(&self, object: &dyn Cacheable) -> Option<&Arc<dyn Transformer>> {
        if let Some(transformer) = self.exact.get(object.type_tag()) {
            return Some(transformer);
        }
        for capability in object.capabilities() {
            if let Some(transformer) = self.capability.get(*capability) {
                return Some(transformer);
            }
        }
        self.wildcard.as_ref()
    }
}
