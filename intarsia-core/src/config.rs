//! Cache configuration.

use serde::{Deserialize, Serialize};

/// How object fingerprints are derived for transform keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintMode {
    /// Type tag and identity only. Entries for changed content are removed
    /// by group invalidation.
    #[default]
    IdentityOnly,
    /// Fold the object's content snapshot into the fingerprint, so a
    /// changed object derives a fresh key without waiting for invalidation.
    ContentSensitive,
}

/// Field names that mark pointer and collection nodes inside cached trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Field holding a fragment pointer, or `""` on a node that should be
    /// extracted.
    pub pointer_field: String,
    /// Field holding a sequence that resolution flattens into the parent.
    pub items_field: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            pointer_field: "cached_data".to_string(),
            items_field: "items_data".to_string(),
        }
    }
}

/// Configuration for the cache facade.
///
/// All fields have defaults; `CacheConfig::default()` is a working setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Fingerprint derivation for transform keys. Group keys always use
    /// the identity-only form.
    pub fingerprint: FingerprintMode,
    /// Marker field names inside cached trees.
    pub markers: MarkerConfig,
    /// Upper bound on pointer-gathering passes in the read path. Fragments
    /// may reference further fragments; each pass fetches one more level.
    pub max_resolve_passes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintMode::default(),
            markers: MarkerConfig::default(),
            max_resolve_passes: 8,
        }
    }
}

impl CacheConfig {
    pub fn with_fingerprint(mut self, mode: FingerprintMode) -> Self {
        self.fingerprint = mode;
        self
    }

    pub fn with_markers(mut self, markers: MarkerConfig) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_max_resolve_passes(mut self, passes: usize) -> Self {
        self.max_resolve_passes = passes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_marker_fields() {
        let markers = MarkerConfig::default();
        assert_eq!(markers.pointer_field, "cached_data");
        assert_eq!(markers.items_field, "items_data");
    }

    #[test]
    fn test_default_fingerprint_mode_is_identity_only() {
        assert_eq!(
            CacheConfig::default().fingerprint,
            FingerprintMode::IdentityOnly
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_fingerprint(FingerprintMode::ContentSensitive)
            .with_max_resolve_passes(3);
        assert_eq!(config.fingerprint, FingerprintMode::ContentSensitive);
        assert_eq!(config.max_resolve_passes, 3);
    }
}
