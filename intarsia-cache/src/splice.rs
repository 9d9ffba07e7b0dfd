//! Fragment extraction and pointer resolution.
//!
//! A transformer marks subtrees it wants cached independently by giving
//! them the pointer-marker field with an empty value. Extraction replaces
//! each marked subtree with a pointer node holding a content-derived
//! fragment key; the subtree's own fields become the fragment body, while
//! child pointer nodes stay on the stripped node so shared fragments are
//! stored exactly once. Resolution is the inverse walk: pointer keys are
//! looked up in a fetched-fragments map and the fragment's fields are
//! merged back into the referencing node.
//!
//! Both directions are pure tree transformations. Fetching and storing
//! fragments is the facade's job; the splicer never touches a store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use intarsia_core::{CacheKey, MarkerConfig, Tree};

/// Result of extracting one tree: the tree with marked subtrees replaced
/// by pointer nodes, plus every extracted fragment keyed by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub stripped: Tree,
    pub fragments: BTreeMap<CacheKey, Tree>,
}

impl Extraction {
    /// Fragment keys in stored form, for group registration.
    pub fn fragment_keys(&self) -> Vec<CacheKey> {
        self.fragments.keys().cloned().collect()
    }
}

/// Pure extract/resolve engine over one marker configuration.
#[derive(Debug, Clone)]
pub struct Splicer {
    markers: MarkerConfig,
}

impl Default for Splicer {
    fn default() -> Self {
        Self::new(MarkerConfig::default())
    }
}

impl Splicer {
    pub fn new(markers: MarkerConfig) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    // ========================================================================
    // EXTRACTION
    // ========================================================================

    /// Walk the tree depth-first and extract every mapping that carries the
    /// pointer marker with an empty value. Mappings whose marker already
    /// holds a key pass through untouched, so extraction is idempotent.
    pub fn extract(&self, tree: &Tree) -> Extraction {
        let mut fragments = BTreeMap::new();
        let stripped = self.extract_value(tree, &mut fragments);
        Extraction {
            stripped,
            fragments,
        }
    }

    fn extract_value(&self, value: &Tree, fragments: &mut BTreeMap<CacheKey, Tree>) -> Tree {
        match value {
            Tree::Object(map) => self.extract_mapping(map, fragments),
            Tree::Array(items) => Tree::Array(
                items
                    .iter()
                    .map(|item| self.extract_value(item, fragments))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn extract_mapping(
        &self,
        map: &serde_json::Map<String, Tree>,
        fragments: &mut BTreeMap<CacheKey, Tree>,
    ) -> Tree {
        let marker = map.get(&self.markers.pointer_field);
        if let Some(Tree::String(existing)) = marker {
            if !existing.is_empty() {
                // Already a pointer node.
                return Tree::Object(map.clone());
            }
        }
        let extract_here = matches!(marker, Some(Tree::String(s)) if s.is_empty());

        // Children first, so nested marked subtrees become pointers before
        // this node's body is hashed.
        let mut processed = serde_json::Map::new();
        for (field, value) in map {
            if extract_here && field == &self.markers.pointer_field {
                continue;
            }
            processed.insert(field.clone(), self.extract_value(value, fragments));
        }
        if !extract_here {
            return Tree::Object(processed);
        }

        // Child pointer nodes stay on the stripped node; everything else
        // forms the fragment body.
        let mut body = serde_json::Map::new();
        let mut kept = serde_json::Map::new();
        for (field, value) in processed {
            if self.is_pointer_node(&value) {
                kept.insert(field, value);
            } else {
                body.insert(field, value);
            }
        }
        let body = Tree::Object(body);
        let key = CacheKey::fragment(&body);
        kept.insert(
            self.markers.pointer_field.clone(),
            Tree::String(key.as_str().to_string()),
        );
        fragments.insert(key, body);
        Tree::Object(kept)
    }

    fn is_pointer_node(&self, value: &Tree) -> bool {
        matches!(value, Tree::Object(map) if map.contains_key(&self.markers.pointer_field))
    }

    // ========================================================================
    // POINTER COLLECTION
    // ========================================================================

    /// Every non-empty pointer-marker value anywhere in the tree. The read
    /// path fetches these, then repeats on the fetched fragments until no
    /// new keys appear.
    pub fn pointer_keys(&self, tree: &Tree) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        self.collect_pointer_keys(tree, &mut keys);
        keys
    }

    fn collect_pointer_keys(&self, value: &Tree, keys: &mut BTreeSet<String>) {
        match value {
            Tree::Object(map) => {
                for (field, value) in map {
                    if field == &self.markers.pointer_field {
                        if let Tree::String(key) = value {
                            if !key.is_empty() {
                                keys.insert(key.clone());
                            }
                        }
                    } else {
                        self.collect_pointer_keys(value, keys);
                    }
                }
            }
            Tree::Array(items) => {
                for item in items {
                    self.collect_pointer_keys(item, keys);
                }
            }
            _ => {}
        }
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Merge fetched fragments back into the tree.
    ///
    /// String values matching a fetched fragment key are replaced by the
    /// fragment's (recursively resolved) fields; on collision the
    /// referencing node's own fields win, except for the pointer-marker
    /// field itself, which is consumed. A sequence under the collection
    /// marker, or a fragment resolving to one, is flattened into the
    /// parent; a node reduced to nothing but flattened items becomes the
    /// sequence itself. An empty marker value carries nothing and is
    /// dropped; a key with no fetched fragment stays as the raw string; a
    /// fragment chain that reaches itself stops expanding.
    pub fn resolve(&self, tree: &Tree, fragments: &HashMap<String, Tree>) -> Tree {
        let mut in_flight = Vec::new();
        self.resolve_value(tree, fragments, &mut in_flight)
    }

    fn resolve_value(
        &self,
        value: &Tree,
        fragments: &HashMap<String, Tree>,
        in_flight: &mut Vec<String>,
    ) -> Tree {
        match value {
            Tree::Object(map) => self.resolve_mapping(map, fragments, in_flight),
            Tree::Array(items) => Tree::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item, fragments, in_flight))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_mapping(
        &self,
        map: &serde_json::Map<String, Tree>,
        fragments: &HashMap<String, Tree>,
        in_flight: &mut Vec<String>,
    ) -> Tree {
        // The node's own resolved fields, fragment-contributed fields, and
        // flattened collection items are collected separately because they
        // merge with different precedence.
        let mut own = serde_json::Map::new();
        let mut merged = serde_json::Map::new();
        let mut spliced: Vec<Tree> = Vec::new();

        for (field, value) in map {
            match value {
                Tree::String(s) if field == &self.markers.pointer_field && s.is_empty() => {}
                Tree::String(s) if fragments.contains_key(s) => {
                    if in_flight.iter().any(|key| key == s) {
                        own.insert(field.clone(), value.clone());
                        continue;
                    }
                    in_flight.push(s.clone());
                    let resolved = self.resolve_value(&fragments[s], fragments, in_flight);
                    in_flight.pop();
                    match resolved {
                        Tree::Object(fields) => {
                            for (fragment_field, fragment_value) in fields {
                                merged.entry(fragment_field).or_insert(fragment_value);
                            }
                        }
                        // A fragment that resolved to a flattened sequence
                        // splices into the parent positionally.
                        Tree::Array(items) => spliced.extend(items),
                        other => {
                            own.insert(field.clone(), other);
                        }
                    }
                }
                Tree::Object(_) | Tree::Array(_) => {
                    let resolved = self.resolve_value(value, fragments, in_flight);
                    if field == &self.markers.items_field {
                        match resolved {
                            Tree::Array(items) => spliced.extend(items),
                            Tree::Object(fields) => {
                                for (f, v) in fields {
                                    merged.entry(f).or_insert(v);
                                }
                            }
                            other => {
                                own.insert(field.clone(), other);
                            }
                        }
                    } else {
                        own.insert(field.clone(), resolved);
                    }
                }
                other => {
                    own.insert(field.clone(), other.clone());
                }
            }
        }

        // A node reduced to flattened items is the unpacked collection.
        if own.is_empty() && merged.is_empty() && !spliced.is_empty() {
            return Tree::Array(spliced);
        }

        // Collision precedence: fragment fields < spliced positions < the
        // node's own fields.
        let mut out = merged;
        for (position, item) in spliced.into_iter().enumerate() {
            out.insert(position.to_string(), item);
        }
        for (field, value) in own {
            out.insert(field, value);
        }
        Tree::Object(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================
