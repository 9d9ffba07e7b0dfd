//! Serialized-value model.
//!
//! Cached representations are trees of scalars, sequences, and mappings.
//! `serde_json::Value` is exactly that tagged variant, and its default map
//! keeps keys in sorted order, which is what makes the canonical form
//! cheap: serializing a mapping already emits a stable key order.

/// A serialized representation: scalar, sequence, or mapping.
pub type Tree = serde_json::Value;

/// Canonical JSON for a tree.
///
/// Mapping keys serialize in sorted order (this workspace does not enable
/// `serde_json`'s `preserve_order` feature). Sequences keep their element
/// order; reordering a sequence is a semantic change.
pub fn canonical_json(tree: &Tree) -> String {
    // Serializing a `Value` cannot fail: numbers are always finite and
    // mapping keys are always strings.
    serde_json::to_string(tree).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_mapping_keys() {
        let tree = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&tree), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_canonical_json_sorts_nested_mappings() {
        let tree = json!({"z": {"beta": 1, "alpha": 2}, "a": true});
        assert_eq!(
            canonical_json(&tree),
            r#"{"a":true,"z":{"alpha":2,"beta":1}}"#
        );
    }

    #[test]
    fn test_canonical_json_keeps_sequence_order() {
        let tree = json!([3, 1, 2]);
        assert_eq!(canonical_json(&tree), "[3,1,2]");
    }

    #[test]
    fn test_equivalent_mappings_share_canonical_form() {
        let forward = json!({"columns": ["id"], "includes": ["author"]});
        let reversed = json!({"includes": ["author"], "columns": ["id"]});
        assert_eq!(canonical_json(&forward), canonical_json(&reversed));
    }
}
