//! Error types.
//!
//! Backend failures and transformer failures are distinct concerns; the
//! facade propagates both without retrying. Conditions the protocol treats
//! as normal control flow (no matching transformer, a missing fragment, an
//! empty key set) are not errors and never appear here.

use thiserror::Error;

/// Backend store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Delete failed for key {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("Stored value for key {key} is not a valid tree: {reason}")]
    Decode { key: String, reason: String },

    #[error("Store has no tagged-set support")]
    TagsUnsupported,
}

/// Transformer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("Transformer {transformer} failed on {type_tag}#{identity}: {reason}")]
    Failed {
        transformer: String,
        type_tag: String,
        identity: String,
        reason: String,
    },

    #[error("Transformer {transformer} produced an unusable value: {reason}")]
    InvalidOutput { transformer: String, reason: String },
}

/// Master error type for all intarsia operations.
#[derive(Debug, Clone, Error)]
pub enum IntarsiaError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

/// Result type alias for intarsia operations.
pub type IntarsiaResult<T> = Result<T, IntarsiaError>;
