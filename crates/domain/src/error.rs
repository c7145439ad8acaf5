use thiserror::Error;

use crate::DocumentStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{kind} id must be positive, got {value}")]
    InvalidRecordId { kind: &'static str, value: i64 },
    #[error("document id must be 1-64 characters of [A-Za-z0-9_-], got {0:?}")]
    InvalidDocumentId(String),
    #[error("edit parameter {0} must be finite")]
    NonFiniteEditParam(&'static str),
    #[error("edit parameter {name} out of range: {value}")]
    EditParamOutOfRange { name: &'static str, value: f32 },
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
    #[error("crop rectangle must have a non-zero size")]
    EmptyCrop,
    #[error("raster buffer holds {actual} bytes, expected {expected}")]
    RasterSizeMismatch { expected: usize, actual: usize },
    #[error("document cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    #[error("unknown {kind} value {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("malformed edit record: {0}")]
    MalformedEditRecord(String),
}
