use scanshelf_domain::{DocumentId, DomainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("original asset missing: {0}")]
    MissingAsset(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("document {document}: pages {pages:?} could not be produced")]
    PagesFailed { document: DocumentId, pages: Vec<u32> },
}

impl ApplicationError {
    /// Per-page failures that must not be retried automatically.
    pub fn is_fatal_for_page(&self) -> bool {
        matches!(self, Self::MissingAsset(_) | Self::Decode(_))
    }
}
