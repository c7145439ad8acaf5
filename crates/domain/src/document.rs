use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::DomainError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(i64);

        impl $name {
            pub fn new(value: i64) -> Result<Self, DomainError> {
                if value <= 0 {
                    return Err(DomainError::InvalidRecordId {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(value))
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Row id of a page in the catalog.
    PageId,
    "page"
);
record_id!(FolderId, "folder");
record_id!(ExportId, "export");

const MAX_DOCUMENT_ID_LEN: usize = 64;

/// Opaque stable document identifier.
///
/// Used verbatim as a directory name under the asset root, so only
/// `[A-Za-z0-9_-]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= MAX_DOCUMENT_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(DomainError::InvalidDocumentId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Active,
    Trashed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Trashed => "trashed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "trashed" => Ok(Self::Trashed),
            other => Err(DomainError::UnknownVariant {
                kind: "document status",
                value: other.to_string(),
            }),
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active)
                | (Self::Draft, Self::Trashed)
                | (Self::Active, Self::Trashed)
                | (Self::Trashed, Self::Active)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub folder_id: Option<FolderId>,
    pub page_count: u32,
    pub cover_index: u32,
    pub labels: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub status: DocumentStatus,
}

impl Document {
    /// Moves the document to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: DocumentStatus) -> Result<(), DomainError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn has_valid_cover(&self) -> bool {
        if self.page_count == 0 {
            self.cover_index == 0
        } else {
            self.cover_index < self.page_count
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub parent_id: Option<FolderId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// One JPEG image per page, wrapped in a PDF.
    Pdf,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "pdf" => Ok(Self::Pdf),
            other => Err(DomainError::UnknownVariant {
                kind: "export kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub kind: ExportKind,
    pub quality: u8,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            kind: ExportKind::Pdf,
            quality: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub id: ExportId,
    pub document_id: DocumentId,
    pub kind: ExportKind,
    pub artifact_path: String,
    pub settings_json: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_must_be_positive() {
        assert!(PageId::new(1).is_ok());
        assert!(matches!(
            FolderId::new(0),
            Err(DomainError::InvalidRecordId {
                kind: "folder",
                value: 0
            })
        ));
    }

    #[test]
    fn document_id_rejects_path_characters() {
        assert!(DocumentId::new("scan-2024_01").is_ok());
        assert!(DocumentId::new("").is_err());
        assert!(DocumentId::new("../etc").is_err());
        assert!(DocumentId::new("a/b").is_err());
        assert!(DocumentId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn lifecycle_allows_restore_but_not_back_to_draft() {
        let mut doc = Document {
            id: DocumentId::new("d1").expect("id"),
            title: "Receipts".to_string(),
            folder_id: None,
            page_count: 0,
            cover_index: 0,
            labels: vec![],
            created_at: "1".to_string(),
            updated_at: "1".to_string(),
            status: DocumentStatus::Draft,
        };

        doc.transition(DocumentStatus::Active).expect("activate");
        doc.transition(DocumentStatus::Trashed).expect("trash");
        doc.transition(DocumentStatus::Active).expect("restore");
        assert!(matches!(
            doc.transition(DocumentStatus::Draft),
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn status_and_kind_parse_their_own_names() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Active,
            DocumentStatus::Trashed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Ok(status));
        }
        assert_eq!(ExportKind::parse("pdf"), Ok(ExportKind::Pdf));
        assert!(ExportKind::parse("zip").is_err());
    }
}
