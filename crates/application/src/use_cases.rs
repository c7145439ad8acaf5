use scanshelf_domain::{DocumentId, DocumentStatus, EditOperation, FolderId};

use crate::PageSource;

#[derive(Debug, Clone, Default)]
pub struct BootstrapCatalogCommand;

#[derive(Debug, Clone)]
pub struct CreateDocumentCommand {
    pub title: String,
    pub folder_id: Option<FolderId>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListDocumentsCommand;

/// Loads a document and repairs index drift left by an interrupted update.
#[derive(Debug, Clone)]
pub struct OpenDocumentCommand {
    pub document_id: DocumentId,
}

#[derive(Debug, Clone)]
pub struct ListPagesCommand {
    pub document_id: DocumentId,
}

#[derive(Debug, Clone)]
pub struct AddPageCommand {
    pub document_id: DocumentId,
    pub source: PageSource,
    /// Append when `None`.
    pub index: Option<u32>,
    pub dpi: u32,
}

#[derive(Debug, Clone)]
pub struct ImportFolderCommand {
    pub document_id: DocumentId,
    pub folder: String,
    pub dpi: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub scanned_files: usize,
    pub supported_files: usize,
    pub imported: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReorderPageCommand {
    pub document_id: DocumentId,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone)]
pub struct DeletePageCommand {
    pub document_id: DocumentId,
    pub index: u32,
}

#[derive(Debug, Clone)]
pub struct SetPageEditCommand {
    pub document_id: DocumentId,
    pub index: u32,
    pub edit: EditOperation,
}

#[derive(Debug, Clone)]
pub struct ShowPageEditCommand {
    pub document_id: DocumentId,
    pub index: u32,
}

/// Re-scan: swaps the original wholesale, keeping the page's edit record.
#[derive(Debug, Clone)]
pub struct ReplaceOriginalCommand {
    pub document_id: DocumentId,
    pub index: u32,
    pub source: PageSource,
}

#[derive(Debug, Clone)]
pub struct SetDocumentStatusCommand {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone)]
pub struct PurgeDocumentCommand {
    pub document_id: DocumentId,
}

#[derive(Debug, Clone)]
pub struct CreateFolderCommand {
    pub name: String,
    pub parent_id: Option<FolderId>,
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteFolderCommand {
    pub folder_id: FolderId,
}

#[derive(Debug, Clone, Default)]
pub struct ListFoldersCommand;
