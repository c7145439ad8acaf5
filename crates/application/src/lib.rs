mod error;
#[cfg(test)]
mod fakes;
mod index;
mod jobs;
mod ports;
mod service;
mod use_cases;

pub use error::ApplicationError;
pub use index::PageIndex;
pub use jobs::{Job, JobReport, JobRunner};
pub use ports::{
    AssetStore, CacheCleanReport, CatalogRepository, Clock, ExportWriter, FileScanSummary,
    FileScanner, ImageDecoder, NewDocument, NewExport, NewPage, PageAssetPaths, PageIndexUpdate,
    PageMove, PageRenderer, PageSource, RenderOutcome, ScannedFile, ThumbnailArtifact,
};
pub use service::ApplicationService;
pub use use_cases::{
    AddPageCommand, BootstrapCatalogCommand, CreateDocumentCommand, CreateFolderCommand,
    DeleteFolderCommand, DeletePageCommand, ImportFolderCommand, ImportSummary,
    ListDocumentsCommand, ListFoldersCommand, ListPagesCommand, OpenDocumentCommand,
    PurgeDocumentCommand, ReorderPageCommand, ReplaceOriginalCommand, SetDocumentStatusCommand,
    SetPageEditCommand, ShowPageEditCommand,
};
