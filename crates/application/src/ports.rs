use std::path::{Path, PathBuf};

use scanshelf_domain::{
    DecodedImage, Document, DocumentId, EncodedPage, ExportKind, ExportRecord, Folder, FolderId,
    ImageKind, Page, PageId, Raster,
};

use crate::ApplicationError;

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: DocumentId,
    pub title: String,
    pub folder_id: Option<FolderId>,
    pub labels: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPage {
    pub document_id: DocumentId,
    pub index: u32,
    pub original_path: String,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub updated_at: String,
}

/// New position of one page together with the asset paths it has there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndexUpdate {
    pub page_id: PageId,
    pub index: u32,
    pub original_path: String,
    pub rendered_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExport {
    pub document_id: DocumentId,
    pub kind: ExportKind,
    pub artifact_path: String,
    pub settings_json: String,
    pub created_at: String,
}

/// Tabular store for documents, pages, folders and exports.
pub trait CatalogRepository: Send + Sync {
    fn initialize(&self) -> Result<(), ApplicationError>;

    fn insert_document(&self, document: &NewDocument) -> Result<Document, ApplicationError>;

    fn find_document(&self, id: &DocumentId) -> Result<Option<Document>, ApplicationError>;

    fn list_documents(&self) -> Result<Vec<Document>, ApplicationError>;

    fn update_document(&self, document: &Document) -> Result<(), ApplicationError>;

    /// Removes the document together with its pages and export records.
    fn delete_document(&self, id: &DocumentId) -> Result<(), ApplicationError>;

    fn insert_page(&self, page: &NewPage) -> Result<Page, ApplicationError>;

    /// Pages of a document ordered by index, then id.
    fn list_pages(&self, document_id: &DocumentId) -> Result<Vec<Page>, ApplicationError>;

    fn find_page(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<Option<Page>, ApplicationError>;

    fn delete_page(&self, page_id: PageId) -> Result<(), ApplicationError>;

    fn set_page_index(
        &self,
        update: &PageIndexUpdate,
        updated_at: &str,
    ) -> Result<(), ApplicationError>;

    /// Applies a batch of index updates. Stores with transactions override
    /// this to make the batch all-or-nothing; the default applies them one
    /// by one and relies on the load-time heal pass after a partial failure.
    fn apply_page_updates(
        &self,
        updates: &[PageIndexUpdate],
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        for update in updates {
            self.set_page_index(update, updated_at)?;
        }
        Ok(())
    }

    fn set_page_edit(
        &self,
        page_id: PageId,
        edit_ops_json: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError>;

    fn set_rendered_asset(
        &self,
        page_id: PageId,
        rendered_path: Option<&str>,
        rendered_edit_ops: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError>;

    fn replace_original(
        &self,
        page_id: PageId,
        original_path: &str,
        width: u32,
        height: u32,
        updated_at: &str,
    ) -> Result<(), ApplicationError>;

    fn insert_folder(
        &self,
        name: &str,
        parent_id: Option<FolderId>,
    ) -> Result<Folder, ApplicationError>;

    fn list_folders(&self) -> Result<Vec<Folder>, ApplicationError>;

    /// Detaches documents and re-parents children before removing the folder.
    fn delete_folder(&self, id: FolderId) -> Result<(), ApplicationError>;

    fn insert_export(&self, export: &NewExport) -> Result<ExportRecord, ApplicationError>;

    fn list_exports(&self, document_id: &DocumentId)
        -> Result<Vec<ExportRecord>, ApplicationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAssetPaths {
    pub dir: PathBuf,
    pub original: PathBuf,
    pub rendered: PathBuf,
    pub edit_sidecar: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMove {
    pub page_id: PageId,
    /// Directory the page's assets currently live in.
    pub from_dir: PathBuf,
    pub to: u32,
}

/// Image handed over by the capture or import surface.
#[derive(Debug, Clone)]
pub enum PageSource {
    File(PathBuf),
    Raster(Raster),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCleanReport {
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub files_removed: usize,
}

/// On-disk page assets laid out by document id and page index.
pub trait AssetStore: Send + Sync {
    fn page_paths(&self, document_id: &DocumentId, index: u32) -> PageAssetPaths;

    /// Writes `original.jpg` for the slot and returns its path.
    fn store_original(
        &self,
        document_id: &DocumentId,
        index: u32,
        source: &PageSource,
    ) -> Result<PathBuf, ApplicationError>;

    fn write_edit_sidecar(
        &self,
        document_id: &DocumentId,
        index: u32,
        edit_ops_json: &str,
    ) -> Result<(), ApplicationError>;

    fn remove_page_assets(&self, document_id: &DocumentId, index: u32)
        -> Result<(), ApplicationError>;

    /// Moves page directories so each page sits at its new index. Cached
    /// thumbnails of the document are dropped since they are keyed by index.
    fn relocate_pages(
        &self,
        document_id: &DocumentId,
        moves: &[PageMove],
    ) -> Result<(), ApplicationError>;

    fn remove_document_assets(&self, document_id: &DocumentId) -> Result<(), ApplicationError>;

    fn export_path(
        &self,
        document_id: &DocumentId,
        version: u32,
        kind: ExportKind,
    ) -> Result<PathBuf, ApplicationError>;

    fn clean_cache(&self, max_bytes: u64) -> Result<CacheCleanReport, ApplicationError>;
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub canonical_path: PathBuf,
    pub extension: String,
    pub file_size: u64,
    pub image_kind: ImageKind,
}

#[derive(Debug, Clone, Default)]
pub struct FileScanSummary {
    pub scanned_files: usize,
    pub supported_files: usize,
    pub files: Vec<ScannedFile>,
}

pub trait FileScanner: Send + Sync {
    /// Supported images under `folder`, sorted by path.
    fn scan_supported(&self, folder: &str) -> Result<FileScanSummary, ApplicationError>;
}

pub trait ImageDecoder: Send + Sync {
    fn probe(&self, path: &Path) -> Result<DecodedImage, ApplicationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailArtifact {
    pub page_index: u32,
    pub file_path: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Persisted { path: PathBuf },
    /// A newer render of the same page was issued; this output was discarded.
    Superseded,
}

pub trait PageRenderer: Send + Sync {
    fn render_preview(
        &self,
        document_id: &DocumentId,
        index: u32,
        target_width: u32,
    ) -> Result<Raster, ApplicationError>;

    fn render_final(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<Raster, ApplicationError>;

    fn render_final_jpeg(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<EncodedPage, ApplicationError>;

    fn render_and_persist(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<RenderOutcome, ApplicationError>;

    fn render_thumbnail(
        &self,
        document_id: &DocumentId,
        index: u32,
        max_edge: u32,
    ) -> Result<ThumbnailArtifact, ApplicationError>;
}

pub trait ExportWriter: Send + Sync {
    fn write_export(
        &self,
        kind: ExportKind,
        pages: &[EncodedPage],
        destination: &Path,
    ) -> Result<(), ApplicationError>;
}

pub trait Clock: Send + Sync {
    fn now_timestamp_string(&self) -> String;
}
