//! In-memory stand-ins for the ports, shared by the application tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use scanshelf_domain::{
    detect_image_kind, DecodedImage, Document, DocumentId, DocumentStatus, EncodedPage,
    ExportId, ExportKind, ExportRecord, Folder, FolderId, ImageKind, Page, PageId, Raster,
};

use crate::{
    ApplicationError, AssetStore, CacheCleanReport, CatalogRepository, Clock, ExportWriter,
    FileScanSummary, FileScanner, ImageDecoder, NewDocument, NewExport, NewPage, PageAssetPaths,
    PageIndex, PageIndexUpdate, PageMove, PageRenderer, PageSource, RenderOutcome, ScannedFile,
    ThumbnailArtifact,
};

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    documents: BTreeMap<DocumentId, Document>,
    pages: BTreeMap<PageId, Page>,
    folders: BTreeMap<FolderId, Folder>,
    exports: Vec<ExportRecord>,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn page_mut(&mut self, page_id: PageId) -> Result<&mut Page, ApplicationError> {
        self.pages
            .get_mut(&page_id)
            .ok_or_else(|| ApplicationError::NotFound(format!("page id={page_id}")))
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    fail_insert: AtomicBool,
}

impl MemoryCatalog {
    pub fn fail_next_page_insert(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().expect("catalog lock")
    }
}

impl CatalogRepository for MemoryCatalog {
    fn initialize(&self) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn insert_document(&self, document: &NewDocument) -> Result<Document, ApplicationError> {
        let mut state = self.state();
        if state.documents.contains_key(&document.id) {
            return Err(ApplicationError::Persistence(format!(
                "duplicate document {}",
                document.id
            )));
        }
        let record = Document {
            id: document.id.clone(),
            title: document.title.clone(),
            folder_id: document.folder_id,
            page_count: 0,
            cover_index: 0,
            labels: document.labels.clone(),
            created_at: document.created_at.clone(),
            updated_at: document.created_at.clone(),
            status: DocumentStatus::Draft,
        };
        state.documents.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn find_document(&self, id: &DocumentId) -> Result<Option<Document>, ApplicationError> {
        Ok(self.state().documents.get(id).cloned())
    }

    fn list_documents(&self) -> Result<Vec<Document>, ApplicationError> {
        Ok(self.state().documents.values().cloned().collect())
    }

    fn update_document(&self, document: &Document) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let slot = state
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| ApplicationError::NotFound(format!("document {}", document.id)))?;
        *slot = document.clone();
        Ok(())
    }

    fn delete_document(&self, id: &DocumentId) -> Result<(), ApplicationError> {
        let mut state = self.state();
        state.documents.remove(id);
        state.pages.retain(|_, page| &page.document_id != id);
        state.exports.retain(|export| &export.document_id != id);
        Ok(())
    }

    fn insert_page(&self, page: &NewPage) -> Result<Page, ApplicationError> {
        if self.fail_insert.swap(false, Ordering::SeqCst) {
            return Err(ApplicationError::Persistence("database is locked".to_string()));
        }
        let mut state = self.state();
        let id = PageId::new(state.next_id())?;
        let record = Page {
            id,
            document_id: page.document_id.clone(),
            index: page.index,
            original_path: page.original_path.clone(),
            rendered_path: None,
            edit_ops: None,
            rendered_edit_ops: None,
            width: page.width,
            height: page.height,
            dpi: page.dpi,
            ocr_language: None,
            ocr_done: false,
            updated_at: page.updated_at.clone(),
        };
        state.pages.insert(id, record.clone());
        Ok(record)
    }

    fn list_pages(&self, document_id: &DocumentId) -> Result<Vec<Page>, ApplicationError> {
        let mut pages: Vec<Page> = self
            .state()
            .pages
            .values()
            .filter(|page| &page.document_id == document_id)
            .cloned()
            .collect();
        pages.sort_by_key(|page| (page.index, page.id));
        Ok(pages)
    }

    fn find_page(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<Option<Page>, ApplicationError> {
        Ok(self
            .list_pages(document_id)?
            .into_iter()
            .find(|page| page.index == index))
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), ApplicationError> {
        self.state().pages.remove(&page_id);
        Ok(())
    }

    fn set_page_index(
        &self,
        update: &PageIndexUpdate,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let page = state.page_mut(update.page_id)?;
        page.index = update.index;
        page.original_path = update.original_path.clone();
        page.rendered_path = update.rendered_path.clone();
        page.updated_at = updated_at.to_string();
        Ok(())
    }

    fn set_page_edit(
        &self,
        page_id: PageId,
        edit_ops_json: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let page = state.page_mut(page_id)?;
        page.edit_ops = edit_ops_json.map(str::to_string);
        page.updated_at = updated_at.to_string();
        Ok(())
    }

    fn set_rendered_asset(
        &self,
        page_id: PageId,
        rendered_path: Option<&str>,
        rendered_edit_ops: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let page = state.page_mut(page_id)?;
        page.rendered_path = rendered_path.map(str::to_string);
        page.rendered_edit_ops = rendered_edit_ops.map(str::to_string);
        page.updated_at = updated_at.to_string();
        Ok(())
    }

    fn replace_original(
        &self,
        page_id: PageId,
        original_path: &str,
        width: u32,
        height: u32,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let page = state.page_mut(page_id)?;
        page.original_path = original_path.to_string();
        page.width = width;
        page.height = height;
        page.rendered_path = None;
        page.rendered_edit_ops = None;
        page.updated_at = updated_at.to_string();
        Ok(())
    }

    fn insert_folder(
        &self,
        name: &str,
        parent_id: Option<FolderId>,
    ) -> Result<Folder, ApplicationError> {
        let mut state = self.state();
        let folder = Folder {
            id: FolderId::new(state.next_id())?,
            name: name.to_string(),
            parent_id,
        };
        state.folders.insert(folder.id, folder.clone());
        Ok(folder)
    }

    fn list_folders(&self) -> Result<Vec<Folder>, ApplicationError> {
        Ok(self.state().folders.values().cloned().collect())
    }

    fn delete_folder(&self, id: FolderId) -> Result<(), ApplicationError> {
        let mut state = self.state();
        let parent = state
            .folders
            .remove(&id)
            .ok_or_else(|| ApplicationError::NotFound(format!("folder id={id}")))?
            .parent_id;
        for folder in state.folders.values_mut() {
            if folder.parent_id == Some(id) {
                folder.parent_id = parent;
            }
        }
        for document in state.documents.values_mut() {
            if document.folder_id == Some(id) {
                document.folder_id = None;
            }
        }
        Ok(())
    }

    fn insert_export(&self, export: &NewExport) -> Result<ExportRecord, ApplicationError> {
        let mut state = self.state();
        let record = ExportRecord {
            id: ExportId::new(state.next_id())?,
            document_id: export.document_id.clone(),
            kind: export.kind,
            artifact_path: export.artifact_path.clone(),
            settings_json: export.settings_json.clone(),
            created_at: export.created_at.clone(),
        };
        state.exports.push(record.clone());
        Ok(record)
    }

    fn list_exports(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ExportRecord>, ApplicationError> {
        Ok(self
            .state()
            .exports
            .iter()
            .filter(|export| &export.document_id == document_id)
            .cloned()
            .collect())
    }
}

/// Asset store that models every page directory as one string of content,
/// so tests can follow where each original ends up.
pub struct MemoryAssets {
    root: PathBuf,
    dirs: Mutex<BTreeMap<PathBuf, String>>,
    sidecars: Mutex<BTreeMap<PathBuf, String>>,
    removed_documents: Mutex<Vec<DocumentId>>,
    clean_requests: Mutex<Vec<u64>>,
    fail_store: AtomicBool,
}

impl Default for MemoryAssets {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/assets"),
            dirs: Mutex::default(),
            sidecars: Mutex::default(),
            removed_documents: Mutex::default(),
            clean_requests: Mutex::default(),
            fail_store: AtomicBool::new(false),
        }
    }
}

impl MemoryAssets {
    pub fn content_of(&self, dir: &Path) -> Option<String> {
        self.dirs.lock().expect("dirs lock").get(dir).cloned()
    }

    pub fn sidecar(&self, path: &Path) -> Option<String> {
        self.sidecars.lock().expect("sidecar lock").get(path).cloned()
    }

    pub fn removed_documents(&self) -> Vec<DocumentId> {
        self.removed_documents.lock().expect("removed lock").clone()
    }

    pub fn clean_requests(&self) -> Vec<u64> {
        self.clean_requests.lock().expect("clean lock").clone()
    }

    pub fn fail_next_store(&self) {
        self.fail_store.store(true, Ordering::SeqCst);
    }
}

impl AssetStore for MemoryAssets {
    fn page_paths(&self, document_id: &DocumentId, index: u32) -> PageAssetPaths {
        let dir = self
            .root
            .join(document_id.as_str())
            .join(format!("page_{index:04}"));
        PageAssetPaths {
            original: dir.join("original.jpg"),
            rendered: dir.join("render.jpg"),
            edit_sidecar: dir.join("edit.json"),
            dir,
        }
    }

    fn store_original(
        &self,
        document_id: &DocumentId,
        index: u32,
        source: &PageSource,
    ) -> Result<PathBuf, ApplicationError> {
        if self.fail_store.swap(false, Ordering::SeqCst) {
            return Err(ApplicationError::Storage("disk full".to_string()));
        }
        let content = match source {
            PageSource::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            PageSource::Raster(raster) => format!("raster {}x{}", raster.width, raster.height),
        };
        let paths = self.page_paths(document_id, index);
        self.dirs
            .lock()
            .expect("dirs lock")
            .insert(paths.dir, content);
        Ok(paths.original)
    }

    fn write_edit_sidecar(
        &self,
        document_id: &DocumentId,
        index: u32,
        edit_ops_json: &str,
    ) -> Result<(), ApplicationError> {
        let path = self.page_paths(document_id, index).edit_sidecar;
        self.sidecars
            .lock()
            .expect("sidecar lock")
            .insert(path, edit_ops_json.to_string());
        Ok(())
    }

    fn remove_page_assets(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<(), ApplicationError> {
        let dir = self.page_paths(document_id, index).dir;
        self.dirs.lock().expect("dirs lock").remove(&dir);
        Ok(())
    }

    fn relocate_pages(
        &self,
        document_id: &DocumentId,
        moves: &[PageMove],
    ) -> Result<(), ApplicationError> {
        let mut dirs = self.dirs.lock().expect("dirs lock");
        let mut staged = Vec::with_capacity(moves.len());
        for page_move in moves {
            let content = dirs.remove(&page_move.from_dir).ok_or_else(|| {
                ApplicationError::Storage(format!("{} missing", page_move.from_dir.display()))
            })?;
            staged.push((page_move.to, content));
        }
        for (to, content) in staged {
            dirs.insert(self.page_paths(document_id, to).dir, content);
        }
        Ok(())
    }

    fn remove_document_assets(&self, document_id: &DocumentId) -> Result<(), ApplicationError> {
        let prefix = self.root.join(document_id.as_str());
        self.dirs
            .lock()
            .expect("dirs lock")
            .retain(|dir, _| !dir.starts_with(&prefix));
        self.removed_documents
            .lock()
            .expect("removed lock")
            .push(document_id.clone());
        Ok(())
    }

    fn export_path(
        &self,
        document_id: &DocumentId,
        version: u32,
        kind: ExportKind,
    ) -> Result<PathBuf, ApplicationError> {
        Ok(self
            .root
            .join(document_id.as_str())
            .join("exports")
            .join(format!("v{version}.{}", kind.extension())))
    }

    fn clean_cache(&self, max_bytes: u64) -> Result<CacheCleanReport, ApplicationError> {
        self.clean_requests
            .lock()
            .expect("clean lock")
            .push(max_bytes);
        Ok(CacheCleanReport {
            bytes_before: 2 * max_bytes,
            bytes_after: max_bytes,
            files_removed: 3,
        })
    }
}

pub struct FixedDecoder;

impl ImageDecoder for FixedDecoder {
    fn probe(&self, path: &Path) -> Result<DecodedImage, ApplicationError> {
        Ok(DecodedImage {
            width: 64,
            height: 48,
            kind: detect_image_kind(path),
        })
    }
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now_timestamp_string(&self) -> String {
        "123".to_string()
    }
}

/// Scanner that reports a fixed list of files, skipping unsupported ones.
#[derive(Default)]
pub struct ListScanner {
    pub files: Vec<PathBuf>,
}

impl FileScanner for ListScanner {
    fn scan_supported(&self, _folder: &str) -> Result<FileScanSummary, ApplicationError> {
        let mut files: Vec<ScannedFile> = self
            .files
            .iter()
            .filter(|path| detect_image_kind(path) != ImageKind::Unsupported)
            .map(|path| ScannedFile {
                canonical_path: path.clone(),
                extension: path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default(),
                file_size: 100,
                image_kind: detect_image_kind(path),
            })
            .collect();
        files.sort_by(|a, b| a.canonical_path.cmp(&b.canonical_path));
        Ok(FileScanSummary {
            scanned_files: self.files.len(),
            supported_files: files.len(),
            files,
        })
    }
}

/// Renderer that succeeds for every page except the ones marked failing.
#[derive(Default)]
pub struct ScriptedRenderer {
    failing: Mutex<BTreeSet<u32>>,
    thumbnails: Mutex<Vec<u32>>,
}

impl ScriptedRenderer {
    pub fn fail_page(&self, index: u32) {
        self.failing.lock().expect("failing lock").insert(index);
    }

    pub fn thumbnails(&self) -> Vec<u32> {
        self.thumbnails.lock().expect("thumbs lock").clone()
    }

    fn check(&self, document_id: &DocumentId, index: u32) -> Result<(), ApplicationError> {
        if self.failing.lock().expect("failing lock").contains(&index) {
            return Err(ApplicationError::MissingAsset(format!(
                "{document_id} page {index}"
            )));
        }
        Ok(())
    }

    fn raster(width: u32) -> Result<Raster, ApplicationError> {
        let height = width * 3 / 4;
        Ok(Raster::new(
            width,
            height,
            vec![255; (width * height * 4) as usize],
        )?)
    }
}

impl PageRenderer for ScriptedRenderer {
    fn render_preview(
        &self,
        document_id: &DocumentId,
        index: u32,
        target_width: u32,
    ) -> Result<Raster, ApplicationError> {
        self.check(document_id, index)?;
        Self::raster(target_width)
    }

    fn render_final(
        &self,
        document_id: &DocumentId,
        index: u32,
        _quality: u8,
    ) -> Result<Raster, ApplicationError> {
        self.check(document_id, index)?;
        Self::raster(64)
    }

    fn render_final_jpeg(
        &self,
        document_id: &DocumentId,
        index: u32,
        _quality: u8,
    ) -> Result<EncodedPage, ApplicationError> {
        self.check(document_id, index)?;
        Ok(EncodedPage {
            page_index: index,
            width: 64,
            height: 48,
            dpi: 300,
            jpeg: vec![0xFF, 0xD8, index as u8, 0xFF, 0xD9],
        })
    }

    fn render_and_persist(
        &self,
        document_id: &DocumentId,
        index: u32,
        _quality: u8,
    ) -> Result<RenderOutcome, ApplicationError> {
        self.check(document_id, index)?;
        Ok(RenderOutcome::Persisted {
            path: PathBuf::from(format!("/assets/{document_id}/page_{index:04}/render.jpg")),
        })
    }

    fn render_thumbnail(
        &self,
        document_id: &DocumentId,
        index: u32,
        max_edge: u32,
    ) -> Result<ThumbnailArtifact, ApplicationError> {
        self.check(document_id, index)?;
        self.thumbnails.lock().expect("thumbs lock").push(index);
        Ok(ThumbnailArtifact {
            page_index: index,
            file_path: format!("/assets/cache/thumbs/{document_id}/page_{index:04}.jpg"),
            width: max_edge,
            height: max_edge * 3 / 4,
        })
    }
}

#[derive(Default)]
pub struct RecordingExporter {
    writes: Mutex<Vec<(PathBuf, Vec<u32>)>>,
}

impl RecordingExporter {
    pub fn writes(&self) -> Vec<(PathBuf, Vec<u32>)> {
        self.writes.lock().expect("writes lock").clone()
    }
}

impl ExportWriter for RecordingExporter {
    fn write_export(
        &self,
        _kind: ExportKind,
        pages: &[EncodedPage],
        destination: &Path,
    ) -> Result<(), ApplicationError> {
        self.writes.lock().expect("writes lock").push((
            destination.to_path_buf(),
            pages.iter().map(|page| page.page_index).collect(),
        ));
        Ok(())
    }
}

pub struct Fixture {
    pub catalog: Arc<MemoryCatalog>,
    pub assets: Arc<MemoryAssets>,
    pub renderer: Arc<ScriptedRenderer>,
    pub exporter: Arc<RecordingExporter>,
    pub index: PageIndex,
}

impl Fixture {
    /// Inserts an empty draft document.
    pub fn document(&self, id: &str) -> DocumentId {
        let id = DocumentId::new(id).expect("document id");
        self.catalog
            .insert_document(&NewDocument {
                id: id.clone(),
                title: format!("Title of {id}"),
                folder_id: None,
                labels: vec![],
                created_at: "100".to_string(),
            })
            .expect("insert document");
        id
    }
}

pub fn fixture() -> Fixture {
    let catalog = Arc::new(MemoryCatalog::default());
    let assets = Arc::new(MemoryAssets::default());
    let index = PageIndex::new(
        catalog.clone(),
        assets.clone(),
        Arc::new(FixedDecoder),
        Arc::new(FixedClock),
    );
    Fixture {
        catalog,
        assets,
        renderer: Arc::new(ScriptedRenderer::default()),
        exporter: Arc::new(RecordingExporter::default()),
        index,
    }
}
