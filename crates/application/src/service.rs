use std::sync::Arc;

use scanshelf_domain::{Document, DocumentId, DocumentStatus, EditOperation, Folder, Page};
use tracing::{debug, info, warn};

use crate::{
    AddPageCommand, ApplicationError, AssetStore, BootstrapCatalogCommand, CatalogRepository,
    Clock, CreateDocumentCommand, CreateFolderCommand, DeleteFolderCommand, DeletePageCommand,
    FileScanner, ImageDecoder, ImportFolderCommand, ImportSummary, ListDocumentsCommand,
    ListFoldersCommand, ListPagesCommand, NewDocument, OpenDocumentCommand, PageIndex, PageSource,
    PurgeDocumentCommand, ReorderPageCommand, ReplaceOriginalCommand, SetDocumentStatusCommand,
    SetPageEditCommand, ShowPageEditCommand,
};

pub struct ApplicationService {
    catalog: Arc<dyn CatalogRepository>,
    assets: Arc<dyn AssetStore>,
    scanner: Arc<dyn FileScanner>,
    decoder: Arc<dyn ImageDecoder>,
    clock: Arc<dyn Clock>,
    index: PageIndex,
}

impl ApplicationService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        assets: Arc<dyn AssetStore>,
        scanner: Arc<dyn FileScanner>,
        decoder: Arc<dyn ImageDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let index = PageIndex::new(
            catalog.clone(),
            assets.clone(),
            decoder.clone(),
            clock.clone(),
        );
        Self {
            catalog,
            assets,
            scanner,
            decoder,
            clock,
            index,
        }
    }

    pub fn bootstrap_catalog(
        &self,
        _command: BootstrapCatalogCommand,
    ) -> Result<(), ApplicationError> {
        self.catalog.initialize()
    }

    pub fn create_document(
        &self,
        command: CreateDocumentCommand,
    ) -> Result<Document, ApplicationError> {
        let title = command.title.trim();
        if title.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "document title must not be empty".to_string(),
            ));
        }
        if let Some(folder_id) = command.folder_id {
            let known = self
                .catalog
                .list_folders()?
                .iter()
                .any(|folder| folder.id == folder_id);
            if !known {
                return Err(ApplicationError::NotFound(format!("folder id={folder_id}")));
            }
        }

        let now = self.clock.now_timestamp_string();
        let id = self.fresh_document_id(&now)?;
        let document = self.catalog.insert_document(&NewDocument {
            id,
            title: title.to_string(),
            folder_id: command.folder_id,
            labels: command.labels,
            created_at: now,
        })?;
        info!(document = %document.id, "document created");
        Ok(document)
    }

    pub fn list_documents(
        &self,
        _command: ListDocumentsCommand,
    ) -> Result<Vec<Document>, ApplicationError> {
        self.catalog.list_documents()
    }

    pub fn open_document(
        &self,
        command: OpenDocumentCommand,
    ) -> Result<Document, ApplicationError> {
        self.index.heal(&command.document_id)
    }

    pub fn list_pages(&self, command: ListPagesCommand) -> Result<Vec<Page>, ApplicationError> {
        self.require_document(&command.document_id)?;
        self.catalog.list_pages(&command.document_id)
    }

    pub fn add_page(&self, command: AddPageCommand) -> Result<Page, ApplicationError> {
        self.index.add_page(
            &command.document_id,
            &command.source,
            command.index,
            command.dpi,
        )
    }

    pub fn import_folder(
        &self,
        command: ImportFolderCommand,
    ) -> Result<ImportSummary, ApplicationError> {
        if command.folder.trim().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "folder path must not be empty".to_string(),
            ));
        }
        self.require_document(&command.document_id)?;

        let scan = self.scanner.scan_supported(&command.folder)?;
        let mut summary = ImportSummary {
            scanned_files: scan.scanned_files,
            supported_files: scan.supported_files,
            ..ImportSummary::default()
        };

        for file in scan.files {
            let source = PageSource::File(file.canonical_path.clone());
            match self
                .index
                .add_page(&command.document_id, &source, None, command.dpi)
            {
                Ok(page) => {
                    debug!(page = page.index, path = %file.canonical_path.display(), "imported");
                    summary.imported += 1;
                }
                Err(error) if error.is_fatal_for_page() => {
                    warn!(path = %file.canonical_path.display(), %error, "skipping file");
                    summary
                        .skipped
                        .push(file.canonical_path.to_string_lossy().to_string());
                }
                Err(error) => return Err(error),
            }
        }

        info!(
            document = %command.document_id,
            imported = summary.imported,
            skipped = summary.skipped.len(),
            "folder imported"
        );
        Ok(summary)
    }

    pub fn reorder_page(&self, command: ReorderPageCommand) -> Result<Document, ApplicationError> {
        self.require_editable(&command.document_id)?;
        self.index
            .reorder(&command.document_id, command.from, command.to)
    }

    pub fn delete_page(&self, command: DeletePageCommand) -> Result<Document, ApplicationError> {
        self.require_editable(&command.document_id)?;
        self.index.delete_page(&command.document_id, command.index)
    }

    /// Validates and stores the record; the identity record is stored as
    /// absent. The sidecar next to the original always gets the full record.
    pub fn set_page_edit(&self, command: SetPageEditCommand) -> Result<(), ApplicationError> {
        command.edit.validate()?;
        self.require_editable(&command.document_id)?;
        let page = self.require_page(&command.document_id, command.index)?;

        let edit_json = EditOperation::serialize(Some(&command.edit));
        self.assets
            .write_edit_sidecar(&command.document_id, command.index, &edit_json)?;
        let stored = (!command.edit.is_identity()).then_some(edit_json.as_str());
        let now = self.clock.now_timestamp_string();
        self.catalog.set_page_edit(page.id, stored, &now)
    }

    pub fn show_page_edit(
        &self,
        command: ShowPageEditCommand,
    ) -> Result<EditOperation, ApplicationError> {
        let page = self.require_page(&command.document_id, command.index)?;
        let Some(text) = page.edit_ops.as_deref() else {
            return Ok(EditOperation::identity());
        };
        Ok(EditOperation::parse(text).unwrap_or_else(|error| {
            warn!(page = %page.id, %error, "malformed edit record, using identity");
            EditOperation::identity()
        }))
    }

    pub fn replace_original(
        &self,
        command: ReplaceOriginalCommand,
    ) -> Result<Page, ApplicationError> {
        self.require_editable(&command.document_id)?;
        let page = self.require_page(&command.document_id, command.index)?;
        if let PageSource::File(path) = &command.source {
            self.decoder.probe(path)?;
        }

        let original =
            self.assets
                .store_original(&command.document_id, command.index, &command.source)?;
        let decoded = self.decoder.probe(&original)?;
        let now = self.clock.now_timestamp_string();
        self.catalog.replace_original(
            page.id,
            &original.to_string_lossy(),
            decoded.width,
            decoded.height,
            &now,
        )?;
        self.require_page(&command.document_id, command.index)
    }

    pub fn set_document_status(
        &self,
        command: SetDocumentStatusCommand,
    ) -> Result<Document, ApplicationError> {
        let mut document = self.require_document(&command.document_id)?;
        document.transition(command.status)?;
        document.updated_at = self.clock.now_timestamp_string();
        self.catalog.update_document(&document)?;
        Ok(document)
    }

    /// Removes a trashed document with its pages, exports and asset tree.
    pub fn purge_document(&self, command: PurgeDocumentCommand) -> Result<(), ApplicationError> {
        let document = self.require_document(&command.document_id)?;
        if document.status != DocumentStatus::Trashed {
            return Err(ApplicationError::InvalidInput(format!(
                "document {} must be trashed before it is purged",
                document.id
            )));
        }
        self.assets.remove_document_assets(&document.id)?;
        self.catalog.delete_document(&document.id)?;
        info!(document = %document.id, "document purged");
        Ok(())
    }

    pub fn create_folder(&self, command: CreateFolderCommand) -> Result<Folder, ApplicationError> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "folder name must not be empty".to_string(),
            ));
        }
        if let Some(parent_id) = command.parent_id {
            if !self
                .catalog
                .list_folders()?
                .iter()
                .any(|folder| folder.id == parent_id)
            {
                return Err(ApplicationError::NotFound(format!("folder id={parent_id}")));
            }
        }
        self.catalog.insert_folder(name, command.parent_id)
    }

    pub fn delete_folder(&self, command: DeleteFolderCommand) -> Result<(), ApplicationError> {
        self.catalog.delete_folder(command.folder_id)
    }

    pub fn list_folders(&self, _command: ListFoldersCommand) -> Result<Vec<Folder>, ApplicationError> {
        self.catalog.list_folders()
    }

    fn fresh_document_id(&self, now: &str) -> Result<DocumentId, ApplicationError> {
        let stamp: String = now
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(40)
            .collect();
        let base = format!("doc-{stamp}");
        let mut candidate = DocumentId::new(base.clone())?;
        let mut suffix = 2;
        while self.catalog.find_document(&candidate)?.is_some() {
            candidate = DocumentId::new(format!("{base}-{suffix}"))?;
            suffix += 1;
        }
        Ok(candidate)
    }

    fn require_document(&self, document_id: &DocumentId) -> Result<Document, ApplicationError> {
        self.catalog
            .find_document(document_id)?
            .ok_or_else(|| ApplicationError::NotFound(format!("document {document_id}")))
    }

    fn require_editable(&self, document_id: &DocumentId) -> Result<Document, ApplicationError> {
        let document = self.require_document(document_id)?;
        if document.status == DocumentStatus::Trashed {
            return Err(ApplicationError::InvalidInput(format!(
                "document {document_id} is trashed"
            )));
        }
        Ok(document)
    }

    fn require_page(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<Page, ApplicationError> {
        self.catalog
            .find_page(document_id, index)?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("page {index} of document {document_id}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use scanshelf_domain::{FilterMode, FilterSettings, Rotation};

    use super::*;
    use crate::fakes::{fixture, FixedClock, FixedDecoder, Fixture, ListScanner};

    fn service_with(fixture: &Fixture, files: Vec<PathBuf>) -> ApplicationService {
        ApplicationService::new(
            fixture.catalog.clone(),
            fixture.assets.clone(),
            Arc::new(ListScanner { files }),
            Arc::new(FixedDecoder),
            Arc::new(FixedClock),
        )
    }

    fn create(service: &ApplicationService, title: &str) -> Document {
        service
            .create_document(CreateDocumentCommand {
                title: title.to_string(),
                folder_id: None,
                labels: vec!["tax".to_string()],
            })
            .expect("create document")
    }

    fn add(service: &ApplicationService, document_id: &DocumentId, name: &str) -> Page {
        service
            .add_page(AddPageCommand {
                document_id: document_id.clone(),
                source: PageSource::File(PathBuf::from(name)),
                index: None,
                dpi: 300,
            })
            .expect("add page")
    }

    #[test]
    fn created_documents_get_distinct_ids() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);

        let first = create(&service, "Receipts");
        let second = create(&service, "Receipts again");

        assert_eq!(first.id.as_str(), "doc-123");
        assert_eq!(second.id.as_str(), "doc-123-2");
        assert_eq!(first.status, DocumentStatus::Draft);
        assert_eq!(
            service
                .list_documents(ListDocumentsCommand)
                .expect("list")
                .len(),
            2
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let result = service.create_document(CreateDocumentCommand {
            title: "  ".to_string(),
            folder_id: None,
            labels: vec![],
        });
        assert!(matches!(result, Err(ApplicationError::InvalidInput(_))));
    }

    #[test]
    fn import_folder_appends_supported_files_in_path_order() {
        let fixture = fixture();
        let service = service_with(
            &fixture,
            vec![
                PathBuf::from("/scans/b.png"),
                PathBuf::from("/scans/notes.txt"),
                PathBuf::from("/scans/a.jpg"),
            ],
        );
        let document = create(&service, "Imported");

        let summary = service
            .import_folder(ImportFolderCommand {
                document_id: document.id.clone(),
                folder: "/scans".to_string(),
                dpi: 200,
            })
            .expect("import");

        assert_eq!(summary.scanned_files, 3);
        assert_eq!(summary.supported_files, 2);
        assert_eq!(summary.imported, 2);
        let pages = service
            .list_pages(ListPagesCommand {
                document_id: document.id.clone(),
            })
            .expect("pages");
        let page_dirs: Vec<String> = pages
            .iter()
            .map(|page| {
                let dir = PathBuf::from(&page.original_path);
                fixture
                    .assets
                    .content_of(dir.parent().expect("dir"))
                    .expect("content")
            })
            .collect();
        assert_eq!(page_dirs, vec!["a.jpg", "b.png"]);
        assert_eq!(pages[0].dpi, 200);
    }

    #[test]
    fn identity_edit_is_stored_as_absent() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Edits");
        add(&service, &document.id, "p0.jpg");

        let edit = EditOperation {
            rotate: Rotation::Cw90,
            filter: FilterSettings {
                mode: FilterMode::Gray,
                ..FilterSettings::default()
            },
            ..EditOperation::identity()
        };
        service
            .set_page_edit(SetPageEditCommand {
                document_id: document.id.clone(),
                index: 0,
                edit,
            })
            .expect("set edit");
        let shown = service
            .show_page_edit(ShowPageEditCommand {
                document_id: document.id.clone(),
                index: 0,
            })
            .expect("show");
        assert_eq!(shown, edit);

        service
            .set_page_edit(SetPageEditCommand {
                document_id: document.id.clone(),
                index: 0,
                edit: EditOperation::identity(),
            })
            .expect("reset edit");
        let page = fixture
            .catalog
            .find_page(&document.id, 0)
            .expect("find")
            .expect("page");
        assert_eq!(page.edit_ops, None);
        let sidecar = fixture
            .assets
            .sidecar(&fixture.assets.page_paths(&document.id, 0).edit_sidecar)
            .expect("sidecar written");
        assert_eq!(EditOperation::deserialize(&sidecar), EditOperation::identity());
    }

    #[test]
    fn out_of_range_edit_is_rejected_before_storage() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Edits");
        add(&service, &document.id, "p0.jpg");

        let mut edit = EditOperation::identity();
        edit.filter.brightness = 3.0;
        let result = service.set_page_edit(SetPageEditCommand {
            document_id: document.id.clone(),
            index: 0,
            edit,
        });

        assert!(matches!(result, Err(ApplicationError::Domain(_))));
        assert!(fixture
            .assets
            .sidecar(&fixture.assets.page_paths(&document.id, 0).edit_sidecar)
            .is_none());
    }

    #[test]
    fn malformed_stored_edit_reads_as_identity() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Broken");
        let page = add(&service, &document.id, "p0.jpg");
        fixture
            .catalog
            .set_page_edit(page.id, Some("{not json"), "1")
            .expect("corrupt");

        let shown = service
            .show_page_edit(ShowPageEditCommand {
                document_id: document.id,
                index: 0,
            })
            .expect("show");
        assert!(shown.is_identity());
    }

    #[test]
    fn replace_original_keeps_edit_and_clears_render() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Rescan");
        let page = add(&service, &document.id, "first.jpg");
        fixture
            .catalog
            .set_page_edit(page.id, Some(r#"{"rotate":180}"#), "1")
            .expect("edit");
        fixture
            .catalog
            .set_rendered_asset(page.id, Some("/render.jpg"), Some(r#"{"rotate":180}"#), "1")
            .expect("render");

        let page = service
            .replace_original(ReplaceOriginalCommand {
                document_id: document.id.clone(),
                index: 0,
                source: PageSource::File(PathBuf::from("second.jpg")),
            })
            .expect("rescan");

        assert_eq!(page.rendered_path, None);
        assert_eq!(page.edit_operation().rotate, Rotation::Cw180);
        assert!(page.needs_render());
        assert_eq!(
            fixture
                .assets
                .content_of(&fixture.assets.page_paths(&document.id, 0).dir)
                .as_deref(),
            Some("second.jpg")
        );
    }

    #[test]
    fn trashed_documents_reject_edits_until_restored() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Old");
        add(&service, &document.id, "a.jpg");
        add(&service, &document.id, "b.jpg");

        service
            .set_document_status(SetDocumentStatusCommand {
                document_id: document.id.clone(),
                status: DocumentStatus::Trashed,
            })
            .expect("trash");
        assert!(matches!(
            service.reorder_page(ReorderPageCommand {
                document_id: document.id.clone(),
                from: 0,
                to: 1,
            }),
            Err(ApplicationError::InvalidInput(_))
        ));

        service
            .set_document_status(SetDocumentStatusCommand {
                document_id: document.id.clone(),
                status: DocumentStatus::Active,
            })
            .expect("restore");
        service
            .reorder_page(ReorderPageCommand {
                document_id: document.id,
                from: 0,
                to: 1,
            })
            .expect("reorder after restore");
    }

    #[test]
    fn purge_requires_trash_and_removes_everything() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Gone");
        add(&service, &document.id, "a.jpg");

        assert!(matches!(
            service.purge_document(PurgeDocumentCommand {
                document_id: document.id.clone(),
            }),
            Err(ApplicationError::InvalidInput(_))
        ));

        service
            .set_document_status(SetDocumentStatusCommand {
                document_id: document.id.clone(),
                status: DocumentStatus::Trashed,
            })
            .expect("trash");
        service
            .purge_document(PurgeDocumentCommand {
                document_id: document.id.clone(),
            })
            .expect("purge");

        assert!(fixture
            .catalog
            .find_document(&document.id)
            .expect("find")
            .is_none());
        assert!(fixture
            .catalog
            .list_pages(&document.id)
            .expect("pages")
            .is_empty());
        assert_eq!(fixture.assets.removed_documents(), vec![document.id]);
    }

    #[test]
    fn deleting_folder_detaches_documents_and_reparents_children() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let root = service
            .create_folder(CreateFolderCommand {
                name: "Home".to_string(),
                parent_id: None,
            })
            .expect("root");
        let middle = service
            .create_folder(CreateFolderCommand {
                name: "Bills".to_string(),
                parent_id: Some(root.id),
            })
            .expect("middle");
        let leaf = service
            .create_folder(CreateFolderCommand {
                name: "2024".to_string(),
                parent_id: Some(middle.id),
            })
            .expect("leaf");
        let document = service
            .create_document(CreateDocumentCommand {
                title: "Power".to_string(),
                folder_id: Some(middle.id),
                labels: vec![],
            })
            .expect("document");

        service
            .delete_folder(DeleteFolderCommand {
                folder_id: middle.id,
            })
            .expect("delete folder");

        let folders = service.list_folders(ListFoldersCommand).expect("folders");
        let leaf = folders
            .iter()
            .find(|folder| folder.id == leaf.id)
            .expect("leaf kept");
        assert_eq!(leaf.parent_id, Some(root.id));
        let document = fixture
            .catalog
            .find_document(&document.id)
            .expect("find")
            .expect("document");
        assert_eq!(document.folder_id, None);
    }

    #[test]
    fn open_document_heals_page_count() {
        let fixture = fixture();
        let service = service_with(&fixture, vec![]);
        let document = create(&service, "Drift");
        add(&service, &document.id, "a.jpg");
        let mut stored = fixture
            .catalog
            .find_document(&document.id)
            .expect("find")
            .expect("document");
        stored.page_count = 5;
        fixture.catalog.update_document(&stored).expect("update");

        let healed = service
            .open_document(OpenDocumentCommand {
                document_id: document.id,
            })
            .expect("open");
        assert_eq!(healed.page_count, 1);
    }
}
