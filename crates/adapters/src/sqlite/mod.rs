mod queries;

use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;
use scanshelf_application::{
    ApplicationError, CatalogRepository, NewDocument, NewExport, NewPage, PageIndexUpdate,
};
use scanshelf_domain::{
    Document, DocumentId, DocumentStatus, ExportId, ExportRecord, Folder, FolderId, Page, PageId,
};

use crate::migrations::MIGRATIONS;

fn persistence(error: rusqlite::Error) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn expect_one(changed: usize, what: impl FnOnce() -> String) -> Result<(), ApplicationError> {
    if changed == 0 {
        return Err(ApplicationError::NotFound(what()));
    }
    Ok(())
}

fn labels_json(labels: &[String]) -> Result<String, ApplicationError> {
    serde_json::to_string(labels).map_err(|error| ApplicationError::Persistence(error.to_string()))
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogRepository {
    path: PathBuf,
}

impl SqliteCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open_connection(&self) -> Result<Connection, ApplicationError> {
        let conn = Connection::open(&self.path).map_err(persistence)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(persistence)?;
        Ok(conn)
    }

    fn require_page(&self, conn: &Connection, page_id: PageId) -> Result<Page, ApplicationError> {
        queries::find_page_by_id(conn, page_id.get())
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("page id={page_id}")))
    }
}

impl CatalogRepository for SqliteCatalogRepository {
    fn initialize(&self) -> Result<(), ApplicationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "catalog path must not be empty".to_string(),
            ));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|error| ApplicationError::Storage(error.to_string()))?;
            }
        }

        let conn = self.open_connection()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(persistence)?;

        for migration in MIGRATIONS {
            conn.execute_batch(migration).map_err(persistence)?;
        }

        Ok(())
    }

    fn insert_document(&self, document: &NewDocument) -> Result<Document, ApplicationError> {
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
        let conn = self.open_connection()?;
        queries::insert_document(&conn, &record, &labels_json(&record.labels)?)
            .map_err(persistence)?;
        Ok(record)
    }

    fn find_document(&self, id: &DocumentId) -> Result<Option<Document>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::find_document(&conn, id.as_str()).map_err(persistence)
    }

    fn list_documents(&self) -> Result<Vec<Document>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_documents(&conn).map_err(persistence)
    }

    fn update_document(&self, document: &Document) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed = queries::update_document(&conn, document, &labels_json(&document.labels)?)
            .map_err(persistence)?;
        expect_one(changed, || format!("document {}", document.id))
    }

    fn delete_document(&self, id: &DocumentId) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        conn.execute("DELETE FROM documents WHERE id = ?1", [id.as_str()])
            .map_err(persistence)?;
        Ok(())
    }

    fn insert_page(&self, page: &NewPage) -> Result<Page, ApplicationError> {
        let conn = self.open_connection()?;
        let id = queries::insert_page(
            &conn,
            page.document_id.as_str(),
            page.index,
            &page.original_path,
            (page.width, page.height),
            page.dpi,
            &page.updated_at,
        )
        .map_err(persistence)?;
        self.require_page(&conn, PageId::new(id)?)
    }

    fn list_pages(&self, document_id: &DocumentId) -> Result<Vec<Page>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_pages(&conn, document_id.as_str()).map_err(persistence)
    }

    fn find_page(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<Option<Page>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::find_page(&conn, document_id.as_str(), index).map_err(persistence)
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        conn.execute("DELETE FROM pages WHERE id = ?1", [page_id.get()])
            .map_err(persistence)?;
        Ok(())
    }

    fn set_page_index(
        &self,
        update: &PageIndexUpdate,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed = queries::set_page_index(
            &conn,
            update.page_id.get(),
            update.index,
            &update.original_path,
            update.rendered_path.as_deref(),
            updated_at,
        )
        .map_err(persistence)?;
        expect_one(changed, || format!("page id={}", update.page_id))
    }

    /// All updates land in one transaction or none do.
    fn apply_page_updates(
        &self,
        updates: &[PageIndexUpdate],
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let mut conn = self.open_connection()?;
        let tx = conn.transaction().map_err(persistence)?;
        for update in updates {
            let changed = queries::set_page_index(
                &tx,
                update.page_id.get(),
                update.index,
                &update.original_path,
                update.rendered_path.as_deref(),
                updated_at,
            )
            .map_err(persistence)?;
            expect_one(changed, || format!("page id={}", update.page_id))?;
        }
        tx.commit().map_err(persistence)
    }

    fn set_page_edit(
        &self,
        page_id: PageId,
        edit_ops_json: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed = queries::set_page_edit(&conn, page_id.get(), edit_ops_json, updated_at)
            .map_err(persistence)?;
        expect_one(changed, || format!("page id={page_id}"))
    }

    fn set_rendered_asset(
        &self,
        page_id: PageId,
        rendered_path: Option<&str>,
        rendered_edit_ops: Option<&str>,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed = queries::set_rendered_asset(
            &conn,
            page_id.get(),
            rendered_path,
            rendered_edit_ops,
            updated_at,
        )
        .map_err(persistence)?;
        expect_one(changed, || format!("page id={page_id}"))
    }

    fn replace_original(
        &self,
        page_id: PageId,
        original_path: &str,
        width: u32,
        height: u32,
        updated_at: &str,
    ) -> Result<(), ApplicationError> {
        let conn = self.open_connection()?;
        let changed = queries::replace_original(
            &conn,
            page_id.get(),
            original_path,
            (width, height),
            updated_at,
        )
        .map_err(persistence)?;
        expect_one(changed, || format!("page id={page_id}"))
    }

    fn insert_folder(
        &self,
        name: &str,
        parent_id: Option<FolderId>,
    ) -> Result<Folder, ApplicationError> {
        let conn = self.open_connection()?;
        let id = queries::insert_folder(&conn, name, parent_id.map(FolderId::get))
            .map_err(persistence)?;
        Ok(Folder {
            id: FolderId::new(id)?,
            name: name.to_string(),
            parent_id,
        })
    }

    fn list_folders(&self) -> Result<Vec<Folder>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_folders(&conn).map_err(persistence)
    }

    fn delete_folder(&self, id: FolderId) -> Result<(), ApplicationError> {
        let mut conn = self.open_connection()?;
        let tx = conn.transaction().map_err(persistence)?;
        let parent = queries::find_folder_parent(&tx, id.get())
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("folder id={id}")))?;
        queries::delete_folder(&tx, id.get(), parent).map_err(persistence)?;
        tx.commit().map_err(persistence)
    }

    fn insert_export(&self, export: &NewExport) -> Result<ExportRecord, ApplicationError> {
        let conn = self.open_connection()?;
        let id = queries::insert_export(
            &conn,
            export.document_id.as_str(),
            export.kind,
            &export.artifact_path,
            &export.settings_json,
            &export.created_at,
        )
        .map_err(persistence)?;
        Ok(ExportRecord {
            id: ExportId::new(id)?,
            document_id: export.document_id.clone(),
            kind: export.kind,
            artifact_path: export.artifact_path.clone(),
            settings_json: export.settings_json.clone(),
            created_at: export.created_at.clone(),
        })
    }

    fn list_exports(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ExportRecord>, ApplicationError> {
        let conn = self.open_connection()?;
        queries::list_exports(&conn, document_id.as_str()).map_err(persistence)
    }
}
