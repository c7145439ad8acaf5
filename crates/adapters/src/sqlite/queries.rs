use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use scanshelf_domain::{
    Document, DocumentId, DocumentStatus, ExportId, ExportKind, ExportRecord, Folder, FolderId,
    Page, PageId,
};

const DOCUMENT_COLUMNS: &str = "id, title, folder_id, page_count, cover_index, labels_json,
    created_at, updated_at, status";

const PAGE_COLUMNS: &str = "id, document_id, page_index, original_path, rendered_path, edit_ops,
    rendered_edit_ops, width, height, dpi, ocr_language, ocr_done, updated_at";

fn conversion<E>(column: usize, kind: Type, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(error))
}

fn document_id_at(row: &Row<'_>, column: usize) -> Result<DocumentId> {
    let value: String = row.get(column)?;
    DocumentId::new(value).map_err(|error| conversion(column, Type::Text, error))
}

fn folder_id_at(row: &Row<'_>, column: usize) -> Result<Option<FolderId>> {
    let value: Option<i64> = row.get(column)?;
    value
        .map(FolderId::new)
        .transpose()
        .map_err(|error| conversion(column, Type::Integer, error))
}

fn document_from_row(row: &Row<'_>) -> Result<Document> {
    let labels_json: String = row.get(5)?;
    let status: String = row.get(8)?;
    Ok(Document {
        id: document_id_at(row, 0)?,
        title: row.get(1)?,
        folder_id: folder_id_at(row, 2)?,
        page_count: row.get(3)?,
        cover_index: row.get(4)?,
        labels: serde_json::from_str(&labels_json)
            .map_err(|error| conversion(5, Type::Text, error))?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        status: DocumentStatus::parse(&status).map_err(|error| conversion(8, Type::Text, error))?,
    })
}

fn page_from_row(row: &Row<'_>) -> Result<Page> {
    let id: i64 = row.get(0)?;
    Ok(Page {
        id: PageId::new(id).map_err(|error| conversion(0, Type::Integer, error))?,
        document_id: document_id_at(row, 1)?,
        index: row.get(2)?,
        original_path: row.get(3)?,
        rendered_path: row.get(4)?,
        edit_ops: row.get(5)?,
        rendered_edit_ops: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        dpi: row.get(9)?,
        ocr_language: row.get(10)?,
        ocr_done: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn folder_from_row(row: &Row<'_>) -> Result<Folder> {
    let id: i64 = row.get(0)?;
    Ok(Folder {
        id: FolderId::new(id).map_err(|error| conversion(0, Type::Integer, error))?,
        name: row.get(1)?,
        parent_id: folder_id_at(row, 2)?,
    })
}

fn export_from_row(row: &Row<'_>) -> Result<ExportRecord> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(2)?;
    Ok(ExportRecord {
        id: ExportId::new(id).map_err(|error| conversion(0, Type::Integer, error))?,
        document_id: document_id_at(row, 1)?,
        kind: ExportKind::parse(&kind).map_err(|error| conversion(2, Type::Text, error))?,
        artifact_path: row.get(3)?,
        settings_json: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_document(conn: &Connection, document: &Document, labels_json: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO documents
         (id, title, folder_id, page_count, cover_index, labels_json, created_at, updated_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            document.id.as_str(),
            document.title,
            document.folder_id.map(FolderId::get),
            document.page_count,
            document.cover_index,
            labels_json,
            document.created_at,
            document.updated_at,
            document.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn update_document(conn: &Connection, document: &Document, labels_json: &str) -> Result<usize> {
    conn.execute(
        "UPDATE documents SET
            title = ?2,
            folder_id = ?3,
            page_count = ?4,
            cover_index = ?5,
            labels_json = ?6,
            updated_at = ?7,
            status = ?8
         WHERE id = ?1",
        params![
            document.id.as_str(),
            document.title,
            document.folder_id.map(FolderId::get),
            document.page_count,
            document.cover_index,
            labels_json,
            document.updated_at,
            document.status.as_str(),
        ],
    )
}

pub fn find_document(conn: &Connection, id: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id],
        document_from_row,
    )
    .optional()
}

pub fn list_documents(conn: &Connection) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id"
    ))?;
    let rows = stmt.query_map([], document_from_row)?;
    rows.collect()
}

pub fn insert_page(
    conn: &Connection,
    document_id: &str,
    index: u32,
    original_path: &str,
    size: (u32, u32),
    dpi: u32,
    updated_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO pages
         (document_id, page_index, original_path, width, height, dpi, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![document_id, index, original_path, size.0, size.1, dpi, updated_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_page_by_id(conn: &Connection, page_id: i64) -> Result<Option<Page>> {
    conn.query_row(
        &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1"),
        params![page_id],
        page_from_row,
    )
    .optional()
}

pub fn list_pages(conn: &Connection, document_id: &str) -> Result<Vec<Page>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAGE_COLUMNS} FROM pages WHERE document_id = ?1 ORDER BY page_index, id"
    ))?;
    let rows = stmt.query_map(params![document_id], page_from_row)?;
    rows.collect()
}

pub fn find_page(conn: &Connection, document_id: &str, index: u32) -> Result<Option<Page>> {
    conn.query_row(
        &format!(
            "SELECT {PAGE_COLUMNS} FROM pages
             WHERE document_id = ?1 AND page_index = ?2
             ORDER BY id LIMIT 1"
        ),
        params![document_id, index],
        page_from_row,
    )
    .optional()
}

pub fn set_page_index(
    conn: &Connection,
    page_id: i64,
    index: u32,
    original_path: &str,
    rendered_path: Option<&str>,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE pages SET page_index = ?2, original_path = ?3, rendered_path = ?4, updated_at = ?5
         WHERE id = ?1",
        params![page_id, index, original_path, rendered_path, updated_at],
    )
}

pub fn set_page_edit(
    conn: &Connection,
    page_id: i64,
    edit_ops: Option<&str>,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE pages SET edit_ops = ?2, updated_at = ?3 WHERE id = ?1",
        params![page_id, edit_ops, updated_at],
    )
}

pub fn set_rendered_asset(
    conn: &Connection,
    page_id: i64,
    rendered_path: Option<&str>,
    rendered_edit_ops: Option<&str>,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE pages SET rendered_path = ?2, rendered_edit_ops = ?3, updated_at = ?4
         WHERE id = ?1",
        params![page_id, rendered_path, rendered_edit_ops, updated_at],
    )
}

pub fn replace_original(
    conn: &Connection,
    page_id: i64,
    original_path: &str,
    size: (u32, u32),
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE pages SET
            original_path = ?2,
            width = ?3,
            height = ?4,
            rendered_path = NULL,
            rendered_edit_ops = NULL,
            updated_at = ?5
         WHERE id = ?1",
        params![page_id, original_path, size.0, size.1, updated_at],
    )
}

pub fn insert_folder(conn: &Connection, name: &str, parent_id: Option<i64>) -> Result<i64> {
    conn.execute(
        "INSERT INTO folders (name, parent_id) VALUES (?1, ?2)",
        params![name, parent_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_folders(conn: &Connection) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare("SELECT id, name, parent_id FROM folders ORDER BY id")?;
    let rows = stmt.query_map([], folder_from_row)?;
    rows.collect()
}

pub fn find_folder_parent(conn: &Connection, folder_id: i64) -> Result<Option<Option<i64>>> {
    conn.query_row(
        "SELECT parent_id FROM folders WHERE id = ?1",
        params![folder_id],
        |row| row.get(0),
    )
    .optional()
}

/// Re-parents children and detaches documents, then removes the folder.
pub fn delete_folder(conn: &Connection, folder_id: i64, parent_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE folders SET parent_id = ?2 WHERE parent_id = ?1",
        params![folder_id, parent_id],
    )?;
    conn.execute(
        "UPDATE documents SET folder_id = NULL WHERE folder_id = ?1",
        params![folder_id],
    )?;
    conn.execute("DELETE FROM folders WHERE id = ?1", params![folder_id])?;
    Ok(())
}

pub fn insert_export(
    conn: &Connection,
    document_id: &str,
    kind: ExportKind,
    artifact_path: &str,
    settings_json: &str,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO exports (document_id, kind, artifact_path, settings_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![document_id, kind.as_str(), artifact_path, settings_json, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_exports(conn: &Connection, document_id: &str) -> Result<Vec<ExportRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, kind, artifact_path, settings_json, created_at
         FROM exports
         WHERE document_id = ?1
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![document_id], export_from_row)?;
    rows.collect()
}
