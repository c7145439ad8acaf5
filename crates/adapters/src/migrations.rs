/// Applied in order on every `initialize`; each statement is idempotent.
pub const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        parent_id INTEGER REFERENCES folders(id) ON DELETE SET NULL
    );",
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        folder_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
        page_count INTEGER NOT NULL DEFAULT 0,
        cover_index INTEGER NOT NULL DEFAULT 0,
        labels_json TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft'
    );",
    // (document_id, page_index) is not unique while a renumbering is in flight.
    "CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        page_index INTEGER NOT NULL,
        original_path TEXT NOT NULL,
        rendered_path TEXT,
        edit_ops TEXT,
        rendered_edit_ops TEXT,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        dpi INTEGER NOT NULL,
        ocr_language TEXT,
        ocr_done INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_pages_document_index
        ON pages(document_id, page_index, id);",
    "CREATE TABLE IF NOT EXISTS exports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        artifact_path TEXT NOT NULL,
        settings_json TEXT NOT NULL,
        created_at TEXT NOT NULL
    );",
];
