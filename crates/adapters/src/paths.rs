use std::fs;
use std::path::{Path, PathBuf};

use scanshelf_application::{ApplicationError, PageAssetPaths};
use scanshelf_domain::{DocumentId, ExportKind, PageId};

pub const ORIGINAL_FILE: &str = "original.jpg";
pub const RENDERED_FILE: &str = "render.jpg";
pub const EDIT_SIDECAR_FILE: &str = "edit.json";

/// Maps documents and pages onto the asset tree:
///
/// ```text
/// {root}/{document}/page_{index:04}/original.jpg
/// {root}/{document}/page_{index:04}/render.jpg
/// {root}/{document}/page_{index:04}/edit.json
/// {root}/{document}/exports/v{n}.{kind}
/// {root}/{document}/.relocating/{page id}/
/// {root}/cache/thumbs/{document}/page_{index:04}.jpg
/// ```
#[derive(Debug, Clone)]
pub struct AssetPathResolver {
    root: PathBuf,
}

impl AssetPathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(document_id.as_str())
    }

    pub fn page_dir(&self, document_id: &DocumentId, index: u32) -> PathBuf {
        self.document_dir(document_id)
            .join(format!("page_{index:04}"))
    }

    pub fn page_paths(&self, document_id: &DocumentId, index: u32) -> PageAssetPaths {
        let dir = self.page_dir(document_id, index);
        PageAssetPaths {
            original: dir.join(ORIGINAL_FILE),
            rendered: dir.join(RENDERED_FILE),
            edit_sidecar: dir.join(EDIT_SIDECAR_FILE),
            dir,
        }
    }

    pub fn exports_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.document_dir(document_id).join("exports")
    }

    pub fn export_path(&self, document_id: &DocumentId, version: u32, kind: ExportKind) -> PathBuf {
        self.exports_dir(document_id)
            .join(format!("v{version}.{}", kind.extension()))
    }

    pub fn staging_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.document_dir(document_id).join(".relocating")
    }

    pub fn staged_page_dir(&self, document_id: &DocumentId, page_id: PageId) -> PathBuf {
        self.staging_dir(document_id).join(page_id.to_string())
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn thumbnails_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.cache_root().join("thumbs").join(document_id.as_str())
    }

    pub fn thumbnail_path(&self, document_id: &DocumentId, index: u32) -> PathBuf {
        self.thumbnails_dir(document_id)
            .join(format!("page_{index:04}.jpg"))
    }
}

/// Creates `dir` and any missing ancestors.
pub fn ensure_dir(dir: &Path) -> Result<(), ApplicationError> {
    fs::create_dir_all(dir).map_err(|error| {
        ApplicationError::Storage(format!("cannot create {}: {error}", dir.display()))
    })
}

pub fn ensure_parent(path: &Path) -> Result<(), ApplicationError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
