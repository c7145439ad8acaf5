use std::collections::HashSet;
use std::path::{Path, PathBuf};

use scanshelf_application::{
    ApplicationError, AssetStore, CacheCleanReport, PageAssetPaths, PageMove, PageSource,
};
use scanshelf_domain::{detect_image_kind, DocumentId, ExportKind, ImageKind};
use tracing::{debug, warn};

use crate::codec::{decode_rgba, encode_jpeg, from_raster, temp_sibling, write_atomically};
use crate::fs::PageStorage;
use crate::paths::{ensure_dir, AssetPathResolver};

/// Quality used when an original has to be re-encoded as JPEG.
const ORIGINAL_QUALITY: u8 = 95;

/// Page assets on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    resolver: AssetPathResolver,
    storage: PageStorage,
}

impl FsAssetStore {
    pub fn new(resolver: AssetPathResolver) -> Self {
        let storage = PageStorage::new(resolver.cache_root());
        Self { resolver, storage }
    }

    pub fn resolver(&self) -> &AssetPathResolver {
        &self.resolver
    }

    pub fn storage(&self) -> &PageStorage {
        &self.storage
    }

    fn import_file(&self, source: &Path, original: &Path) -> Result<(), ApplicationError> {
        if !source.exists() {
            return Err(ApplicationError::MissingAsset(source.display().to_string()));
        }
        match detect_image_kind(source) {
            ImageKind::Jpeg => {
                let temp = temp_sibling(original, "tmp");
                self.storage.copy(source, &temp)?;
                if let Err(error) = decode_rgba(&temp) {
                    self.storage.delete_recursive(&temp)?;
                    return Err(error);
                }
                self.storage.move_path(&temp, original)
            }
            ImageKind::Png => {
                let image = decode_rgba(source)?;
                write_atomically(original, &encode_jpeg(&image, ORIGINAL_QUALITY)?)
            }
            ImageKind::Unsupported => Err(ApplicationError::Decode(format!(
                "unsupported image format: {}",
                source.display()
            ))),
        }
    }
}

struct StagedMove {
    from_dir: PathBuf,
    staging: PathBuf,
    target: PathBuf,
    placed: bool,
}

impl FsAssetStore {
    /// Every target must be free or vacated by this batch, and no page may
    /// already sit in staging.
    fn check_targets(
        &self,
        document_id: &DocumentId,
        moves: &[&PageMove],
    ) -> Result<(), ApplicationError> {
        let leaving: HashSet<&Path> = moves
            .iter()
            .map(|page_move| page_move.from_dir.as_path())
            .collect();
        for page_move in moves {
            let target = self.resolver.page_dir(document_id, page_move.to);
            if target.exists() && !leaving.contains(target.as_path()) {
                return Err(ApplicationError::Storage(format!(
                    "relocation target {} is occupied",
                    target.display()
                )));
            }
            let staging = self.resolver.staged_page_dir(document_id, page_move.page_id);
            if staging.exists() {
                return Err(ApplicationError::Storage(format!(
                    "stale staging directory {}",
                    staging.display()
                )));
            }
        }
        Ok(())
    }

    /// Placed pages go back to staging first so every original slot is
    /// free again, then each page returns to where it started.
    fn roll_back(&self, document_id: &DocumentId, staged: &[StagedMove]) {
        for entry in staged.iter().filter(|entry| entry.placed) {
            if let Err(error) = self.storage.move_path(&entry.target, &entry.staging) {
                warn!(document = %document_id, %error, "rollback could not unstage page");
            }
        }
        for entry in staged {
            if let Err(error) = self.storage.move_path(&entry.staging, &entry.from_dir) {
                warn!(
                    document = %document_id,
                    staging = %entry.staging.display(),
                    %error,
                    "rollback could not restore page, it stays in staging"
                );
            }
        }
        if let Err(error) = self
            .storage
            .remove_dir_if_empty(&self.resolver.staging_dir(document_id))
        {
            warn!(document = %document_id, %error, "staging directory left behind");
        }
    }
}

impl AssetStore for FsAssetStore {
    fn page_paths(&self, document_id: &DocumentId, index: u32) -> PageAssetPaths {
        self.resolver.page_paths(document_id, index)
    }

    fn store_original(
        &self,
        document_id: &DocumentId,
        index: u32,
        source: &PageSource,
    ) -> Result<PathBuf, ApplicationError> {
        let paths = self.resolver.page_paths(document_id, index);
        ensure_dir(&paths.dir)?;
        match source {
            PageSource::File(path) => self.import_file(path, &paths.original)?,
            PageSource::Raster(raster) => {
                let image = from_raster(raster)?;
                write_atomically(&paths.original, &encode_jpeg(&image, ORIGINAL_QUALITY)?)?;
            }
        }
        debug!(document = %document_id, index, "original stored");
        Ok(paths.original)
    }

    fn write_edit_sidecar(
        &self,
        document_id: &DocumentId,
        index: u32,
        edit_ops_json: &str,
    ) -> Result<(), ApplicationError> {
        let paths = self.resolver.page_paths(document_id, index);
        write_atomically(&paths.edit_sidecar, edit_ops_json.as_bytes())
    }

    fn remove_page_assets(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<(), ApplicationError> {
        self.storage
            .delete_recursive(&self.resolver.page_dir(document_id, index))?;
        self.storage
            .delete_recursive(&self.resolver.thumbnail_path(document_id, index))
    }

    /// Two phases through the staging directory, so a page may move into a
    /// slot another page is leaving in the same batch. Targets are checked
    /// before anything moves, and a failed batch is moved back.
    fn relocate_pages(
        &self,
        document_id: &DocumentId,
        moves: &[PageMove],
    ) -> Result<(), ApplicationError> {
        let mut pending = Vec::with_capacity(moves.len());
        for page_move in moves {
            if !page_move.from_dir.exists() {
                warn!(
                    document = %document_id,
                    page = %page_move.page_id,
                    dir = %page_move.from_dir.display(),
                    "page directory missing, nothing to relocate"
                );
                continue;
            }
            pending.push(page_move);
        }
        self.check_targets(document_id, &pending)?;

        let mut staged: Vec<StagedMove> = Vec::with_capacity(pending.len());
        for page_move in &pending {
            let staging = self.resolver.staged_page_dir(document_id, page_move.page_id);
            if let Err(error) = self.storage.move_path(&page_move.from_dir, &staging) {
                self.roll_back(document_id, &staged);
                return Err(error);
            }
            staged.push(StagedMove {
                from_dir: page_move.from_dir.clone(),
                staging,
                target: self.resolver.page_dir(document_id, page_move.to),
                placed: false,
            });
        }

        for position in 0..staged.len() {
            let StagedMove {
                staging, target, ..
            } = &staged[position];
            if let Err(error) = self.storage.move_path(staging, target) {
                self.roll_back(document_id, &staged);
                return Err(error);
            }
            staged[position].placed = true;
        }

        self.storage
            .remove_dir_if_empty(&self.resolver.staging_dir(document_id))?;
        self.storage
            .delete_recursive(&self.resolver.thumbnails_dir(document_id))
    }

    fn remove_document_assets(&self, document_id: &DocumentId) -> Result<(), ApplicationError> {
        self.storage
            .delete_recursive(&self.resolver.document_dir(document_id))?;
        self.storage
            .delete_recursive(&self.resolver.thumbnails_dir(document_id))
    }

    fn export_path(
        &self,
        document_id: &DocumentId,
        version: u32,
        kind: ExportKind,
    ) -> Result<PathBuf, ApplicationError> {
        ensure_dir(&self.resolver.exports_dir(document_id))?;
        Ok(self.resolver.export_path(document_id, version, kind))
    }

    fn clean_cache(&self, max_bytes: u64) -> Result<CacheCleanReport, ApplicationError> {
        self.storage.clean_cache(max_bytes)
    }
}
