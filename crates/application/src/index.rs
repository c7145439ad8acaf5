use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanshelf_domain::{Document, DocumentId, DocumentStatus, Page};
use tracing::{debug, warn};

use crate::{
    ApplicationError, AssetStore, CatalogRepository, Clock, ImageDecoder, NewPage,
    PageIndexUpdate, PageMove, PageSource,
};

/// Keeps a document's page indices contiguous across add, delete and reorder.
pub struct PageIndex {
    catalog: Arc<dyn CatalogRepository>,
    assets: Arc<dyn AssetStore>,
    decoder: Arc<dyn ImageDecoder>,
    clock: Arc<dyn Clock>,
}

impl PageIndex {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        assets: Arc<dyn AssetStore>,
        decoder: Arc<dyn ImageDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            assets,
            decoder,
            clock,
        }
    }

    /// Moves the page at `from` to `to`; pages in between shift one slot
    /// toward the vacated position.
    pub fn reorder(
        &self,
        document_id: &DocumentId,
        from: u32,
        to: u32,
    ) -> Result<Document, ApplicationError> {
        let mut document = self.require_document(document_id)?;
        let mut pages = self.catalog.list_pages(document_id)?;
        let count = pages.len() as u32;
        if from >= count || to >= count {
            return Err(ApplicationError::InvalidInput(format!(
                "reorder {from} -> {to} out of range for {count} pages"
            )));
        }
        if from == to {
            return Ok(document);
        }

        let cover_page = pages.get(document.cover_index as usize).map(|page| page.id);
        let moved = pages.remove(from as usize);
        pages.insert(to as usize, moved);
        self.assign_positions(document_id, pages.iter().zip(0..))?;

        if let Some(cover_id) = cover_page {
            if let Some(position) = pages.iter().position(|page| page.id == cover_id) {
                document.cover_index = position as u32;
            }
        }
        document.updated_at = self.clock.now_timestamp_string();
        self.catalog.update_document(&document)?;
        debug!(document = %document_id, from, to, "reordered page");
        Ok(document)
    }

    /// Deletes the page at `index` with its assets and closes the gap.
    pub fn delete_page(
        &self,
        document_id: &DocumentId,
        index: u32,
    ) -> Result<Document, ApplicationError> {
        let mut document = self.require_document(document_id)?;
        let mut pages = self.catalog.list_pages(document_id)?;
        let position = pages
            .iter()
            .position(|page| page.index == index)
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("page {index} of document {document_id}"))
            })?;
        let removed = pages.remove(position);

        self.catalog.delete_page(removed.id)?;
        self.assets.remove_page_assets(document_id, removed.index)?;
        self.assign_positions(document_id, pages.iter().zip(0..))?;

        document.page_count = pages.len() as u32;
        if removed.index == document.cover_index || document.page_count == 0 {
            document.cover_index = 0;
        } else if removed.index < document.cover_index {
            document.cover_index -= 1;
        }
        document.updated_at = self.clock.now_timestamp_string();
        self.catalog.update_document(&document)?;
        debug!(document = %document_id, index, "deleted page");
        Ok(document)
    }

    /// Inserts a page at `index` (append when `None`).
    pub fn add_page(
        &self,
        document_id: &DocumentId,
        source: &PageSource,
        index: Option<u32>,
        dpi: u32,
    ) -> Result<Page, ApplicationError> {
        let mut document = self.require_document(document_id)?;
        if document.status == DocumentStatus::Trashed {
            return Err(ApplicationError::InvalidInput(format!(
                "document {document_id} is trashed"
            )));
        }

        let pages = self.catalog.list_pages(document_id)?;
        let count = pages.len() as u32;
        let index = index.unwrap_or(count);
        if index > count {
            return Err(ApplicationError::InvalidInput(format!(
                "insert index {index} out of range for {count} pages"
            )));
        }

        if let PageSource::File(path) = source {
            self.decoder.probe(path)?;
        }

        self.assign_positions(
            document_id,
            pages
                .iter()
                .skip(index as usize)
                .zip(index + 1..),
        )?;

        let page = match self.insert_new_page(document_id, source, index, dpi) {
            Ok(page) => page,
            Err(error) => {
                warn!(document = %document_id, index, %error, "page insert failed, closing gap");
                // The slot belongs to no page until the insert succeeds.
                if let Err(cleanup_error) = self.assets.remove_page_assets(document_id, index) {
                    warn!(
                        document = %document_id,
                        index,
                        %cleanup_error,
                        "could not clear failed slot"
                    );
                }
                if let Err(heal_error) = self.heal(document_id) {
                    warn!(document = %document_id, %heal_error, "heal after failed insert failed");
                }
                return Err(error);
            }
        };

        document.page_count = count + 1;
        if index <= document.cover_index && count > 0 {
            document.cover_index += 1;
        }
        if document.status == DocumentStatus::Draft {
            document.transition(DocumentStatus::Active)?;
        }
        document.updated_at = page.updated_at.clone();
        self.catalog.update_document(&document)?;
        Ok(page)
    }

    /// Renumbers pages to `0..N-1` in their stored order and repairs the
    /// document's page count and cover index.
    pub fn heal(&self, document_id: &DocumentId) -> Result<Document, ApplicationError> {
        let mut document = self.require_document(document_id)?;
        let pages = self.catalog.list_pages(document_id)?;
        let changed = self.assign_positions(document_id, pages.iter().zip(0..))?;

        let page_count = pages.len() as u32;
        let mut dirty = changed > 0;
        if document.page_count != page_count {
            warn!(
                document = %document_id,
                stored = document.page_count,
                actual = page_count,
                "page count drifted"
            );
            document.page_count = page_count;
            dirty = true;
        }
        if !document.has_valid_cover() {
            document.cover_index = 0;
            dirty = true;
        }
        if dirty {
            document.updated_at = self.clock.now_timestamp_string();
            self.catalog.update_document(&document)?;
        }
        Ok(document)
    }

    fn insert_new_page(
        &self,
        document_id: &DocumentId,
        source: &PageSource,
        index: u32,
        dpi: u32,
    ) -> Result<Page, ApplicationError> {
        let original = self.assets.store_original(document_id, index, source)?;
        let decoded = self.decoder.probe(&original)?;
        self.catalog.insert_page(&NewPage {
            document_id: document_id.clone(),
            index,
            original_path: original.to_string_lossy().to_string(),
            width: decoded.width,
            height: decoded.height,
            dpi,
            updated_at: self.clock.now_timestamp_string(),
        })
    }

    /// Gives each page its new position: page directories are relocated
    /// first, then the index updates are applied as one batch. Returns the
    /// number of pages whose record changed.
    fn assign_positions<'a>(
        &self,
        document_id: &DocumentId,
        assignments: impl Iterator<Item = (&'a Page, u32)>,
    ) -> Result<usize, ApplicationError> {
        let mut moves = Vec::new();
        let mut updates = Vec::new();

        for (page, position) in assignments {
            let target = self.assets.page_paths(document_id, position);
            let current_dir = asset_dir(page);
            let relocated = current_dir.as_deref() != Some(target.dir.as_path());
            if page.index == position && !relocated {
                continue;
            }
            if relocated {
                if let Some(from_dir) = current_dir {
                    moves.push(PageMove {
                        page_id: page.id,
                        from_dir,
                        to: position,
                    });
                }
            }
            updates.push(PageIndexUpdate {
                page_id: page.id,
                index: position,
                original_path: target.original.to_string_lossy().to_string(),
                rendered_path: page
                    .rendered_path
                    .as_ref()
                    .map(|_| target.rendered.to_string_lossy().to_string()),
            });
        }

        if !moves.is_empty() {
            self.assets.relocate_pages(document_id, &moves)?;
        }
        if !updates.is_empty() {
            let now = self.clock.now_timestamp_string();
            self.catalog.apply_page_updates(&updates, &now)?;
        }
        Ok(updates.len())
    }

    fn require_document(&self, document_id: &DocumentId) -> Result<Document, ApplicationError> {
        self.catalog
            .find_document(document_id)?
            .ok_or_else(|| ApplicationError::NotFound(format!("document {document_id}")))
    }
}

fn asset_dir(page: &Page) -> Option<PathBuf> {
    Path::new(&page.original_path).parent().map(Path::to_path_buf)
}
