use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use scanshelf_application::{
    ApplicationError, CatalogRepository, Clock, PageRenderer, RenderOutcome, ThumbnailArtifact,
};
use scanshelf_domain::{DocumentId, EditOperation, EncodedPage, Page, Raster, Rotation};
use tracing::{debug, warn};

use crate::codec::{
    decode_rgba, decode_rgba_scaled, encode_jpeg, temp_sibling, to_raster, write_atomically,
};
use crate::paths::{ensure_dir, AssetPathResolver};
use crate::render::filters::apply_filter_stage;
use crate::render::GenerationGuard;

const THUMBNAIL_QUALITY: u8 = 80;

/// Largest power of two `s` with `max(width, height) / s >= target`.
pub fn sample_size(width: u32, height: u32, target: u32) -> u32 {
    let longest = width.max(height);
    if target == 0 {
        return 1;
    }
    let mut sample = 1_u32;
    while sample < u32::MAX / 2 && longest / (sample * 2) >= target {
        sample *= 2;
    }
    sample
}

/// Rotate, then filter, then crop. Warp, denoise and deskew are carried in
/// the record but have no pixel effect.
pub fn apply_operations(image: RgbaImage, edit: &EditOperation) -> RgbaImage {
    let rotated = match edit.rotate {
        Rotation::None => image,
        Rotation::Cw90 => imageops::rotate90(&image),
        Rotation::Cw180 => imageops::rotate180(&image),
        Rotation::Cw270 => imageops::rotate270(&image),
    };
    let unchanged = apply_inert_stage(rotated, edit);
    let filtered = apply_filter_stage(&unchanged, &edit.filter);
    apply_crop_stage(filtered, edit)
}

fn apply_inert_stage(image: RgbaImage, edit: &EditOperation) -> RgbaImage {
    if edit.warp.is_some() {
        debug!("perspective warp is not implemented, skipping");
    }
    if edit.denoise != 0.0 {
        debug!(denoise = edit.denoise, "denoise is not implemented, skipping");
    }
    if edit.deskew != 0.0 {
        debug!(deskew = edit.deskew, "deskew is not implemented, skipping");
    }
    image
}

// TODO: clip to `edit.crop` once the crop rectangle is mapped into
// post-rotation coordinates.
fn apply_crop_stage(image: RgbaImage, edit: &EditOperation) -> RgbaImage {
    if let Some(crop) = edit.crop {
        debug!(?crop, "crop is not applied yet");
    }
    image
}

/// Renders pages from their original asset and the stored edit record.
pub struct RenderEngine {
    catalog: Arc<dyn CatalogRepository>,
    resolver: AssetPathResolver,
    clock: Arc<dyn Clock>,
    generations: GenerationGuard,
}

impl RenderEngine {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        resolver: AssetPathResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            clock,
            generations: GenerationGuard::new(),
        }
    }

    fn load_page(&self, document_id: &DocumentId, index: u32) -> Result<Page, ApplicationError> {
        self.catalog
            .find_page(document_id, index)?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("page {index} of document {document_id}"))
            })
    }

    /// Whether `page` still sits at the index it was loaded from.
    fn holds_index(&self, page: &Page) -> Result<bool, ApplicationError> {
        Ok(self
            .catalog
            .find_page(&page.document_id, page.index)?
            .is_some_and(|current| current.id == page.id))
    }

    fn edit_of(page: &Page) -> EditOperation {
        let Some(text) = page.edit_ops.as_deref() else {
            return EditOperation::identity();
        };
        EditOperation::parse(text).unwrap_or_else(|error| {
            warn!(page = %page.id, %error, "malformed edit record, rendering identity");
            EditOperation::identity()
        })
    }

    fn render_full(&self, page: &Page, edit: &EditOperation) -> Result<RgbaImage, ApplicationError> {
        let original = decode_rgba(Path::new(&page.original_path))?;
        Ok(apply_operations(original, edit))
    }

    fn render_scaled(&self, page: &Page, target_width: u32) -> Result<RgbaImage, ApplicationError> {
        if target_width == 0 {
            return Err(ApplicationError::InvalidInput(
                "preview width must be positive".to_string(),
            ));
        }
        let sample = sample_size(page.width, page.height, target_width);
        let mut scaled =
            decode_rgba_scaled(Path::new(&page.original_path), page.width, page.height, sample)?;
        if scaled.width() > target_width {
            let height = (u64::from(scaled.height()) * u64::from(target_width)
                / u64::from(scaled.width()))
            .max(1) as u32;
            scaled = imageops::resize(&scaled, target_width, height, FilterType::Triangle);
        }
        debug!(page = %page.id, sample, "preview decoded");
        Ok(apply_operations(scaled, &Self::edit_of(page)))
    }
}

fn check_quality(quality: u8) -> Result<(), ApplicationError> {
    if quality > 100 {
        return Err(ApplicationError::InvalidInput(format!(
            "quality must be within 0..=100, got {quality}"
        )));
    }
    Ok(())
}

impl PageRenderer for RenderEngine {
    fn render_preview(
        &self,
        document_id: &DocumentId,
        index: u32,
        target_width: u32,
    ) -> Result<Raster, ApplicationError> {
        let page = self.load_page(document_id, index)?;
        to_raster(self.render_scaled(&page, target_width)?)
    }

    fn render_final(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<Raster, ApplicationError> {
        check_quality(quality)?;
        let page = self.load_page(document_id, index)?;
        to_raster(self.render_full(&page, &Self::edit_of(&page))?)
    }

    fn render_final_jpeg(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<EncodedPage, ApplicationError> {
        check_quality(quality)?;
        let page = self.load_page(document_id, index)?;
        let image = self.render_full(&page, &Self::edit_of(&page))?;
        Ok(EncodedPage {
            page_index: page.index,
            width: image.width(),
            height: image.height(),
            dpi: page.dpi,
            jpeg: encode_jpeg(&image, quality)?,
        })
    }

    /// Writes `render.jpg` through a temp file. The rename and the catalog
    /// update only happen while this is still the newest render of the page.
    fn render_and_persist(
        &self,
        document_id: &DocumentId,
        index: u32,
        quality: u8,
    ) -> Result<RenderOutcome, ApplicationError> {
        check_quality(quality)?;
        let generation = self.generations.issue(document_id, index);
        let page = self.load_page(document_id, index)?;
        let edit = Self::edit_of(&page);
        let jpeg = encode_jpeg(&self.render_full(&page, &edit)?, quality)?;

        let paths = self.resolver.page_paths(document_id, index);
        ensure_dir(&paths.dir)?;
        let temp = temp_sibling(&paths.rendered, &format!("{}.tmp", generation.token()));
        fs::write(&temp, &jpeg).map_err(|error| {
            ApplicationError::Storage(format!("write {}: {error}", temp.display()))
        })?;

        let committed = generation.commit(|| -> Result<bool, ApplicationError> {
            if !self.holds_index(&page)? {
                return Ok(false);
            }
            fs::rename(&temp, &paths.rendered).map_err(|error| {
                ApplicationError::Storage(format!(
                    "rename to {}: {error}",
                    paths.rendered.display()
                ))
            })?;
            let rendered_record = EditOperation::serialize(Some(&edit));
            self.catalog.set_rendered_asset(
                page.id,
                Some(&paths.rendered.to_string_lossy()),
                Some(&rendered_record),
                &self.clock.now_timestamp_string(),
            )?;
            Ok(true)
        });

        match committed {
            Ok(Some(true)) => {
                debug!(document = %document_id, index, "render persisted");
                Ok(RenderOutcome::Persisted {
                    path: paths.rendered,
                })
            }
            Ok(Some(false)) => {
                let _ = fs::remove_file(&temp);
                debug!(document = %document_id, index, page = %page.id, "page moved during render");
                Ok(RenderOutcome::Superseded)
            }
            Ok(None) => {
                let _ = fs::remove_file(&temp);
                debug!(document = %document_id, index, "render superseded");
                Ok(RenderOutcome::Superseded)
            }
            Err(error) => {
                let _ = fs::remove_file(&temp);
                Err(error)
            }
        }
    }

    fn render_thumbnail(
        &self,
        document_id: &DocumentId,
        index: u32,
        max_edge: u32,
    ) -> Result<ThumbnailArtifact, ApplicationError> {
        let page = self.load_page(document_id, index)?;
        let preview = self.render_scaled(&page, max_edge)?;
        let thumb = if preview.width() > max_edge || preview.height() > max_edge {
            let (width, height) = fit_within(preview.width(), preview.height(), max_edge);
            imageops::thumbnail(&preview, width, height)
        } else {
            preview
        };

        let path = self.resolver.thumbnail_path(document_id, index);
        write_atomically(&path, &encode_jpeg(&thumb, THUMBNAIL_QUALITY)?)?;
        Ok(ThumbnailArtifact {
            page_index: index,
            file_path: path.to_string_lossy().to_string(),
            width: thumb.width(),
            height: thumb.height(),
        })
    }
}

fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = u64::from(width.max(height).max(1));
    let scale = |value: u32| ((u64::from(value) * u64::from(max_edge)) / longest).max(1) as u32;
    (scale(width), scale(height))
}
