use std::path::Path;

use crate::{DocumentId, EditOperation, PageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub document_id: DocumentId,
    pub index: u32,
    pub original_path: String,
    pub rendered_path: Option<String>,
    pub edit_ops: Option<String>,
    /// Edit record that produced `rendered_path`.
    pub rendered_edit_ops: Option<String>,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub ocr_language: Option<String>,
    pub ocr_done: bool,
    pub updated_at: String,
}

impl Page {
    /// Stored edit record, identity when absent or unreadable.
    pub fn edit_operation(&self) -> EditOperation {
        self.edit_ops
            .as_deref()
            .map(EditOperation::deserialize)
            .unwrap_or_default()
    }

    pub fn needs_render(&self) -> bool {
        if self.rendered_path.is_none() {
            return !self.edit_operation().is_identity();
        }
        let rendered = self
            .rendered_edit_ops
            .as_deref()
            .map(EditOperation::deserialize)
            .unwrap_or_default();
        self.edit_operation().is_dirty(Some(&rendered))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
}

pub fn detect_image_kind(path: &Path) -> ImageKind {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return ImageKind::Unsupported;
    };

    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => ImageKind::Jpeg,
        "png" => ImageKind::Png,
        _ => ImageKind::Unsupported,
    }
}
