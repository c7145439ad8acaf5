mod document;
mod edit;
mod error;
mod page;
mod raster;

pub use document::{
    Document, DocumentId, DocumentStatus, ExportId, ExportKind, ExportRecord, ExportSettings,
    Folder, FolderId, PageId,
};
pub use edit::{
    CropRect, EditOperation, FilterMode, FilterSettings, Rotation, WarpQuad,
    BLACK_AND_WHITE_THRESHOLD,
};
pub use error::DomainError;
pub use page::{detect_image_kind, DecodedImage, ImageKind, Page};
pub use raster::{EncodedPage, Raster};
