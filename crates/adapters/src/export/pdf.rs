use std::path::Path;

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use scanshelf_application::{ApplicationError, ExportWriter};
use scanshelf_domain::{EncodedPage, ExportKind};
use tracing::debug;

use crate::codec::write_atomically;

const POINTS_PER_INCH: f32 = 72.0;

/// Assembles one PDF page per encoded JPEG. Each image is embedded as a
/// `DCTDecode` XObject and fills its page; the page size follows the dpi
/// the page was scanned at.
#[derive(Debug, Default)]
pub struct PdfExportWriter;

impl PdfExportWriter {
    pub fn build(pages: &[EncodedPage]) -> Result<Vec<u8>, ApplicationError> {
        if pages.is_empty() {
            return Err(ApplicationError::Export(
                "cannot export a document without pages".to_string(),
            ));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = pages
            .iter()
            .map(|page| add_page(&mut doc, pages_id, page).into())
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|error| ApplicationError::Export(error.to_string()))?;
        Ok(buf)
    }
}

fn page_size_points(page: &EncodedPage) -> (f32, f32) {
    let dpi = page.dpi.max(1) as f32;
    (
        page.width as f32 * POINTS_PER_INCH / dpi,
        page.height as f32 * POINTS_PER_INCH / dpi,
    )
}

fn add_page(doc: &mut Document, pages_id: ObjectId, page: &EncodedPage) -> ObjectId {
    let image_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => page.width as i64,
            "Height" => page.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        page.jpeg.clone(),
    )));

    let (width, height) = page_size_points(page);
    let content = format!("q {width:.2} 0 0 {height:.2} 0 0 cm /Im0 Do Q").into_bytes();
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content)));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    debug!(page = page.page_index, width, height, "pdf page assembled");
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ],
        "Resources" => resources_id,
        "Contents" => content_id,
    })
}

impl ExportWriter for PdfExportWriter {
    fn write_export(
        &self,
        kind: ExportKind,
        pages: &[EncodedPage],
        destination: &Path,
    ) -> Result<(), ApplicationError> {
        match kind {
            ExportKind::Pdf => write_atomically(destination, &Self::build(pages)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    use super::*;
    use crate::codec::encode_jpeg;

    fn encoded(index: u32, width: u32, height: u32, dpi: u32) -> EncodedPage {
        let image = RgbaImage::from_pixel(width, height, Rgba([240, 240, 240, 255]));
        EncodedPage {
            page_index: index,
            width,
            height,
            dpi,
            jpeg: encode_jpeg(&image, 80).expect("encode"),
        }
    }

    #[test]
    fn writes_one_pdf_page_per_image() {
        let temp = TempDir::new().expect("tempdir");
        let destination = temp.path().join("exports/v1.pdf");
        let pages = vec![encoded(0, 30, 40, 300), encoded(1, 40, 30, 300), encoded(2, 10, 10, 72)];

        PdfExportWriter
            .write_export(ExportKind::Pdf, &pages, &destination)
            .expect("export");

        let bytes = std::fs::read(&destination).expect("read");
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let loaded = Document::load_mem(&bytes).expect("load");
        assert_eq!(loaded.get_pages().len(), 3);
    }

    #[test]
    fn page_size_follows_dpi() {
        assert_eq!(page_size_points(&encoded(0, 300, 600, 300)), (72.0, 144.0));
        assert_eq!(page_size_points(&encoded(0, 72, 72, 72)), (72.0, 72.0));
    }

    #[test]
    fn refuses_empty_export() {
        assert!(matches!(
            PdfExportWriter::build(&[]),
            Err(ApplicationError::Export(_))
        ));
    }
}
