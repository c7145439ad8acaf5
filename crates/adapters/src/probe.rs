use std::path::Path;

use image::ImageReader;
use scanshelf_application::{ApplicationError, ImageDecoder};
use scanshelf_domain::{detect_image_kind, DecodedImage, ImageKind};

use crate::codec::open_error;

/// Reads image dimensions from the header without decoding pixels.
#[derive(Debug, Default)]
pub struct ImageCrateProbe;

impl ImageDecoder for ImageCrateProbe {
    fn probe(&self, path: &Path) -> Result<DecodedImage, ApplicationError> {
        let kind = detect_image_kind(path);
        if kind == ImageKind::Unsupported {
            return Err(ApplicationError::Decode(format!(
                "unsupported image format: {}",
                path.display()
            )));
        }

        let (width, height) = ImageReader::open(path)
            .map_err(|error| open_error(path, error))?
            .with_guessed_format()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?
            .into_dimensions()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?;

        Ok(DecodedImage {
            width,
            height,
            kind,
        })
    }
}
