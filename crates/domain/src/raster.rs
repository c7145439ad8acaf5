use crate::DomainError;

/// Owned 8-bit RGBA pixel buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, DomainError> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(DomainError::RasterSizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = &self.rgba[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// A page rendered at final quality and encoded as JPEG, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    pub page_index: u32,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub jpeg: Vec<u8>,
}
