use std::fs::{self, File};
use std::io::{self, BufReader, Cursor};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageReader, Rgb, RgbImage, RgbaImage};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use scanshelf_application::ApplicationError;
use scanshelf_domain::{detect_image_kind, ImageKind, Raster};
use tracing::debug;

use crate::paths::ensure_parent;

/// Decodes any supported image into RGBA.
pub fn decode_rgba(path: &Path) -> Result<RgbaImage, ApplicationError> {
    let reader = ImageReader::open(path).map_err(|error| open_error(path, error))?;
    let image = reader
        .with_guessed_format()
        .map_err(|error| ApplicationError::Decode(format!("{}: {error}", path.display())))?
        .decode()
        .map_err(|error| ApplicationError::Decode(format!("{}: {error}", path.display())))?;
    Ok(image.to_rgba8())
}

/// Decodes a `width`x`height` image at `1 / sample` of its size. JPEGs are
/// scaled inside the decoder (down to 1/8), so the full-size buffer is never
/// allocated for them.
pub fn decode_rgba_scaled(
    path: &Path,
    width: u32,
    height: u32,
    sample: u32,
) -> Result<RgbaImage, ApplicationError> {
    if sample <= 1 {
        return decode_rgba(path);
    }
    let target = ((width / sample).max(1), (height / sample).max(1));
    let reduced = match detect_image_kind(path) {
        ImageKind::Jpeg => decode_jpeg_reduced(path, target)?,
        _ => None,
    };
    let image = match reduced {
        Some(image) => image,
        None => decode_rgba(path)?,
    };
    if image.dimensions() == target {
        return Ok(image);
    }
    Ok(imageops::resize(&image, target.0, target.1, FilterType::Triangle))
}

/// The smallest DCT scale whose output still covers `requested`. `None`
/// when the pixel format has no direct RGBA mapping.
fn decode_jpeg_reduced(
    path: &Path,
    requested: (u32, u32),
) -> Result<Option<RgbaImage>, ApplicationError> {
    let file = File::open(path).map_err(|error| open_error(path, error))?;
    let mut decoder = JpegDecoder::new(BufReader::new(file));
    let clamp = |value: u32| u16::try_from(value).unwrap_or(u16::MAX);
    let decode_error =
        |error: jpeg_decoder::Error| ApplicationError::Decode(format!("{}: {error}", path.display()));

    let (width, height) = decoder
        .scale(clamp(requested.0), clamp(requested.1))
        .map_err(decode_error)?;
    let pixels = decoder.decode().map_err(decode_error)?;
    let Some(info) = decoder.info() else {
        return Ok(None);
    };
    let rgba: Vec<u8> = match info.pixel_format {
        PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        PixelFormat::L8 => pixels.iter().flat_map(|&luma| [luma, luma, luma, 255]).collect(),
        other => {
            debug!(path = %path.display(), format = ?other, "no scaled decode for pixel format");
            return Ok(None);
        }
    };
    Ok(RgbaImage::from_raw(u32::from(width), u32::from(height), rgba))
}

pub fn open_error(path: &Path, error: io::Error) -> ApplicationError {
    if error.kind() == io::ErrorKind::NotFound {
        ApplicationError::MissingAsset(path.display().to_string())
    } else {
        ApplicationError::Storage(format!("open {}: {error}", path.display()))
    }
}

/// Encodes to baseline JPEG, dropping alpha. `quality` is clamped to 1..=100.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ApplicationError> {
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Rgb([r, g, b])
    });
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|error| ApplicationError::Storage(format!("jpeg encode: {error}")))?;
    Ok(buf.into_inner())
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// never see a partially written file.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
    let temp = temp_sibling(path, "tmp");
    write_then_rename(&temp, path, bytes)
}

pub fn temp_sibling(path: &Path, tag: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{tag}"));
    path.with_file_name(name)
}

fn write_then_rename(temp: &Path, path: &Path, bytes: &[u8]) -> Result<(), ApplicationError> {
    ensure_parent(path)?;
    fs::write(temp, bytes)
        .map_err(|error| ApplicationError::Storage(format!("write {}: {error}", temp.display())))?;
    fs::rename(temp, path).map_err(|error| {
        let _ = fs::remove_file(temp);
        ApplicationError::Storage(format!("rename to {}: {error}", path.display()))
    })
}

pub fn to_raster(image: RgbaImage) -> Result<Raster, ApplicationError> {
    let (width, height) = image.dimensions();
    Ok(Raster::new(width, height, image.into_raw())?)
}

pub fn from_raster(raster: &Raster) -> Result<RgbaImage, ApplicationError> {
    RgbaImage::from_raw(raster.width, raster.height, raster.rgba.clone()).ok_or_else(|| {
        ApplicationError::InvalidInput(format!(
            "raster buffer does not match {}x{}",
            raster.width, raster.height
        ))
    })
}
