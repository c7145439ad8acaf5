//! Stateless per-pixel filters. Every function returns a new image.

use image::{Rgba, RgbaImage};
use scanshelf_domain::{FilterMode, FilterSettings, BLACK_AND_WHITE_THRESHOLD};

const COLOR_BOOST_SATURATION: f32 = 1.5;
const COLOR_BOOST_CONTRAST: f32 = 1.1;

fn luminance(pixel: &Rgba<u8>) -> f32 {
    let [r, g, b, _] = pixel.0;
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn map_pixels(src: &RgbaImage, f: impl Fn(&Rgba<u8>) -> Rgba<u8>) -> RgbaImage {
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        *pixel = f(pixel);
    }
    out
}

/// Applies `f` to the colour channels and leaves alpha alone.
fn map_channels(src: &RgbaImage, f: impl Fn(f32) -> f32) -> RgbaImage {
    map_pixels(src, |pixel| {
        let [r, g, b, a] = pixel.0;
        Rgba([
            to_channel(f(f32::from(r))),
            to_channel(f(f32::from(g))),
            to_channel(f(f32::from(b))),
            a,
        ])
    })
}

pub fn grayscale(src: &RgbaImage) -> RgbaImage {
    map_pixels(src, |pixel| {
        let level = to_channel(luminance(pixel));
        Rgba([level, level, level, pixel.0[3]])
    })
}

/// White where luminance exceeds `threshold * 255`, black elsewhere. The
/// output is fully opaque.
pub fn black_and_white(src: &RgbaImage, threshold: f32) -> RgbaImage {
    let cutoff = threshold.clamp(0.0, 1.0) * 255.0;
    map_pixels(src, |pixel| {
        if luminance(pixel) > cutoff {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

/// `out = contrast * in + 255 * brightness`, clamped.
pub fn contrast_brightness(src: &RgbaImage, contrast: f32, brightness: f32) -> RgbaImage {
    let offset = 255.0 * brightness;
    map_channels(src, |value| contrast * value + offset)
}

/// Cheap stand-in for an unsharp mask: a contrast boost around mid-grey.
pub fn sharpen(src: &RgbaImage, amount: f32) -> RgbaImage {
    if amount <= 0.0 {
        return src.clone();
    }
    let amount = amount.min(1.0);
    map_channels(src, |value| (1.0 + amount) * value - 128.0 * amount)
}

pub fn color_boost(src: &RgbaImage) -> RgbaImage {
    let saturated = map_pixels(src, |pixel| {
        let lum = luminance(pixel);
        let [r, g, b, a] = pixel.0;
        let boost = |value: u8| to_channel(lum + COLOR_BOOST_SATURATION * (f32::from(value) - lum));
        Rgba([boost(r), boost(g), boost(b), a])
    });
    contrast_brightness(&saturated, COLOR_BOOST_CONTRAST, 0.0)
}

/// Mode filter, then tone, then sharpen.
pub fn apply_filter_stage(src: &RgbaImage, filter: &FilterSettings) -> RgbaImage {
    let mut out = match filter.mode {
        FilterMode::Original => src.clone(),
        FilterMode::Gray => grayscale(src),
        FilterMode::BlackAndWhite => black_and_white(src, BLACK_AND_WHITE_THRESHOLD),
        FilterMode::ColorBoost => color_boost(src),
    };
    if filter.has_tone_adjustment() {
        out = contrast_brightness(&out, filter.contrast, filter.brightness);
    }
    if filter.sharpen > 0.0 {
        out = sharpen(&out, filter.sharpen);
    }
    out
}
