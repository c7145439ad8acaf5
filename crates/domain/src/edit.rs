use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Fixed threshold used by the black-and-white filter mode.
pub const BLACK_AND_WHITE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Original,
    Gray,
    BlackAndWhite,
    ColorBoost,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub mode: FilterMode,
    pub contrast: f32,
    pub brightness: f32,
    pub sharpen: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            mode: FilterMode::Original,
            contrast: 1.0,
            brightness: 0.0,
            sharpen: 0.0,
        }
    }
}

impl FilterSettings {
    pub fn has_tone_adjustment(&self) -> bool {
        self.contrast != 1.0 || self.brightness != 0.0
    }
}

/// Rectangle in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Quadrilateral corners (top-left, top-right, bottom-right, bottom-left)
/// to be mapped onto a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpQuad {
    pub corners: [[f32; 2]; 4],
}

/// Clockwise rotation in right-angle steps. Serialized as integer degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = DomainError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            270 => Ok(Self::Cw270),
            _ => Err(DomainError::InvalidRotation(degrees)),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// Pending non-destructive transforms for one page.
///
/// The value is immutable from the renderer's point of view: callers build a
/// new record for every change and hand it over whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOperation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    /// Not applied by the renderer yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp: Option<WarpQuad>,
    pub rotate: Rotation,
    /// Not applied by the renderer yet.
    pub denoise: f32,
    /// Not applied by the renderer yet.
    pub deskew: f32,
    pub filter: FilterSettings,
}

impl Default for EditOperation {
    fn default() -> Self {
        Self {
            crop: None,
            warp: None,
            rotate: Rotation::None,
            denoise: 0.0,
            deskew: 0.0,
            filter: FilterSettings::default(),
        }
    }
}

impl EditOperation {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Encodes the record as JSON. `None` encodes the identity record.
    pub fn serialize(record: Option<&Self>) -> String {
        let identity = Self::identity();
        serde_json::to_string(record.unwrap_or(&identity)).unwrap_or_default()
    }

    /// Strict decode: fails on malformed JSON and on out-of-range values.
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let record: Self = serde_json::from_str(text)
            .map_err(|error| DomainError::MalformedEditRecord(error.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Lossy decode: anything [`EditOperation::parse`] rejects becomes the
    /// identity record.
    pub fn deserialize(text: &str) -> Self {
        Self::parse(text).unwrap_or_default()
    }

    /// Identity ignores `denoise` and `deskew`; neither has a visible effect yet.
    pub fn is_identity(&self) -> bool {
        self.filter.mode == FilterMode::Original
            && self.filter.contrast == 1.0
            && self.filter.brightness == 0.0
            && self.filter.sharpen == 0.0
            && self.rotate == Rotation::None
            && self.crop.is_none()
            && self.warp.is_none()
    }

    /// With nothing rendered yet, any non-identity record is dirty; otherwise
    /// the record is compared to the one that produced the rendered asset.
    pub fn is_dirty(&self, last_rendered: Option<&Self>) -> bool {
        match last_rendered {
            Some(rendered) => self != rendered,
            None => !self.is_identity(),
        }
    }

    /// Layers `overrides` on top of `base`: a field of `overrides` wins only
    /// when it differs from that field's identity value.
    pub fn merge(base: &Self, overrides: &Self) -> Self {
        let identity = Self::identity();
        Self {
            crop: overrides.crop.or(base.crop),
            warp: overrides.warp.or(base.warp),
            rotate: pick(overrides.rotate, base.rotate, identity.rotate),
            denoise: pick(overrides.denoise, base.denoise, identity.denoise),
            deskew: pick(overrides.deskew, base.deskew, identity.deskew),
            filter: FilterSettings {
                mode: pick(
                    overrides.filter.mode,
                    base.filter.mode,
                    identity.filter.mode,
                ),
                contrast: pick(
                    overrides.filter.contrast,
                    base.filter.contrast,
                    identity.filter.contrast,
                ),
                brightness: pick(
                    overrides.filter.brightness,
                    base.filter.brightness,
                    identity.filter.brightness,
                ),
                sharpen: pick(
                    overrides.filter.sharpen,
                    base.filter.sharpen,
                    identity.filter.sharpen,
                ),
            },
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        check_finite("denoise", self.denoise)?;
        check_finite("deskew", self.deskew)?;
        check_finite("contrast", self.filter.contrast)?;
        check_finite("brightness", self.filter.brightness)?;
        check_finite("sharpen", self.filter.sharpen)?;

        if self.denoise < 0.0 {
            return out_of_range("denoise", self.denoise);
        }
        if self.filter.contrast <= 0.0 {
            return out_of_range("contrast", self.filter.contrast);
        }
        if !(-1.0..=1.0).contains(&self.filter.brightness) {
            return out_of_range("brightness", self.filter.brightness);
        }
        if !(0.0..=1.0).contains(&self.filter.sharpen) {
            return out_of_range("sharpen", self.filter.sharpen);
        }
        if let Some(crop) = self.crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(DomainError::EmptyCrop);
            }
        }
        if let Some(warp) = self.warp {
            if warp.corners.iter().flatten().any(|value| !value.is_finite()) {
                return Err(DomainError::NonFiniteEditParam("warp"));
            }
        }
        Ok(())
    }
}

fn pick<T: PartialEq>(over: T, base: T, identity: T) -> T {
    if over != identity {
        over
    } else {
        base
    }
}

fn check_finite(name: &'static str, value: f32) -> Result<(), DomainError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DomainError::NonFiniteEditParam(name))
    }
}

fn out_of_range(name: &'static str, value: f32) -> Result<(), DomainError> {
    Err(DomainError::EditParamOutOfRange { name, value })
}
