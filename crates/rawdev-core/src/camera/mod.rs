//! Camera models and per-image camera data
//!
//! Each supported camera model is a registry entry holding its color
//! constants; the registry ends with a null camera that accepts anything,
//! so detection never fails. `CameraData` couples the detected model with
//! the values resolved from one image's metadata.

mod color;
mod registry;

#[cfg(test)]
mod tests;

pub use color::{ColorConversionData, ColorConverter, D65_WHITE, RGB_TO_XYZ};

use std::sync::OnceLock;

use crate::error::Result;
use crate::exif::ExifData;
use registry::{CameraSpec, CAMERA_TABLE};

/// Static behaviour of one camera model.
pub trait Camera: Send + Sync {
    /// Full identifying name, e.g. "NIKON D5000".
    fn name(&self) -> &str;

    /// Number of sensor colors, 3 or 4.
    fn colors(&self) -> usize;

    /// Image orientation, 1 through 8 (TIFF convention).
    fn orientation(&self, exif: &dyn ExifData) -> Result<u32>;

    /// True iff this model shot the image described by `exif`.
    fn can_handle(&self, exif: &dyn ExifData) -> bool;

    /// The model's color conversion matrices and multipliers.
    fn color_conversion_data(&self) -> ColorConversionData;
}

/// A model backed by a row of the Adobe coefficient table.
struct TableCamera {
    spec: &'static CameraSpec,
}

impl Camera for TableCamera {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn colors(&self) -> usize {
        self.spec.colors
    }

    fn orientation(&self, exif: &dyn ExifData) -> Result<u32> {
        Ok(exif.int("Exif.Image.Orientation")? as u32)
    }

    fn can_handle(&self, exif: &dyn ExifData) -> bool {
        exif.has("Exif.Image.Model")
            && exif
                .string("Exif.Image.Model")
                .map(|model| model == self.spec.name)
                .unwrap_or(false)
    }

    fn color_conversion_data(&self) -> ColorConversionData {
        ColorConversionData::derive(
            self.spec.black,
            self.spec.maximum,
            &self.spec.xyz_to_camera,
            self.spec.colors,
        )
    }
}

/// The terminal registry entry: identity color behaviour, accepts anything.
struct NullCamera;

impl Camera for NullCamera {
    fn name(&self) -> &str {
        "(null)"
    }

    fn colors(&self) -> usize {
        3
    }

    fn orientation(&self, _exif: &dyn ExifData) -> Result<u32> {
        Ok(1)
    }

    fn can_handle(&self, _exif: &dyn ExifData) -> bool {
        true
    }

    fn color_conversion_data(&self) -> ColorConversionData {
        ColorConversionData::default()
    }
}

/// The camera registry, built once on first use.
pub fn registry() -> &'static [Box<dyn Camera>] {
    static REGISTRY: OnceLock<Vec<Box<dyn Camera>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut cameras: Vec<Box<dyn Camera>> = CAMERA_TABLE
            .iter()
            .map(|spec| Box::new(TableCamera { spec }) as Box<dyn Camera>)
            .collect();
        cameras.push(Box::new(NullCamera));
        cameras
    })
}

/// Finds the registry entry for an image's metadata.
///
/// The null camera terminates the registry, so in practice this always
/// matches; `UnknownCamera` is reserved for a registry without it.
pub fn detect_camera(exif: &dyn ExifData) -> Result<&'static dyn Camera> {
    registry()
        .iter()
        .find(|camera| camera.can_handle(exif))
        .map(|camera| camera.as_ref())
        .ok_or(crate::error::Error::UnknownCamera)
}

/// A camera model coupled with the values resolved from one image.
///
/// Cheap to clone; images carry one for their lifetime.
#[derive(Clone)]
pub struct CameraData {
    camera: &'static dyn Camera,
    orientation: u32,
    raw_width: usize,
    raw_height: usize,
    filters: u32,
}

impl CameraData {
    /// Detects the camera for `exif` and resolves the per-image values.
    ///
    /// Raw dimensions and the CFA pattern are optional (PPM input has
    /// neither); they resolve to zero when absent.
    pub fn from_exif(exif: &dyn ExifData) -> Result<CameraData> {
        let camera = detect_camera(exif)?;
        let orientation = camera.orientation(exif)?;

        let raw_width = optional_int(exif, "Exif.SubImage2.ImageWidth")? as usize;
        let raw_height = optional_int(exif, "Exif.SubImage2.ImageLength")? as usize;

        let filters = if exif.has("Exif.SubImage2.CFAPattern") {
            filters_from_cfa(&exif.bytes("Exif.SubImage2.CFAPattern")?)
        } else {
            0
        };

        Ok(CameraData {
            camera,
            orientation,
            raw_width,
            raw_height,
            filters,
        })
    }

    pub fn name(&self) -> &str {
        self.camera.name()
    }

    pub fn colors(&self) -> usize {
        self.camera.colors()
    }

    pub fn orientation(&self) -> u32 {
        self.orientation
    }

    pub fn raw_width(&self) -> usize {
        self.raw_width
    }

    pub fn raw_height(&self) -> usize {
        self.raw_height
    }

    /// The Bayer pattern mask resolved from the CFA pattern tag.
    pub fn filters(&self) -> u32 {
        self.filters
    }

    pub fn color_conversion_data(&self) -> ColorConversionData {
        self.camera.color_conversion_data()
    }
}

impl std::fmt::Debug for CameraData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraData")
            .field("camera", &self.camera.name())
            .field("orientation", &self.orientation)
            .field("raw_width", &self.raw_width)
            .field("raw_height", &self.raw_height)
            .field("filters", &format_args!("{:#010x}", self.filters))
            .finish()
    }
}

fn optional_int(exif: &dyn ExifData, key: &str) -> Result<i64> {
    if exif.has(key) {
        exif.int(key)
    } else {
        Ok(0)
    }
}

/// Builds the 32-bit filters mask from a 4-byte CFA pattern
/// (top-left, top-right, bottom-left, bottom-right color indices).
pub fn filters_from_cfa(cfa: &[u8]) -> u32 {
    if cfa.len() < 4 {
        return 0;
    }
    let cell = (cfa[0] as u32 & 3)
        | ((cfa[1] as u32 & 3) << 2)
        | ((cfa[2] as u32 & 3) << 4)
        | ((cfa[3] as u32 & 3) << 6);
    cell * 0x0101_0101
}
