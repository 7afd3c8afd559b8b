//! Immutable raster captures and their conversion into embeddable PDF images.
//!
//! A [`RasterImage`] couples an RGB pixel buffer with the physical scale it was
//! rendered at. The buffer sits behind an [`Arc`] so slices, banners and covers
//! can share it without copying; nothing in the pipeline ever writes to it.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ColorType, DynamicImage, RgbImage};
use printpdf::{ColorBits, ColorSpace, ImageFilter, ImageXObject, Px};
use thiserror::Error;

pub(crate) const MM_PER_INCH: f64 = 25.4;

/// JPEG quality used when embedding page images.
pub const DEFAULT_JPEG_QUALITY: u8 = 98;

/// Errors raised while decoding or scaling a raster.
#[derive(Error, Debug)]
pub enum RasterError {
    /// The image bytes could not be decoded.
    #[error("failed to decode raster image: {0}")]
    Decode(#[from] image::ImageError),

    /// The image file could not be opened.
    #[error("failed to open raster image {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The physical scale is not a positive finite number.
    #[error("invalid raster scale of {0} pixels per millimetre")]
    InvalidScale(f64),
}

/// A rendered capture plus its physical-to-pixel scale.
#[derive(Clone, Debug)]
pub struct RasterImage {
    pixels: Arc<RgbImage>,
    px_per_unit: f64,
}

impl RasterImage {
    /// Wraps `image` rendered at `px_per_unit` pixels per millimetre.
    pub fn new(image: DynamicImage, px_per_unit: f64) -> Result<Self, RasterError> {
        Self::from_rgb(image.to_rgb8(), px_per_unit)
    }

    /// Wraps an RGB buffer rendered at `px_per_unit` pixels per millimetre.
    pub fn from_rgb(pixels: RgbImage, px_per_unit: f64) -> Result<Self, RasterError> {
        if !px_per_unit.is_finite() || px_per_unit <= 0.0 {
            return Err(RasterError::InvalidScale(px_per_unit));
        }
        Ok(Self {
            pixels: Arc::new(pixels),
            px_per_unit,
        })
    }

    /// Wraps `image` so that its full pixel width spans `width_mm`.
    pub fn fitted_to_width(image: DynamicImage, width_mm: f64) -> Result<Self, RasterError> {
        let width_px = image.width();
        if width_px == 0 {
            return Err(RasterError::InvalidScale(0.0));
        }
        Self::new(image, f64::from(width_px) / width_mm)
    }

    /// Decodes an encoded image (PNG or JPEG) and fits it to `width_mm`.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, width_mm: f64) -> Result<Self, RasterError> {
        let image = image::load_from_memory(bytes.as_ref())?;
        Self::fitted_to_width(image, width_mm)
    }

    /// Decodes the image at `path` and fits it to `width_mm`.
    pub fn from_path(path: impl AsRef<Path>, width_mm: f64) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let reader = image::io::Reader::open(path).map_err(|source| RasterError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let image = reader
            .with_guessed_format()
            .map_err(|source| RasterError::Open {
                path: path.display().to_string(),
                source,
            })?
            .decode()?;
        Self::fitted_to_width(image, width_mm)
    }

    /// Shares the pixels under the scale at which the full width spans `width_mm`.
    pub fn rescaled_to_width(&self, width_mm: f64) -> Result<Self, RasterError> {
        let px_per_unit = f64::from(self.width_px()) / width_mm;
        if !px_per_unit.is_finite() || px_per_unit <= 0.0 {
            return Err(RasterError::InvalidScale(px_per_unit));
        }
        Ok(Self {
            pixels: Arc::clone(&self.pixels),
            px_per_unit,
        })
    }

    pub fn width_px(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height_px(&self) -> u32 {
        self.pixels.height()
    }

    /// Pixels per millimetre.
    pub fn px_per_unit(&self) -> f64 {
        self.px_per_unit
    }

    /// Height of the raster in millimetres.
    pub fn physical_height(&self) -> f64 {
        f64::from(self.height_px()) / self.px_per_unit
    }

    /// Width of the raster in millimetres.
    pub fn physical_width(&self) -> f64 {
        f64::from(self.width_px()) / self.px_per_unit
    }

    /// Returns whether the raster holds no pixel rows.
    pub fn is_empty(&self) -> bool {
        self.height_px() == 0 || self.width_px() == 0
    }

    /// Copies the band of rows `[top, top + height)`, clamped to the raster.
    pub fn crop_rows(&self, top: u32, height: u32) -> RgbImage {
        let top = top.min(self.height_px());
        let height = height.min(self.height_px() - top);
        imageops::crop_imm(&*self.pixels, 0, top, self.width_px(), height).to_image()
    }

    /// Borrows the full pixel buffer.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// How page images are stored inside the PDF.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageEncoding {
    /// DCT-compressed JPEG at the given quality (1-100).
    Jpeg { quality: u8 },
    /// Uncompressed 8-bit RGB samples.
    Raw,
}

impl Default for ImageEncoding {
    fn default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Builds a PDF image XObject from an RGB buffer.
pub(crate) fn to_pdf_image(
    pixels: &RgbImage,
    encoding: ImageEncoding,
) -> Result<printpdf::Image, image::ImageError> {
    let (width, height) = pixels.dimensions();

    let (image_data, image_filter) = match encoding {
        ImageEncoding::Jpeg { quality } => {
            let mut buffer = Cursor::new(Vec::new());
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            encoder.encode(pixels.as_raw(), width, height, ColorType::Rgb8)?;
            (buffer.into_inner(), Some(ImageFilter::DCT))
        }
        ImageEncoding::Raw => (pixels.as_raw().clone(), None),
    };

    Ok(printpdf::Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data,
        image_filter,
        clipping_bbox: None,
        smask: None,
    }))
}
