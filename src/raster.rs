//! Mutable raster surface: the pixel buffer every editing operation acts on.
//!
//! `RasterBuffer` knows nothing about windows, textures or transforms — it
//! takes buffer-space coordinates and mutates (or extracts) pixels. The
//! viewport layer is responsible for mapping pointer input into this space.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use egui::{Pos2, Rect};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, Rgba, RgbaImage};

/// JPEG quality used for exports.
const JPEG_QUALITY: u8 = 90;

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for raster operations. Every variant is recoverable: a failed
/// decode, encode or crop leaves the existing buffer untouched.
#[derive(Debug)]
pub enum RasterError {
    /// Malformed or unsupported image bytes.
    Decode(String),
    /// The codec could not serialize the pixel data.
    Encode(String),
    /// Filesystem error while reading or writing.
    Io(std::io::Error),
    /// A crop rectangle with no overlap with the buffer.
    EmptyRegion,
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterError::Decode(e) => write!(f, "Decode error: {}", e),
            RasterError::Encode(e) => write!(f, "Encode error: {}", e),
            RasterError::Io(e) => write!(f, "I/O error: {}", e),
            RasterError::EmptyRegion => write!(f, "Selection has no overlap with the image"),
        }
    }
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        RasterError::Io(e)
    }
}

// ============================================================================
// SAVE FORMATS
// ============================================================================

/// Output formats offered by the save dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    /// Resolve a format from a file extension; unknown extensions fall back
    /// to PNG (the dialog's default suggestion).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            _ => SaveFormat::Png,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|e| Self::from_extension(&e.to_string_lossy()))
            .unwrap_or(SaveFormat::Png)
    }
}

// ============================================================================
// RASTER BUFFER
// ============================================================================

/// A fully-defined rectangular RGBA pixel grid. Dimensions are fixed at
/// creation; crop produces a *new* buffer rather than resizing in place.
#[derive(Clone)]
pub struct RasterBuffer {
    pixels: RgbaImage,
}

impl RasterBuffer {
    /// Create a buffer filled with a single color.
    pub fn new(width: u32, height: u32, fill: Rgba<u8>) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width.max(1), height.max(1), fill),
        }
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode raw file bytes into a buffer. Fails without side effects, so a
    /// bad file never leaves the caller in a half-loaded state.
    pub fn decode(bytes: &[u8]) -> Result<Self, RasterError> {
        let img = image::load_from_memory(bytes).map_err(|e| RasterError::Decode(e.to_string()))?;
        Ok(Self {
            pixels: img.to_rgba8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Buffer bounds as a float rect: (0,0) to (width, height).
    pub fn bounds(&self) -> Rect {
        Rect::from_min_max(
            Pos2::ZERO,
            Pos2::new(self.width() as f32, self.height() as f32),
        )
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Rasterize a straight stroke segment between two buffer-space points:
    /// round caps, round joins, `width` pixels thick, clipped to the buffer.
    ///
    /// Each pixel inside the clipped bounding box is tested against its
    /// distance to the segment with a hard threshold at the stroke radius, so
    /// redrawing the identical segment writes the identical pixels — chained
    /// drag segments never double-darken at their joins.
    ///
    /// A zero-length segment is a valid no-op (a click without a drag draws
    /// nothing); a segment entirely outside the buffer is likewise a no-op.
    pub fn draw_line(&mut self, p1: Pos2, p2: Pos2, color: Rgba<u8>, width: u32) {
        let radius = width.clamp(1, 50) as f32 / 2.0;
        let (w, h) = (self.width(), self.height());

        let delta = p2 - p1;
        let len_sq = delta.length_sq();
        if len_sq == 0.0 {
            return;
        }

        // Clip the segment's padded bounding box to the buffer; reject only
        // when nothing remains.
        let min_x = (p1.x.min(p2.x) - radius).floor();
        let max_x = (p1.x.max(p2.x) + radius).ceil();
        let min_y = (p1.y.min(p2.y) - radius).floor();
        let max_y = (p1.y.max(p2.y) + radius).ceil();
        if max_x < 0.0 || max_y < 0.0 || min_x >= w as f32 || min_y >= h as f32 {
            return;
        }
        let x0 = min_x.max(0.0) as u32;
        let y0 = min_y.max(0.0) as u32;
        let x1 = (max_x as u32).min(w - 1);
        let y1 = (max_y as u32).min(h - 1);

        let radius_sq = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Pos2::new(x as f32, y as f32);
                // Closest point on the segment; clamping t gives the
                // semicircular end caps.
                let t = ((p - p1).dot(delta) / len_sq).clamp(0.0, 1.0);
                let closest = p1 + delta * t;
                if (p - closest).length_sq() <= radius_sq {
                    self.pixels.put_pixel(x, y, color);
                }
            }
        }
    }

    /// Extract the pixels inside `rect` (buffer space) as a new buffer.
    ///
    /// The rectangle is intersected with the buffer bounds first; coordinates
    /// outside the buffer are clipped rather than rejected. Only a selection
    /// whose intersection is empty fails, and then the buffer is unchanged.
    pub fn crop_to(&self, rect: Rect) -> Result<RasterBuffer, RasterError> {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Err(RasterError::EmptyRegion);
        }
        let (w, h) = (self.width(), self.height());
        let x0 = rect.min.x.floor().max(0.0) as u32;
        let y0 = rect.min.y.floor().max(0.0) as u32;
        let x1 = (rect.max.x.ceil().max(0.0) as u32).min(w);
        let y1 = (rect.max.y.ceil().max(0.0) as u32).min(h);
        if x1 <= x0 || y1 <= y0 {
            return Err(RasterError::EmptyRegion);
        }
        let cropped = image::imageops::crop_imm(&self.pixels, x0, y0, x1 - x0, y1 - y0).to_image();
        Ok(RasterBuffer { pixels: cropped })
    }

    /// Encode the buffer to `path` in the requested format. The in-memory
    /// pixels are never modified by a save, failed or not.
    pub fn save_to(&self, path: &Path, format: SaveFormat) -> Result<(), RasterError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        match format {
            SaveFormat::Png => {
                let encoder = PngEncoder::new(&mut writer);
                #[allow(deprecated)]
                encoder
                    .encode(
                        self.pixels.as_raw(),
                        self.width(),
                        self.height(),
                        image::ColorType::Rgba8,
                    )
                    .map_err(|e| RasterError::Encode(e.to_string()))?;
            }
            SaveFormat::Jpeg => {
                // JPEG has no alpha channel — flatten to RGB first
                let rgb = DynamicImage::ImageRgba8(self.pixels.clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
                    .map_err(|e| RasterError::Encode(e.to_string()))?;
            }
            SaveFormat::Bmp => {
                let mut encoder = BmpEncoder::new(&mut writer);
                encoder
                    .encode(
                        self.pixels.as_raw(),
                        self.width(),
                        self.height(),
                        image::ColorType::Rgba8,
                    )
                    .map_err(|e| RasterError::Encode(e.to_string()))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
