// src/engine/buffer.rs
//
// RawImageBuffer: immutable row-major RGBA8 pixels with a construction-time shape check.

use crate::error::{RawImageError, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Bytes per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// Immutable raw pixel container.
///
/// `pixels.len() == width * height * 4` always holds; there is no way to obtain a
/// mutable view of the pixels, so a buffer can be shared behind an `Arc` by any
/// number of readers.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for RawImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Byte length for a `width x height` RGBA buffer, `None` on overflow.
pub fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(CHANNELS)
}

impl RawImageBuffer {
    /// Construct from raw RGBA bytes. Fails with `ShapeMismatch` when the length
    /// does not equal `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let actual = pixels.len() as u64;
        match expected_len(width, height) {
            Some(expected) if expected == pixels.len() => Ok(Self {
                width,
                height,
                pixels,
            }),
            Some(expected) => Err(RawImageError::shape_mismatch(
                width,
                height,
                expected as u64,
                actual,
            )),
            None => Err(RawImageError::shape_mismatch(
                width,
                height,
                (width as u64)
                    .saturating_mul(height as u64)
                    .saturating_mul(CHANNELS as u64),
                actual,
            )),
        }
    }

    /// Internal constructor for callers that size `pixels` themselves.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(expected_len(width, height), Some(pixels.len()));
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Uniform image filled with one RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = expected_len(width, height)
            .ok_or_else(|| RawImageError::shape_mismatch(width, height, u64::MAX, 0))?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..len / CHANNELS {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    /// Build an image by evaluating `f(x, y)` for every pixel in row-major order.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Result<Self> {
        let len = expected_len(width, height)
            .ok_or_else(|| RawImageError::shape_mismatch(width, height, u64::MAX, 0))?;
        let mut pixels = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len() / CHANNELS
    }

    /// RGBA at `(x, y)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Well-formed for rendering: positive dimensions and a non-empty pixel buffer.
    pub fn is_structurally_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.pixels.is_empty()
    }

    /// New buffer with every pixel passed through `f`. Dimensions are kept.
    pub(crate) fn map_pixels(&self, mut f: impl FnMut([u8; 4]) -> [u8; 4]) -> Self {
        let mut out = Vec::with_capacity(self.pixels.len());
        for px in self.pixels.chunks_exact(CHANNELS) {
            out.extend_from_slice(&f([px[0], px[1], px[2], px[3]]));
        }
        Self {
            width: self.width,
            height: self.height,
            pixels: out,
        }
    }

    /// Encoded fallback form (PNG) for display, storage, or re-materialization.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| RawImageError::encode_failed("png", "buffer does not fit dimensions"))?;
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| RawImageError::encode_failed("png", e.to_string()))?;
        Ok(out)
    }
}

impl TryFrom<RgbaImage> for RawImageBuffer {
    type Error = RawImageError;

    fn try_from(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }
}

impl TryFrom<DynamicImage> for RawImageBuffer {
    type Error = RawImageError;

    fn try_from(img: DynamicImage) -> Result<Self> {
        match img {
            DynamicImage::ImageRgba8(rgba) => Self::try_from(rgba),
            other => Self::try_from(other.to_rgba8()),
        }
    }
}

impl From<RawImageBuffer> for RgbaImage {
    fn from(buf: RawImageBuffer) -> Self {
        let (w, h) = buf.dimensions();
        // The shape invariant guarantees from_raw accepts the buffer.
        RgbaImage::from_raw(w, h, buf.pixels).unwrap_or_else(|| RgbaImage::new(w, h))
    }
}
