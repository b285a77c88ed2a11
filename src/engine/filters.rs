// src/engine/filters.rs
//
// Pure pixel transforms over RawImageBuffer.
//
// Every function takes `&RawImageBuffer` and returns a freshly allocated buffer;
// the source is never touched. Parameters are checked before any pixel work.
// Neighborhood filters sample with a replicated border.

use crate::engine::buffer::{RawImageBuffer, CHANNELS};
use crate::error::{RawImageError, Result};
use crate::engine::config::DecodeLimits;
use crate::ops::{Operation, Palette};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, RgbaImage};
use tracing::debug;

pub const MAX_BLUR_RADIUS: u32 = 64;

// =============================================================================
// PARAMETER CHECKS
// =============================================================================

pub(crate) fn check_range(name: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(RawImageError::invalid_parameter(
            name,
            value.to_string(),
            format!("must be between {min} and {max}"),
        ));
    }
    Ok(())
}

pub(crate) fn check_levels(levels: u32) -> Result<()> {
    if levels < 2 {
        return Err(RawImageError::invalid_parameter(
            "levels",
            levels.to_string(),
            "must be at least 2",
        ));
    }
    Ok(())
}

pub(crate) fn check_block(name: &'static str, size: u32) -> Result<()> {
    if size == 0 {
        return Err(RawImageError::invalid_parameter(
            name,
            "0",
            "must be at least 1",
        ));
    }
    Ok(())
}

pub(crate) fn check_radius(radius: u32) -> Result<()> {
    check_range("radius", radius as i64, 1, MAX_BLUR_RADIUS as i64)
}

pub(crate) fn check_percent(name: &'static str, value: u32) -> Result<()> {
    check_range(name, value as i64, 0, 100)
}

pub(crate) fn check_rotation(degrees: i32) -> Result<()> {
    if matches!(degrees, 0 | 90 | 180 | 270 | -90 | -180 | -270) {
        return Ok(());
    }
    Err(RawImageError::invalid_parameter(
        "degrees",
        degrees.to_string(),
        "only 0, 90, 180, 270 (and negatives) are supported",
    ))
}

/// Dimension-independent parameter check for one operation.
///
/// Crop bounds depend on the buffer the crop runs against and are checked by
/// [`crop`] itself.
pub(crate) fn validate(op: &Operation) -> Result<()> {
    match *op {
        Operation::Grayscale
        | Operation::Invert
        | Operation::Sepia
        | Operation::Sharpen
        | Operation::Emboss
        | Operation::EdgeDetect
        | Operation::ColorMap { .. }
        | Operation::FlipH
        | Operation::FlipV => Ok(()),
        Operation::Posterize { levels } => check_levels(levels),
        Operation::Pixelize { block_size } => check_block("block_size", block_size),
        Operation::Brightness { offset } => check_range("offset", offset as i64, -255, 255),
        Operation::Contrast { amount } => check_range("amount", amount as i64, -100, 100),
        Operation::Blur { radius } | Operation::Sketch { radius } => check_radius(radius),
        Operation::Cartoon {
            levels,
            edge_threshold,
        } => {
            check_levels(levels)?;
            check_range("edge_threshold", edge_threshold as i64, 0, 255)
        }
        Operation::Glow { radius, intensity } => {
            check_radius(radius)?;
            check_percent("intensity", intensity)
        }
        Operation::Vignette { strength } => check_percent("strength", strength),
        Operation::Noise { amount, .. } => check_range("amount", amount as i64, 0, 255),
        Operation::Downsample { factor } => check_block("factor", factor),
        Operation::Resize { width, height } => check_target_size("resize", width, height),
        Operation::Crop { width, height, .. } => check_target_size("crop", width, height),
        Operation::Rotate { degrees } => check_rotation(degrees),
    }
}

fn check_target_size(name: &'static str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RawImageError::invalid_parameter(
            name,
            format!("{width}x{height}"),
            format!("{name} width and height must be positive"),
        ));
    }
    DecodeLimits::default().check(width, height)
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

#[inline]
fn round_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// ITU-R BT.601 luma.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    round_u8(0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
}

fn luma_plane(src: &RawImageBuffer) -> Vec<u8> {
    src.pixels()
        .chunks_exact(CHANNELS)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect()
}

#[inline]
fn clamp_coord(v: i64, len: u32) -> u32 {
    v.clamp(0, len as i64 - 1) as u32
}

/// Per-channel rounded mean over each `block x block` tile. Returns the tile means
/// in row-major tile order together with the tile grid size.
fn tile_means(src: &RawImageBuffer, block: u32) -> (u32, u32, Vec<[u8; 4]>) {
    let (w, h) = src.dimensions();
    let tiles_x = w.div_ceil(block);
    let tiles_y = h.div_ceil(block);
    let mut means = Vec::with_capacity(tiles_x as usize * tiles_y as usize);
    for ty in 0..tiles_y {
        let y0 = ty * block;
        let y1 = (y0 + block).min(h);
        for tx in 0..tiles_x {
            let x0 = tx * block;
            let x1 = (x0 + block).min(w);
            let mut sums = [0u64; 4];
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = src.offset(x, y);
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += src.pixels()[i + c] as u64;
                    }
                }
            }
            let n = ((x1 - x0) * (y1 - y0)) as u64;
            means.push(sums.map(|s| ((s + n / 2) / n) as u8));
        }
    }
    (tiles_x, tiles_y, means)
}

/// Box mean of all four channels over a (2r+1)^2 window clipped to the image.
/// Uses a summed-area table so the cost does not depend on the radius.
fn box_mean(src: &RawImageBuffer, radius: u32) -> Vec<u8> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let stride = w + 1;
    let mut table = vec![0u64; stride * (h + 1) * CHANNELS];
    for y in 0..h {
        let mut row = [0u64; 4];
        for x in 0..w {
            let i = (y * w + x) * CHANNELS;
            for c in 0..CHANNELS {
                row[c] += src.pixels()[i + c] as u64;
                let above = table[(y * stride + x + 1) * CHANNELS + c];
                table[((y + 1) * stride + x + 1) * CHANNELS + c] = above + row[c];
            }
        }
    }

    let r = radius as usize;
    let mut out = vec![0u8; w * h * CHANNELS];
    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(h - 1) + 1;
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(w - 1) + 1;
            let n = ((x1 - x0) * (y1 - y0)) as u64;
            for c in 0..CHANNELS {
                let at = |yy: usize, xx: usize| table[(yy * stride + xx) * CHANNELS + c];
                let sum = at(y1, x1) + at(y0, x0) - at(y0, x1) - at(y1, x0);
                out[(y * w + x) * CHANNELS + c] = ((sum + n / 2) / n) as u8;
            }
        }
    }
    out
}

/// 3x3 convolution on RGB with a replicated border; alpha is copied.
fn convolve3x3(src: &RawImageBuffer, kernel: [i32; 9]) -> RawImageBuffer {
    let (w, h) = src.dimensions();
    let mut out = Vec::with_capacity(src.pixels().len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0i32; 3];
            for ky in 0..3i64 {
                for kx in 0..3i64 {
                    let sx = clamp_coord(x as i64 + kx - 1, w);
                    let sy = clamp_coord(y as i64 + ky - 1, h);
                    let k = kernel[(ky * 3 + kx) as usize];
                    let i = src.offset(sx, sy);
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += k * src.pixels()[i + c] as i32;
                    }
                }
            }
            let alpha = src.pixels()[src.offset(x, y) + 3];
            out.extend_from_slice(&[
                acc[0].clamp(0, 255) as u8,
                acc[1].clamp(0, 255) as u8,
                acc[2].clamp(0, 255) as u8,
                alpha,
            ]);
        }
    }
    RawImageBuffer::from_parts(w, h, out)
}

/// Sobel gradient magnitude of the luma plane, one value per pixel.
fn sobel_magnitude(src: &RawImageBuffer) -> Vec<u8> {
    let (w, h) = src.dimensions();
    let plane = luma_plane(src);
    let at = |x: i64, y: i64| -> i32 {
        plane[clamp_coord(y, h) as usize * w as usize + clamp_coord(x, w) as usize] as i32
    };
    let mut out = Vec::with_capacity(plane.len());
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let magnitude = ((gx * gx + gy * gy) as f64).sqrt();
            out.push(round_u8(magnitude));
        }
    }
    out
}

/// From 256 levels on every value maps to itself.
fn posterize_lut(levels: u32) -> [u8; 256] {
    let steps = (levels - 1) as f64;
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let q = (v as f64 / 255.0 * steps).round();
        *slot = round_u8(q * 255.0 / steps);
    }
    lut
}

// =============================================================================
// POINT OPERATIONS
// =============================================================================

pub fn grayscale(src: &RawImageBuffer) -> RawImageBuffer {
    src.map_pixels(|[r, g, b, a]| {
        let l = luma(r, g, b);
        [l, l, l, a]
    })
}

pub fn invert(src: &RawImageBuffer) -> RawImageBuffer {
    src.map_pixels(|[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
}

pub fn posterize(src: &RawImageBuffer, levels: u32) -> Result<RawImageBuffer> {
    check_levels(levels)?;
    let lut = posterize_lut(levels);
    Ok(src.map_pixels(|[r, g, b, a]| [lut[r as usize], lut[g as usize], lut[b as usize], a]))
}

pub fn brightness(src: &RawImageBuffer, offset: i32) -> Result<RawImageBuffer> {
    check_range("offset", offset as i64, -255, 255)?;
    let shift = |v: u8| (v as i32 + offset).clamp(0, 255) as u8;
    Ok(src.map_pixels(|[r, g, b, a]| [shift(r), shift(g), shift(b), a]))
}

pub fn contrast(src: &RawImageBuffer, amount: i32) -> Result<RawImageBuffer> {
    check_range("amount", amount as i64, -100, 100)?;
    let factor = ((100.0 + amount as f64) / 100.0).powi(2);
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = round_u8((v as f64 - 127.5) * factor + 127.5);
    }
    Ok(src.map_pixels(|[r, g, b, a]| [lut[r as usize], lut[g as usize], lut[b as usize], a]))
}

pub fn sepia(src: &RawImageBuffer) -> RawImageBuffer {
    src.map_pixels(|[r, g, b, a]| {
        let (r, g, b) = (r as f64, g as f64, b as f64);
        [
            round_u8(0.393 * r + 0.769 * g + 0.189 * b),
            round_u8(0.349 * r + 0.686 * g + 0.168 * b),
            round_u8(0.272 * r + 0.534 * g + 0.131 * b),
            a,
        ]
    })
}

pub fn color_map(src: &RawImageBuffer, palette: Palette) -> RawImageBuffer {
    let stops = palette.stops();
    let mut lut = [[0u8; 3]; 256];
    for (l, slot) in lut.iter_mut().enumerate() {
        let segment = (l / 85).min(2);
        let (lo, hi) = (stops[segment], stops[segment + 1]);
        let t = (l - segment * 85) as f64;
        for c in 0..3 {
            let span = hi[c] as f64 - lo[c] as f64;
            slot[c] = round_u8(lo[c] as f64 + span * t / 85.0);
        }
    }
    src.map_pixels(|[r, g, b, a]| {
        let [mr, mg, mb] = lut[luma(r, g, b) as usize];
        [mr, mg, mb, a]
    })
}

pub fn vignette(src: &RawImageBuffer, strength: u32) -> Result<RawImageBuffer> {
    check_percent("strength", strength)?;
    let (w, h) = src.dimensions();
    let cx = (w.max(1) - 1) as f64 / 2.0;
    let cy = (h.max(1) - 1) as f64 / 2.0;
    let max_sq = cx * cx + cy * cy;
    let s = strength as f64 / 100.0;

    let mut out = Vec::with_capacity(src.pixels().len());
    for y in 0..h {
        for x in 0..w {
            let [r, g, b, a] = src.pixel(x, y);
            let factor = if max_sq == 0.0 {
                1.0
            } else {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                1.0 - s * (dx * dx + dy * dy) / max_sq
            };
            out.extend_from_slice(&[
                round_u8(r as f64 * factor),
                round_u8(g as f64 * factor),
                round_u8(b as f64 * factor),
                a,
            ]);
        }
    }
    Ok(RawImageBuffer::from_parts(w, h, out))
}

/// xorshift64* stream; deterministic for a seed on every platform.
struct NoiseStream(u64);

impl NoiseStream {
    fn new(seed: u64) -> Self {
        let state = seed ^ 0x9E37_79B9_7F4A_7C15;
        Self(if state == 0 { 0x2545_F491_4F6C_DD1D } else { state })
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

pub fn noise(src: &RawImageBuffer, amount: u32, seed: u64) -> Result<RawImageBuffer> {
    check_range("amount", amount as i64, 0, 255)?;
    if amount == 0 {
        return Ok(src.clone());
    }
    let span = 2 * amount as u64 + 1;
    let mut stream = NoiseStream::new(seed);
    Ok(src.map_pixels(|[r, g, b, a]| {
        let offset = (stream.next() % span) as i32 - amount as i32;
        let shift = |v: u8| (v as i32 + offset).clamp(0, 255) as u8;
        [shift(r), shift(g), shift(b), a]
    }))
}

// =============================================================================
// NEIGHBORHOOD OPERATIONS
// =============================================================================

/// Replace every tile with its mean color. Alpha is averaged like the color channels.
pub fn pixelize(src: &RawImageBuffer, block_size: u32) -> Result<RawImageBuffer> {
    check_block("block_size", block_size)?;
    let (w, h) = src.dimensions();
    let (tiles_x, _, means) = tile_means(src, block_size);
    let mut out = Vec::with_capacity(src.pixels().len());
    for y in 0..h {
        let ty = y / block_size;
        for x in 0..w {
            let tx = x / block_size;
            out.extend_from_slice(&means[(ty * tiles_x + tx) as usize]);
        }
    }
    Ok(RawImageBuffer::from_parts(w, h, out))
}

pub fn blur(src: &RawImageBuffer, radius: u32) -> Result<RawImageBuffer> {
    check_radius(radius)?;
    Ok(RawImageBuffer::from_parts(src.width(), src.height(), box_mean(src, radius)))
}

pub fn sharpen(src: &RawImageBuffer) -> RawImageBuffer {
    convolve3x3(src, [0, -1, 0, -1, 5, -1, 0, -1, 0])
}

pub fn emboss(src: &RawImageBuffer) -> RawImageBuffer {
    convolve3x3(src, [-2, -1, 0, -1, 1, 1, 0, 1, 2])
}

pub fn edge_detect(src: &RawImageBuffer) -> RawImageBuffer {
    let edges = sobel_magnitude(src);
    let mut i = 0;
    src.map_pixels(|[_, _, _, a]| {
        let m = edges[i];
        i += 1;
        [m, m, m, a]
    })
}

/// Pencil sketch: color-dodge the luma against a blurred inverse of itself.
pub fn sketch(src: &RawImageBuffer, radius: u32) -> Result<RawImageBuffer> {
    check_radius(radius)?;
    let gray = luma_plane(src);
    let inverted = RawImageBuffer::from_parts(
        src.width(),
        src.height(),
        gray.iter().flat_map(|&g| [255 - g, 255 - g, 255 - g, 255]).collect(),
    );
    let blurred = box_mean(&inverted, radius);
    let mut i = 0;
    Ok(src.map_pixels(|[_, _, _, a]| {
        let g = gray[i] as u32;
        let b = blurred[i * CHANNELS] as u32;
        i += 1;
        let v = if b == 255 {
            255
        } else {
            round_u8(g as f64 * 255.0 / (255 - b) as f64)
        };
        [v, v, v, a]
    }))
}

/// Posterized color with dark outlines where the luma gradient exceeds the threshold.
pub fn cartoon(src: &RawImageBuffer, levels: u32, edge_threshold: u32) -> Result<RawImageBuffer> {
    check_levels(levels)?;
    check_range("edge_threshold", edge_threshold as i64, 0, 255)?;
    let lut = posterize_lut(levels);
    let edges = sobel_magnitude(src);
    let mut i = 0;
    Ok(src.map_pixels(|[r, g, b, a]| {
        let edge = edges[i] as u32 > edge_threshold;
        i += 1;
        if edge {
            [0, 0, 0, a]
        } else {
            [lut[r as usize], lut[g as usize], lut[b as usize], a]
        }
    }))
}

/// Screen-blend a blurred copy over the source.
pub fn glow(src: &RawImageBuffer, radius: u32, intensity: u32) -> Result<RawImageBuffer> {
    check_radius(radius)?;
    check_percent("intensity", intensity)?;
    let blurred = box_mean(src, radius);
    let k = intensity as f64 / 100.0;
    let mut i = 0;
    Ok(src.map_pixels(|[r, g, b, a]| {
        let base = i * CHANNELS;
        i += 1;
        let screen = |v: u8, c: usize| {
            let top = blurred[base + c] as f64 * k;
            round_u8(255.0 - (255.0 - v as f64) * (255.0 - top) / 255.0)
        };
        [screen(r, 0), screen(g, 1), screen(b, 2), a]
    }))
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Block-reduction preview: one output pixel per `factor x factor` tile.
pub fn downsample(src: &RawImageBuffer, factor: u32) -> Result<RawImageBuffer> {
    check_block("factor", factor)?;
    let (tiles_x, tiles_y, means) = tile_means(src, factor);
    Ok(RawImageBuffer::from_parts(tiles_x, tiles_y, means.concat()))
}

pub fn crop(src: &RawImageBuffer, x: u32, y: u32, width: u32, height: u32) -> Result<RawImageBuffer> {
    check_target_size("crop", width, height)?;
    let fits_x = x.checked_add(width).is_some_and(|right| right <= src.width());
    let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= src.height());
    if !fits_x || !fits_y {
        return Err(RawImageError::invalid_parameter(
            "crop",
            format!("({x}+{width}, {y}+{height})"),
            format!(
                "region exceeds image dimensions {}x{}",
                src.width(),
                src.height()
            ),
        ));
    }
    let row_bytes = width as usize * CHANNELS;
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in y..y + height {
        let start = src.offset(x, row);
        out.extend_from_slice(&src.pixels()[start..start + row_bytes]);
    }
    Ok(RawImageBuffer::from_parts(width, height, out))
}

pub fn flip_h(src: &RawImageBuffer) -> RawImageBuffer {
    let (w, h) = src.dimensions();
    let mut out = Vec::with_capacity(src.pixels().len());
    for y in 0..h {
        for x in (0..w).rev() {
            out.extend_from_slice(&src.pixel(x, y));
        }
    }
    RawImageBuffer::from_parts(w, h, out)
}

pub fn flip_v(src: &RawImageBuffer) -> RawImageBuffer {
    let (w, h) = src.dimensions();
    let row_bytes = w as usize * CHANNELS;
    let mut out = Vec::with_capacity(src.pixels().len());
    for y in (0..h).rev() {
        let start = src.offset(0, y);
        out.extend_from_slice(&src.pixels()[start..start + row_bytes]);
    }
    RawImageBuffer::from_parts(w, h, out)
}

/// Clockwise rotation by a multiple of 90 degrees.
pub fn rotate(src: &RawImageBuffer, degrees: i32) -> Result<RawImageBuffer> {
    check_rotation(degrees)?;
    let quarter_turns = match degrees {
        90 | -270 => 1,
        180 | -180 => 2,
        270 | -90 => 3,
        _ => 0,
    };
    let (w, h) = src.dimensions();
    let (out_w, out_h) = if quarter_turns % 2 == 1 { (h, w) } else { (w, h) };
    let mut out = vec![0u8; src.pixels().len()];
    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = match quarter_turns {
                0 => (x, y),
                1 => (h - 1 - y, x),
                2 => (w - 1 - x, h - 1 - y),
                _ => (y, w - 1 - x),
            };
            let d = (dy as usize * out_w as usize + dx as usize) * CHANNELS;
            out[d..d + CHANNELS].copy_from_slice(&src.pixel(x, y));
        }
    }
    Ok(RawImageBuffer::from_parts(out_w, out_h, out))
}

/// Lanczos3 resize through fast_image_resize, with the image crate as fallback.
pub fn resize(src: &RawImageBuffer, width: u32, height: u32) -> Result<RawImageBuffer> {
    check_target_size("resize", width, height)?;
    if !src.is_structurally_valid() {
        return Err(RawImageError::invalid_parameter(
            "resize",
            format!("{}x{}", src.width(), src.height()),
            "cannot resize an empty image",
        ));
    }
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }

    match resize_with_fir(src, width, height) {
        Ok(pixels) => Ok(RawImageBuffer::from_parts(width, height, pixels)),
        Err(reason) => {
            debug!(
                target: "raw_image_cache::pipeline",
                %reason,
                "fast_image_resize failed; using image crate fallback"
            );
            let rgba = RgbaImage::from_raw(src.width(), src.height(), src.pixels().to_vec())
                .ok_or_else(|| RawImageError::internal_panic("rgba view of raw buffer failed"))?;
            let resized = image::imageops::resize(&rgba, width, height, FilterType::Lanczos3);
            RawImageBuffer::try_from(resized)
        }
    }
}

fn is_fully_opaque(pixels: &[u8]) -> bool {
    pixels.iter().skip(3).step_by(CHANNELS).all(|&a| a == 255)
}

fn resize_with_fir(
    src: &RawImageBuffer,
    width: u32,
    height: u32,
) -> std::result::Result<Vec<u8>, String> {
    let mut src_pixels = src.pixels().to_vec();
    match fir::images::Image::from_slice_u8(
        src.width(),
        src.height(),
        src_pixels.as_mut_slice(),
        PixelType::U8x4,
    ) {
        Ok(src_image) => resize_with_source_image(src_image, width, height),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src.width(), src.height(), PixelType::U8x4);
            let buffer = aligned.buffer_mut();
            if buffer.len() != src.pixels().len() {
                return Err(format!(
                    "fir alignment fallback buffer mismatch. expected {} bytes, got {} bytes",
                    src.pixels().len(),
                    buffer.len()
                ));
            }
            buffer.copy_from_slice(src.pixels());
            resize_with_source_image(aligned, width, height)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    }
}

fn resize_with_source_image(
    mut src_image: fir::images::Image<'_>,
    width: u32,
    height: u32,
) -> std::result::Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(width, height, PixelType::U8x4);

    // Premultiply so transparent pixels do not bleed color into their neighbors.
    let needs_premultiply = !is_fully_opaque(src_image.buffer());
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let options =
        ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }
    Ok(dst_image.into_vec())
}
