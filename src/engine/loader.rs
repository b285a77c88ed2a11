// src/engine/loader.rs
//
// Loader collaborator: source bytes -> (encoded form, optional raw buffer).
//
// A sandboxed host may only be able to keep the encoded bytes; a native host
// decodes as well. Either way the signature is computed over the encoded bytes.

use crate::engine::buffer::RawImageBuffer;
use crate::engine::common::run_with_panic_policy;
use crate::engine::config::DecodeLimits;
use crate::error::{RawImageError, Result};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// What a loader hands back for one image.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    /// The bytes the signature is computed over.
    pub encoded: Arc<Vec<u8>>,
    /// Decoded pixels, when the host could produce them.
    pub raw: Option<RawImageBuffer>,
}

pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &[u8]) -> Result<LoadedImage>;

    /// Decode encoded bytes to raw pixels. Used to re-materialize after a cache miss.
    fn decode(&self, encoded: &[u8]) -> Result<RawImageBuffer>;
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Decoder backed by the `image` crate (PNG, JPEG, WebP).
#[derive(Clone, Debug, Default)]
pub struct NativeLoader {
    limits: DecodeLimits,
}

impl NativeLoader {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Inspect the header and reject oversized images before allocating pixels.
    fn ensure_dimensions_safe(&self, bytes: &[u8]) -> Result<()> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RawImageError::decode_failed(format!("failed to sniff format: {e}")))?;
        if let Ok((width, height)) = reader.into_dimensions() {
            return self.limits.check(width, height);
        }
        Ok(())
    }

    /// Read a file and load it.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedImage> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            RawImageError::file_read_failed(path.to_string_lossy().to_string(), e)
        })?;
        self.load(&data)
    }
}

impl ImageLoader for NativeLoader {
    fn load(&self, source: &[u8]) -> Result<LoadedImage> {
        let raw = self.decode(source)?;
        Ok(LoadedImage {
            encoded: Arc::new(source.to_vec()),
            raw: Some(raw),
        })
    }

    fn decode(&self, encoded: &[u8]) -> Result<RawImageBuffer> {
        let format = match detect_format(encoded) {
            Some(f @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => f,
            Some(other) => {
                return Err(RawImageError::unsupported_format(format!("{other:?}")));
            }
            None => return Err(RawImageError::unsupported_format("unknown")),
        };
        self.ensure_dimensions_safe(encoded)?;

        let img = run_with_panic_policy("decode:image", || {
            image::load_from_memory_with_format(encoded, format)
                .map_err(|e| RawImageError::decode_failed(format!("decode failed: {e}")))
        })?;
        // The header may lie; check what was actually decoded as well.
        self.limits.check(img.width(), img.height())?;

        let raw = RawImageBuffer::try_from(img)?;
        debug!(
            target: "raw_image_cache::handle",
            ?format,
            width = raw.width(),
            height = raw.height(),
            "decoded image"
        );
        Ok(raw)
    }
}

/// Loader for hosts without codec access: keeps only the encoded bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodedOnlyLoader;

impl ImageLoader for EncodedOnlyLoader {
    fn load(&self, source: &[u8]) -> Result<LoadedImage> {
        Ok(LoadedImage {
            encoded: Arc::new(source.to_vec()),
            raw: None,
        })
    }

    fn decode(&self, _encoded: &[u8]) -> Result<RawImageBuffer> {
        Err(RawImageError::unsupported_format(
            "decoding is not available on this host",
        ))
    }
}
