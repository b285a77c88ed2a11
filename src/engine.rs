// src/engine.rs
//
// The core of raw-image-cache:
// 1. Decoded pixels are cached by the signature of their encoded bytes
// 2. Edits run pure pixel operations and re-cache results under derived signatures
// 3. Hosts pass RawHandles (signatures) across boundaries instead of pixels
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod buffer;
mod cache;
mod common;
mod config;
pub mod filters;
mod handle;
mod loader;
mod pipeline;
mod pool;
mod scheduler;
mod signature;
mod surfaces;
mod wire;

pub use api::PixelEngine;
pub use buffer::{expected_len, RawImageBuffer, CHANNELS};
pub use cache::{CacheStats, RawImageCache};
pub use common::run_with_panic_policy;
pub use config::{
    CacheConfig, DecodeLimits, EngineConfig, CACHE_CAPACITY_ENV, DEFAULT_CACHE_CAPACITY,
    WORKER_THREADS_ENV,
};
pub use handle::{Consumer, Producer, Published, RawHandle, Resolution};
pub use loader::{detect_format, EncodedOnlyLoader, ImageLoader, LoadedImage, NativeLoader};
pub use pipeline::{apply_op, apply_ops, optimize_ops, validate_operation_sequence};
pub use pool::{worker_count, MAX_WORKER_THREADS};
pub use scheduler::{TargetId, TransformScheduler, TransformTicket};
pub use signature::ContentSignature;
pub use surfaces::{SurfaceBindings, SurfaceId};
pub use wire::{from_wire_bytes, read_wire_file, to_wire_bytes, write_wire_file, HEADER_LEN};
