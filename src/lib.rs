// lib.rs
//
// raw-image-cache: a raw-pixel cache and transform pipeline for image editors
//
// Design goals:
// - Decode once, edit many times: raw buffers are cached by content signature
// - Pure, deterministic pixel operations over immutable buffers
// - Hand off signatures, not pixels, between hosts
// - Edits run off the interaction thread and newer edits supersede older ones

// Memory allocator optimization - jemalloc for large, short-lived pixel buffers
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    ContentSignature, EngineConfig, PixelEngine, RawHandle, RawImageBuffer, RawImageCache,
    Resolution,
};
pub use error::{ErrorCategory, RawImageError, Result};
pub use ops::{Operation, OperationEffect, Palette};

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
