// src/engine/handle.rs
//
// Raw handle protocol: pass a signature across a boundary instead of pixels.
//
// Producer side: decode or transform, store under a signature, hand out a RawHandle.
// Consumer side: resolve the handle through the cache. A miss is never decoded on
// demand; the consumer asks the producer to re-materialize from the encoded bytes.

use crate::engine::buffer::RawImageBuffer;
use crate::engine::cache::RawImageCache;
use crate::engine::loader::{ImageLoader, LoadedImage};
use crate::engine::pipeline;
use crate::engine::signature::ContentSignature;
use crate::error::{RawImageError, Result};
use crate::ops::Operation;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Reference to raw pixels assumed to be cached. Carries no pixel data.
///
/// `width`/`height` let a renderer lay out a surface before resolving. They
/// always equal the dimensions of the pixels stored under `signature`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawHandle {
    pub signature: ContentSignature,
    pub width: u32,
    pub height: u32,
}

impl RawHandle {
    pub fn new(signature: ContentSignature, buffer: &RawImageBuffer) -> Self {
        Self {
            signature,
            width: buffer.width(),
            height: buffer.height(),
        }
    }
}

/// Outcome of resolving a handle.
#[derive(Clone, Debug)]
pub enum Resolution {
    Hit(Arc<RawImageBuffer>),
    Miss(RawHandle),
}

impl Resolution {
    pub fn is_hit(&self) -> bool {
        matches!(self, Resolution::Hit(_))
    }

    /// Hit as `Ok`, miss as `CacheMiss`.
    pub fn into_result(self) -> Result<Arc<RawImageBuffer>> {
        match self {
            Resolution::Hit(buffer) => Ok(buffer),
            Resolution::Miss(handle) => Err(RawImageError::cache_miss(handle.signature.to_hex())),
        }
    }
}

/// Result of publishing a load.
#[derive(Clone, Debug)]
pub struct Published {
    pub signature: ContentSignature,
    /// `None` when the loader produced no raw buffer (encoded-only host).
    pub handle: Option<RawHandle>,
    pub encoded: Arc<Vec<u8>>,
}

/// Producer side of the protocol.
#[derive(Clone, Debug)]
pub struct Producer {
    cache: Arc<RawImageCache>,
}

impl Producer {
    pub fn new(cache: Arc<RawImageCache>) -> Self {
        Self { cache }
    }

    /// Sign the encoded bytes and cache the raw buffer if the loader produced one.
    pub fn publish_loaded(&self, loaded: LoadedImage) -> Published {
        let signature = ContentSignature::compute(&loaded.encoded);
        let handle = loaded
            .raw
            .map(|raw| self.publish_buffer(signature, raw));
        Published {
            signature,
            handle,
            encoded: loaded.encoded,
        }
    }

    /// Store a buffer under an already known signature.
    pub fn publish_buffer(&self, signature: ContentSignature, buffer: RawImageBuffer) -> RawHandle {
        let handle = RawHandle::new(signature, &buffer);
        self.cache.set(signature, buffer);
        debug!(
            target: "raw_image_cache::handle",
            %signature,
            width = handle.width,
            height = handle.height,
            "published buffer"
        );
        handle
    }

    /// Run `ops` over the buffer behind `source` and publish the result under a
    /// derived signature.
    ///
    /// A chain that optimizes to nothing returns `source` itself. A miss on the
    /// source is reported as `CacheMiss`; it is not decoded here.
    pub fn publish_derived(&self, source: &RawHandle, ops: &[Operation]) -> Result<RawHandle> {
        self.publish_derived_checked(source, ops, || Ok(()))
    }

    /// [`publish_derived`](Self::publish_derived) with a gate run after the pixels
    /// are computed and before anything is written. An error from `gate` aborts
    /// the publish and is returned as-is.
    pub(crate) fn publish_derived_checked(
        &self,
        source: &RawHandle,
        ops: &[Operation],
        gate: impl Fn() -> Result<()>,
    ) -> Result<RawHandle> {
        pipeline::validate_operation_sequence(ops)?;
        let optimized = pipeline::optimize_ops(ops);
        if optimized.is_empty() {
            return Ok(*source);
        }

        let signature = source.signature.derive(&optimized);
        if let Some(existing) = self.cache.try_get(&signature) {
            gate()?;
            debug!(target: "raw_image_cache::handle", %signature, "derived result already cached");
            return Ok(RawHandle::new(signature, &existing));
        }

        let parent = self
            .cache
            .try_get(&source.signature)
            .ok_or_else(|| RawImageError::cache_miss(source.signature.to_hex()))?;
        let result = match pipeline::apply_optimized(&parent, &optimized)? {
            Cow::Owned(buffer) => buffer,
            Cow::Borrowed(buffer) => buffer.clone(),
        };
        gate()?;
        Ok(self.publish_buffer(signature, result))
    }

    /// Decode `encoded` and store the pixels under the handle's signature.
    ///
    /// This is the explicit fallback path after a consumer miss. `encoded` must be
    /// the bytes the handle was signed over; anything else is a
    /// `SignatureMismatch`. A derived handle has no encoded form of its own:
    /// re-materialize its source and apply the edit again. Pixels whose size does
    /// not match the handle are rejected with `ShapeMismatch`. Nothing is cached
    /// on failure.
    pub fn rematerialize(
        &self,
        loader: &dyn ImageLoader,
        handle: &RawHandle,
        encoded: &[u8],
    ) -> Result<Arc<RawImageBuffer>> {
        let actual = ContentSignature::compute(encoded);
        if actual != handle.signature {
            return Err(RawImageError::signature_mismatch(
                handle.signature.to_hex(),
                actual.to_hex(),
            ));
        }

        let buffer = loader.decode(encoded)?;
        if buffer.dimensions() != (handle.width, handle.height) {
            return Err(RawImageError::shape_mismatch(
                handle.width,
                handle.height,
                handle.width as u64 * handle.height as u64 * 4,
                buffer.pixels().len() as u64,
            ));
        }

        let buffer = Arc::new(buffer);
        self.cache.set(handle.signature, Arc::clone(&buffer));
        debug!(
            target: "raw_image_cache::handle",
            signature = %handle.signature,
            "re-materialized from encoded bytes"
        );
        Ok(buffer)
    }
}

/// Consumer side of the protocol.
#[derive(Clone, Debug)]
pub struct Consumer {
    cache: Arc<RawImageCache>,
}

impl Consumer {
    pub fn new(cache: Arc<RawImageCache>) -> Self {
        Self { cache }
    }

    pub fn resolve(&self, handle: &RawHandle) -> Resolution {
        match self.cache.try_get(&handle.signature) {
            Some(buffer) => Resolution::Hit(buffer),
            None => {
                debug!(
                    target: "raw_image_cache::handle",
                    signature = %handle.signature,
                    "handle miss"
                );
                Resolution::Miss(*handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::NativeLoader;

    fn setup(capacity: usize) -> (Arc<RawImageCache>, Producer, Consumer) {
        let cache = Arc::new(RawImageCache::new(capacity).unwrap());
        (
            Arc::clone(&cache),
            Producer::new(Arc::clone(&cache)),
            Consumer::new(cache),
        )
    }

    fn buffer(v: u8) -> RawImageBuffer {
        RawImageBuffer::filled(4, 3, [v, v / 2, 255 - v, 255]).unwrap()
    }

    #[test]
    fn test_publish_then_resolve_hits() {
        let (_, producer, consumer) = setup(4);
        let sig = ContentSignature::compute(b"encoded");
        let handle = producer.publish_buffer(sig, buffer(10));
        assert_eq!((handle.width, handle.height), (4, 3));
        let hit = consumer.resolve(&handle).into_result().unwrap();
        assert_eq!(hit.pixel(0, 0), [10, 5, 245, 255]);
    }

    #[test]
    fn test_unknown_handle_is_a_miss_not_an_empty_image() {
        let (_, _, consumer) = setup(4);
        let handle = RawHandle {
            signature: ContentSignature::compute(b"never stored"),
            width: 1,
            height: 1,
        };
        let resolution = consumer.resolve(&handle);
        assert!(!resolution.is_hit());
        let err = resolution.into_result().unwrap_err();
        assert!(err.is_cache_miss());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_publish_loaded_without_raw_gives_no_handle() {
        let (cache, producer, _) = setup(4);
        let published = producer.publish_loaded(LoadedImage {
            encoded: Arc::new(b"bytes".to_vec()),
            raw: None,
        });
        assert!(published.handle.is_none());
        assert_eq!(published.signature, ContentSignature::compute(b"bytes"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_publish_derived_is_deterministic_and_cached() {
        let (cache, producer, consumer) = setup(8);
        let source = producer.publish_buffer(ContentSignature::compute(b"src"), buffer(40));
        let a = producer.publish_derived(&source, &[Operation::Invert]).unwrap();
        let b = producer.publish_derived(&source, &[Operation::Invert]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.signature, source.signature);
        assert_eq!(cache.len(), 2);
        let out = consumer.resolve(&a).into_result().unwrap();
        assert_eq!(out.pixel(0, 0), [215, 235, 40, 255]);
    }

    #[test]
    fn test_publish_derived_cancelling_chain_returns_source() {
        let (cache, producer, _) = setup(8);
        let source = producer.publish_buffer(ContentSignature::compute(b"src"), buffer(40));
        let out = producer
            .publish_derived(&source, &[Operation::FlipV, Operation::FlipV])
            .unwrap();
        assert_eq!(out, source);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_publish_derived_on_evicted_source_is_cache_miss() {
        let (_, producer, _) = setup(1);
        let source = producer.publish_buffer(ContentSignature::compute(b"a"), buffer(1));
        producer.publish_buffer(ContentSignature::compute(b"b"), buffer(2));
        let err = producer
            .publish_derived(&source, &[Operation::Grayscale])
            .unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[test]
    fn test_rematerialize_after_eviction() {
        let (_, producer, consumer) = setup(1);
        let png = buffer(90).encode_png().unwrap();
        let loader = NativeLoader::default();
        let published = producer.publish_loaded(loader.load(&png).unwrap());
        let handle = published.handle.unwrap();

        producer.publish_buffer(ContentSignature::compute(b"other"), buffer(3));
        let Resolution::Miss(missed) = consumer.resolve(&handle) else {
            panic!("expected the first image to be evicted");
        };

        let restored = producer
            .rematerialize(&loader, &missed, &published.encoded)
            .unwrap();
        assert_eq!(restored.as_ref(), &buffer(90));
        assert!(consumer.resolve(&handle).is_hit());
    }

    #[test]
    fn test_rematerialize_derived_handle_with_source_bytes_is_rejected() {
        let (cache, producer, consumer) = setup(4);
        let png = RawImageBuffer::filled(4, 2, [10, 20, 30, 255])
            .unwrap()
            .encode_png()
            .unwrap();
        let loader = NativeLoader::default();
        let source = producer
            .publish_loaded(loader.load(&png).unwrap())
            .handle
            .unwrap();
        let inverted = producer.publish_derived(&source, &[Operation::Invert]).unwrap();
        cache.clear();

        let err = producer.rematerialize(&loader, &inverted, &png).unwrap_err();
        assert!(matches!(err, RawImageError::SignatureMismatch { .. }));
        assert!(!cache.contains(&inverted.signature));

        // Recovery goes through the source and replays the edit.
        producer.rematerialize(&loader, &source, &png).unwrap();
        let again = producer.publish_derived(&source, &[Operation::Invert]).unwrap();
        assert_eq!(again, inverted);
        let pixels = consumer.resolve(&inverted).into_result().unwrap();
        assert_eq!(pixels.pixel(3, 1), [245, 235, 225, 255]);
    }

    #[test]
    fn test_rematerialize_rejects_pixels_of_another_size() {
        let (cache, producer, _) = setup(4);
        let png = RawImageBuffer::filled(7, 7, [1, 2, 3, 255])
            .unwrap()
            .encode_png()
            .unwrap();
        let handle = RawHandle {
            signature: ContentSignature::compute(&png),
            width: 4,
            height: 2,
        };

        let err = producer
            .rematerialize(&NativeLoader::default(), &handle, &png)
            .unwrap_err();
        assert!(matches!(
            err,
            RawImageError::ShapeMismatch {
                width: 4,
                height: 2,
                ..
            }
        ));
        assert!(cache.is_empty());
    }
}
