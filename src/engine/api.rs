// src/engine/api.rs
//
// PixelEngine: explicitly constructed facade over cache, loader, pipeline and
// scheduler. No ambient statics; tests create isolated engines.

use crate::engine::buffer::RawImageBuffer;
use crate::engine::cache::RawImageCache;
use crate::engine::config::EngineConfig;
use crate::engine::handle::{Consumer, Producer, Published, RawHandle, Resolution};
use crate::engine::loader::{ImageLoader, NativeLoader};
use crate::engine::scheduler::{TargetId, TransformScheduler, TransformTicket};
use crate::engine::surfaces::{SurfaceBindings, SurfaceId};
use crate::error::{RawImageError, Result};
use crate::ops::Operation;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct PixelEngine {
    config: EngineConfig,
    cache: Arc<RawImageCache>,
    loader: Arc<dyn ImageLoader>,
    producer: Producer,
    consumer: Consumer,
    scheduler: TransformScheduler,
    surfaces: SurfaceBindings,
}

impl std::fmt::Debug for PixelEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl PixelEngine {
    /// Engine with the native `image`-crate loader.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let loader = Arc::new(NativeLoader::new(config.limits));
        Self::with_loader(config, loader)
    }

    /// Engine with a host-specific loader.
    pub fn with_loader(config: EngineConfig, loader: Arc<dyn ImageLoader>) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(RawImageCache::with_config(&config.cache)?);
        let producer = Producer::new(Arc::clone(&cache));
        let consumer = Consumer::new(Arc::clone(&cache));
        let scheduler = TransformScheduler::new(producer.clone(), config.worker_threads)?;
        debug!(
            target: "raw_image_cache::handle",
            capacity = config.cache.capacity,
            workers = scheduler.worker_count(),
            "engine ready"
        );
        Ok(Self {
            config,
            cache,
            loader,
            producer,
            consumer,
            scheduler,
            surfaces: SurfaceBindings::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RawImageCache> {
        &self.cache
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub fn scheduler(&self) -> &TransformScheduler {
        &self.scheduler
    }

    pub fn surfaces(&self) -> &SurfaceBindings {
        &self.surfaces
    }

    /// Load source bytes through the loader and publish them.
    pub fn load(&self, source: &[u8]) -> Result<Published> {
        let loaded = self.loader.load(source)?;
        Ok(self.producer.publish_loaded(loaded))
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Published> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            RawImageError::file_read_failed(path.to_string_lossy().to_string(), e)
        })?;
        self.load(&data)
    }

    /// Run `ops` on the calling thread and publish the result.
    pub fn apply(&self, source: &RawHandle, ops: &[Operation]) -> Result<RawHandle> {
        self.producer.publish_derived(source, ops)
    }

    /// Run `ops` on the worker pool; a newer submit for `target` supersedes this one.
    pub fn submit(&self, target: TargetId, source: RawHandle, ops: Vec<Operation>) -> TransformTicket {
        self.scheduler.submit(target, source, ops)
    }

    pub fn resolve(&self, handle: &RawHandle) -> Resolution {
        self.consumer.resolve(handle)
    }

    /// Explicit fallback after a miss: decode `encoded` and re-cache it under the handle.
    /// `encoded` must be the bytes the handle was signed over.
    pub fn rematerialize(&self, handle: &RawHandle, encoded: &[u8]) -> Result<Arc<RawImageBuffer>> {
        self.producer
            .rematerialize(self.loader.as_ref(), handle, encoded)
    }

    /// Resolve, re-materializing from `encoded` on a miss. A derived handle fails
    /// with `SignatureMismatch`; re-materialize its source and apply again.
    pub fn resolve_or_rematerialize(
        &self,
        handle: &RawHandle,
        encoded: &[u8],
    ) -> Result<Arc<RawImageBuffer>> {
        match self.resolve(handle) {
            Resolution::Hit(buffer) => Ok(buffer),
            Resolution::Miss(missed) => self.rematerialize(&missed, encoded),
        }
    }

    /// Encoded (PNG) fallback form of the pixels behind a handle.
    pub fn encode_png(&self, handle: &RawHandle) -> Result<Vec<u8>> {
        self.resolve(handle).into_result()?.encode_png()
    }

    /// Bind a surface to a handle, returning the previous binding.
    pub fn bind_surface(&self, surface: SurfaceId, handle: RawHandle) -> Option<RawHandle> {
        self.surfaces.bind(surface, handle)
    }

    /// Pixels currently shown on `surface`. An unbound surface is `Ok(None)`;
    /// a bound surface whose pixels were evicted is a `CacheMiss`.
    pub fn resolve_surface(&self, surface: SurfaceId) -> Result<Option<Arc<RawImageBuffer>>> {
        match self.surfaces.resolve(surface) {
            Some(handle) => self.resolve(&handle).into_result().map(Some),
            None => Ok(None),
        }
    }

    /// Drop a surface binding and supersede any transform targeting it.
    pub fn release_surface(&self, surface: SurfaceId) -> Option<RawHandle> {
        self.scheduler.forget(surface);
        self.surfaces.unbind(surface)
    }
}
