// src/engine/surfaces.rs
//
// Explicit per-canvas association table. Bindings live until unbound or cleared;
// nothing is attached to the surfaces themselves.

use crate::engine::handle::RawHandle;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Host-assigned canvas identifier.
pub type SurfaceId = u64;

#[derive(Debug, Default)]
pub struct SurfaceBindings {
    bindings: Mutex<HashMap<SurfaceId, RawHandle>>,
}

impl SurfaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `handle` with `surface`, returning the previous binding.
    pub fn bind(&self, surface: SurfaceId, handle: RawHandle) -> Option<RawHandle> {
        self.bindings.lock().insert(surface, handle)
    }

    pub fn unbind(&self, surface: SurfaceId) -> Option<RawHandle> {
        self.bindings.lock().remove(&surface)
    }

    pub fn resolve(&self, surface: SurfaceId) -> Option<RawHandle> {
        self.bindings.lock().get(&surface).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.bindings.lock().clear();
    }
}
