// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{RawImageError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Run `f`, turning a panic into `InternalPanic` instead of unwinding into the caller.
///
/// Used around codec calls and transform jobs: a bug in one job must not take
/// down the worker thread or poison shared state.
pub fn run_with_panic_policy<T>(context: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(target: "raw_image_cache::panic", context, %message, "caught panic");
            Err(RawImageError::internal_panic(format!("{context}: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
