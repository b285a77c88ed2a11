// src/engine/pool.rs
//
// Worker pool for transform jobs.
//
// Each engine owns one explicitly built rayon pool instead of sharing a global:
// tests and embedders get isolated instances, and dropping the engine shuts its
// workers down.
//
// Thread count:
// - `EngineConfig::worker_threads` when set (or RAW_IMAGE_WORKER_THREADS via from_env)
// - otherwise std::thread::available_parallelism(), which respects cgroup/CPU quota
// - MIN_WORKER_THREADS when detection fails

use crate::error::{RawImageError, Result};
use rayon::ThreadPool;
use tracing::debug;

/// At least one worker so jobs always make progress.
const MIN_WORKER_THREADS: usize = 1;

/// Upper bound on explicit thread requests.
pub const MAX_WORKER_THREADS: usize = 256;

/// Resolve the worker count for a pool.
pub fn worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.clamp(MIN_WORKER_THREADS, MAX_WORKER_THREADS),
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_WORKER_THREADS),
    }
}

/// Build the transform pool. Falls back to a single worker if the preferred
/// configuration cannot be created.
pub fn build_pool(requested: Option<usize>) -> Result<ThreadPool> {
    let num_threads = worker_count(requested);
    let builder = || {
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("raw-image-worker-{i}"))
    };
    match builder().num_threads(num_threads).build() {
        Ok(pool) => {
            debug!(target: "raw_image_cache::scheduler", num_threads, "built worker pool");
            Ok(pool)
        }
        Err(e) => {
            debug!(
                target: "raw_image_cache::scheduler",
                num_threads,
                error = %e,
                "falling back to a single worker"
            );
            builder()
                .num_threads(MIN_WORKER_THREADS)
                .build()
                .map_err(|fallback| {
                    RawImageError::internal_panic(format!(
                        "failed to create worker pool with {num_threads} threads ({e}); \
                         single-thread fallback also failed: {fallback}"
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_respects_request() {
        assert_eq!(worker_count(Some(3)), 3);
        assert_eq!(worker_count(Some(0)), 1);
        assert_eq!(worker_count(Some(10_000)), MAX_WORKER_THREADS);
        assert!(worker_count(None) >= 1);
    }

    #[test]
    fn test_build_pool_runs_work() {
        let pool = build_pool(Some(2)).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let sum: u32 = pool.install(|| (1..=10).sum());
        assert_eq!(sum, 55);
    }
}
