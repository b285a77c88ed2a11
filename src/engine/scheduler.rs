// src/engine/scheduler.rs
//
// Off-thread transforms with per-target supersede semantics.
//
// Every submit for a target bumps that target's generation. A job checks its
// generation before it starts and again right before it publishes; a job that
// is no longer current ends with `Superseded` and writes nothing to the cache.
// Requests for the same target never queue behind each other.

use crate::engine::common::run_with_panic_policy;
use crate::engine::handle::{Producer, RawHandle};
use crate::engine::pool::build_pool;
use crate::error::{RawImageError, Result};
use crate::ops::Operation;
use parking_lot::Mutex;
use rayon::ThreadPool;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::debug;

/// Host-assigned identifier of whatever an edit is for (a canvas, a layer, ...).
pub type TargetId = u64;

/// Generations come from one counter shared by all targets, so a number is never
/// reused even after a target is forgotten and submitted to again.
#[derive(Debug, Default)]
struct GenerationTable {
    next: u64,
    latest: HashMap<TargetId, u64>,
}

impl GenerationTable {
    fn bump(&mut self, target: TargetId) -> u64 {
        self.next += 1;
        self.latest.insert(target, self.next);
        self.next
    }
}

type Generations = Arc<Mutex<GenerationTable>>;

/// Pending result of a submitted transform.
#[derive(Debug)]
pub struct TransformTicket {
    target: TargetId,
    generation: u64,
    receiver: mpsc::Receiver<Result<RawHandle>>,
}

impl TransformTicket {
    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Block until the job finishes.
    pub fn wait(self) -> Result<RawHandle> {
        self.receiver.recv().unwrap_or_else(|_| {
            Err(RawImageError::internal_panic(
                "transform worker exited without reporting a result",
            ))
        })
    }

    /// Non-blocking poll; `None` while the job is still running.
    pub fn try_wait(&self) -> Option<Result<RawHandle>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(RawImageError::internal_panic(
                "transform worker exited without reporting a result",
            ))),
        }
    }
}

pub struct TransformScheduler {
    producer: Producer,
    pool: ThreadPool,
    generations: Generations,
}

impl std::fmt::Debug for TransformScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformScheduler")
            .field("workers", &self.pool.current_num_threads())
            .field("targets", &self.generations.lock().latest.len())
            .finish()
    }
}

fn is_current(generations: &Generations, target: TargetId, generation: u64) -> bool {
    generations.lock().latest.get(&target).copied() == Some(generation)
}

fn ensure_current(generations: &Generations, target: TargetId, generation: u64) -> Result<()> {
    if is_current(generations, target, generation) {
        Ok(())
    } else {
        debug!(
            target: "raw_image_cache::scheduler",
            target_id = target,
            generation,
            "dropping superseded transform"
        );
        Err(RawImageError::superseded(target))
    }
}

impl TransformScheduler {
    pub fn new(producer: Producer, worker_threads: Option<usize>) -> Result<Self> {
        Ok(Self {
            producer,
            pool: build_pool(worker_threads)?,
            generations: Arc::new(Mutex::new(GenerationTable::default())),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `ops` over `source` for `target`, superseding any in-flight request
    /// for the same target.
    pub fn submit(&self, target: TargetId, source: RawHandle, ops: Vec<Operation>) -> TransformTicket {
        let generation = self.generations.lock().bump(target);
        debug!(
            target: "raw_image_cache::scheduler",
            target_id = target,
            generation,
            ops = ops.len(),
            "submitted transform"
        );

        let (sender, receiver) = mpsc::channel();
        let producer = self.producer.clone();
        let generations = Arc::clone(&self.generations);
        self.pool.spawn(move || {
            let result = ensure_current(&generations, target, generation).and_then(|()| {
                run_with_panic_policy("transform", || {
                    producer.publish_derived_checked(&source, &ops, || {
                        ensure_current(&generations, target, generation)
                    })
                })
            });
            // The ticket may have been dropped; nobody is waiting then.
            let _ = sender.send(result);
        });

        TransformTicket {
            target,
            generation,
            receiver,
        }
    }

    /// Supersede whatever is in flight for `target` without submitting new work.
    pub fn cancel(&self, target: TargetId) {
        let mut generations = self.generations.lock();
        if generations.latest.contains_key(&target) {
            generations.bump(target);
        }
    }

    /// Forget a target once its surface is gone. In-flight jobs for it end as superseded.
    pub fn forget(&self, target: TargetId) {
        self.generations.lock().latest.remove(&target);
    }
}
