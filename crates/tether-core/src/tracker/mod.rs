//! Reference-lifecycle tracker: weak observation plus deferred destruction
//!
//! [`ReferenceTracker`] guarantees at-most-once, eventually-exactly-once
//! destruction of every registered native resource whose managed proxy is
//! dropped. Proxies enqueue a notification when their last clone goes away;
//! a dedicated drain thread pops everything available, deduplicates the
//! handles, removes them from the handle table, and issues one batched
//! destroy call per wake. Only handles actually removed from the table reach
//! the destroy sink, which is what makes duplicate or stale notifications
//! harmless.

mod proxy;
mod table;

pub use proxy::{ManagedProxy, WeakObservation};
pub use table::HandleTable;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::sink::DestroySink;
use crate::{NativeHandle, TrackerError, TrackerResult};

use proxy::{Notice, ProxyCore};

const STATE_RUNNING: u8 = 0;
const STATE_STOPPED: u8 = 1;
const STATE_FAILED: u8 = 2;

/// Lifecycle state of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Accepting registrations; drain thread live
    Running,
    /// Shut down cleanly; everything queued or collectible was drained
    Stopped,
    /// The destroy sink failed catastrophically; destruction guarantees are void
    Failed,
}

/// Lifetime counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Successful registrations
    pub registered: u64,
    /// Handles passed to the destroy sink
    pub destroyed: u64,
    /// Handles whose individual destroy call failed; those native resources
    /// are orphaned
    pub orphaned: u64,
}

/// Tuning knobs for a tracker
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Name given to the drain thread
    pub thread_name: String,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            thread_name: "tether-drain".to_string(),
        }
    }
}

struct Shared {
    table: HandleTable,
    tx: Sender<Notice>,
    state: AtomicU8,
    registered: AtomicU64,
    destroyed: AtomicU64,
    orphaned: AtomicU64,
}

/// Tracks managed proxies and destroys their native resources exactly once.
///
/// `register` and `unregister` are safe to call concurrently from any number
/// of application threads; destruction runs on one dedicated drain thread
/// that never blocks application threads. Destruction order across unrelated
/// handles is unspecified and must not be relied on.
pub struct ReferenceTracker {
    shared: Arc<Shared>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl ReferenceTracker {
    /// Start a tracker with default options
    pub fn new(sink: Arc<dyn DestroySink>) -> Self {
        Self::with_options(sink, TrackerOptions::default())
    }

    /// Start a tracker, spawning its drain thread
    pub fn with_options(sink: Arc<dyn DestroySink>, options: TrackerOptions) -> Self {
        let (tx, rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            table: HandleTable::new(),
            tx,
            state: AtomicU8::new(STATE_RUNNING),
            registered: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            orphaned: AtomicU64::new(0),
        });

        let drain_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(options.thread_name)
            .spawn(move || drain_loop(drain_shared, rx, sink))
            .expect("Failed to spawn drain thread");

        Self {
            shared,
            drain: Mutex::new(Some(handle)),
        }
    }

    /// Register `handle`, returning the proxy whose lifetime now governs it.
    ///
    /// The native resource behind `handle` is destroyed, exactly once, some
    /// time after the last clone of the returned proxy is dropped.
    pub fn register(&self, handle: NativeHandle) -> TrackerResult<ManagedProxy> {
        if self.shared.state.load(Ordering::Acquire) != STATE_RUNNING {
            return Err(TrackerError::Shutdown);
        }

        let core = Arc::new(ProxyCore::new(handle, self.shared.tx.clone()));
        if let Err(err) = self.shared.table.insert(WeakObservation::new(&core)) {
            // A rejected proxy must never tear down the original registrant.
            core.defuse();
            return Err(err);
        }

        self.shared.registered.fetch_add(1, Ordering::Relaxed);
        Ok(ManagedProxy::new(core))
    }

    /// Explicit early release: stop tracking `handle` without destroying it.
    ///
    /// Used when a resource is torn down deterministically; releasing the
    /// native side is then the caller's responsibility via the destroy path.
    pub fn unregister(&self, handle: NativeHandle) -> TrackerResult<()> {
        self.shared
            .table
            .remove(handle)
            .map(|_| ())
            .ok_or(TrackerError::InvalidHandle(handle))
    }

    /// Number of handles currently tracked
    pub fn tracked(&self) -> usize {
        self.shared.table.len()
    }

    /// Current lifecycle state
    pub fn state(&self) -> TrackerState {
        match self.shared.state.load(Ordering::Acquire) {
            STATE_RUNNING => TrackerState::Running,
            STATE_STOPPED => TrackerState::Stopped,
            _ => TrackerState::Failed,
        }
    }

    /// Lifetime counters
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            registered: self.shared.registered.load(Ordering::Relaxed),
            destroyed: self.shared.destroyed.load(Ordering::Relaxed),
            orphaned: self.shared.orphaned.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting registrations, drain everything queued or immediately
    /// collectible, then join the drain thread. Idempotent.
    pub fn shutdown(&self) {
        // A failed tracker stays failed; otherwise running becomes stopped.
        let _ = self.shared.state.compare_exchange(
            STATE_RUNNING,
            STATE_STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        // The receiver is gone once the drain thread has exited; that is fine.
        let _ = self.shared.tx.send(Notice::Shutdown);

        if let Some(handle) = self.drain.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReferenceTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ReferenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTracker")
            .field("state", &self.state())
            .field("tracked", &self.tracked())
            .finish()
    }
}

/// Drain thread body: block until notified, then drain to exhaustion,
/// dedupe, and issue one batched destroy call.
fn drain_loop(shared: Arc<Shared>, rx: Receiver<Notice>, sink: Arc<dyn DestroySink>) {
    loop {
        let first = match rx.recv() {
            Ok(notice) => notice,
            // Every sender is gone: the tracker itself was dropped.
            Err(_) => return,
        };

        let mut batch: FxHashSet<NativeHandle> = FxHashSet::default();
        let mut closing = false;
        accumulate(first, &mut batch, &mut closing);
        while let Ok(notice) = rx.try_recv() {
            accumulate(notice, &mut batch, &mut closing);
        }

        if closing {
            // Pick up proxies that died without a processed notification.
            batch.extend(shared.table.collectible());
        }

        // Only handles actually removed from the table enter the destroy
        // batch; this is the exactly-once guard.
        let doomed: Vec<NativeHandle> = batch
            .into_iter()
            .filter(|&handle| shared.table.remove(handle).is_some())
            .collect();

        if !doomed.is_empty() && !destroy_batch(&shared, sink.as_ref(), &doomed) {
            return;
        }

        if closing {
            let remaining = shared.table.len();
            if remaining > 0 {
                tracing::debug!(remaining, "tracker stopped with live proxies left untracked");
            }
            return;
        }
    }
}

fn accumulate(notice: Notice, batch: &mut FxHashSet<NativeHandle>, closing: &mut bool) {
    match notice {
        Notice::Collected(handle) => {
            batch.insert(handle);
        }
        Notice::Shutdown => *closing = true,
    }
}

/// Issue one destroy call. Returns false on catastrophic sink failure, after
/// which the tracker is in its terminal failed state.
fn destroy_batch(shared: &Shared, sink: &dyn DestroySink, doomed: &[NativeHandle]) -> bool {
    match sink.destroy(doomed) {
        Ok(outcome) => {
            shared
                .destroyed
                .fetch_add(doomed.len() as u64, Ordering::Relaxed);
            for handle in &outcome.unknown {
                shared.orphaned.fetch_add(1, Ordering::Relaxed);
                tracing::error!(handle = %handle, "native destroy failed; resource is orphaned");
            }
            true
        }
        Err(failure) => {
            shared.state.store(STATE_FAILED, Ordering::Release);
            tracing::error!(
                error = %failure,
                "destroy sink failed; tracker halting, further destruction cannot be guaranteed"
            );
            false
        }
    }
}
