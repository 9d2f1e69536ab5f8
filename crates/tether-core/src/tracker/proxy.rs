//! Managed proxies and the weak observations that watch them

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::channel::Sender;

use crate::NativeHandle;

/// Queue message from proxies to the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notice {
    /// A proxy for this handle was collected
    Collected(NativeHandle),
    /// Stop accepting work, drain whatever is pending, and exit
    Shutdown,
}

/// Owner-side token for one registered native resource.
///
/// A proxy references exactly one handle for its entire lifetime and never
/// changes it. Clones share the same underlying registration; when the last
/// clone is dropped, the handle is enqueued for destruction on the tracker's
/// drain thread.
#[derive(Debug, Clone)]
pub struct ManagedProxy {
    core: Arc<ProxyCore>,
}

impl ManagedProxy {
    pub(crate) fn new(core: Arc<ProxyCore>) -> Self {
        Self { core }
    }

    /// The native handle this proxy keeps alive
    pub fn handle(&self) -> NativeHandle {
        self.core.handle
    }
}

#[derive(Debug)]
pub(crate) struct ProxyCore {
    handle: NativeHandle,
    queue: Sender<Notice>,
    /// Cleared when registration fails, so a rejected proxy can never
    /// enqueue a notification for a handle owned by someone else.
    armed: AtomicBool,
}

impl ProxyCore {
    pub(crate) fn new(handle: NativeHandle, queue: Sender<Notice>) -> Self {
        Self {
            handle,
            queue,
            armed: AtomicBool::new(true),
        }
    }

    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub(crate) fn defuse(&self) {
        self.armed.store(false, Ordering::Release);
    }
}

impl Drop for ProxyCore {
    fn drop(&mut self) {
        if self.armed.load(Ordering::Acquire) {
            // The tracker may already be gone; then there is nothing left
            // to notify.
            let _ = self.queue.send(Notice::Collected(self.handle));
        }
    }
}

/// Deferred-notification weak reference to one managed proxy.
///
/// Does not keep the proxy alive. Carries the handle by value: by the time
/// the notification is processed, the proxy object itself may already be
/// gone.
#[derive(Debug, Clone)]
pub struct WeakObservation {
    target: Weak<ProxyCore>,
    handle: NativeHandle,
}

impl WeakObservation {
    pub(crate) fn new(core: &Arc<ProxyCore>) -> Self {
        Self {
            target: Arc::downgrade(core),
            handle: core.handle(),
        }
    }

    /// The handle carried by this observation
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Check whether the observed proxy has already been collected
    pub fn is_collectible(&self) -> bool {
        self.target.strong_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    #[test]
    fn test_observation_does_not_keep_proxy_alive() {
        let (tx, rx) = channel::unbounded();
        let core = Arc::new(ProxyCore::new(NativeHandle::new(1), tx));
        let observation = WeakObservation::new(&core);
        assert!(!observation.is_collectible());

        drop(core);
        assert!(observation.is_collectible());
        assert_eq!(observation.handle(), NativeHandle::new(1));
        assert_eq!(rx.try_recv(), Ok(Notice::Collected(NativeHandle::new(1))));
    }

    #[test]
    fn test_last_clone_notifies_once() {
        let (tx, rx) = channel::unbounded();
        let proxy = ManagedProxy::new(Arc::new(ProxyCore::new(NativeHandle::new(2), tx)));
        let clone = proxy.clone();

        drop(proxy);
        assert!(rx.try_recv().is_err());

        drop(clone);
        assert_eq!(rx.try_recv(), Ok(Notice::Collected(NativeHandle::new(2))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_defused_proxy_stays_silent() {
        let (tx, rx) = channel::unbounded();
        let core = Arc::new(ProxyCore::new(NativeHandle::new(3), tx));
        core.defuse();
        drop(core);
        assert!(rx.try_recv().is_err());
    }
}
