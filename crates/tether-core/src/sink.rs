//! Native-side destroy sink fed by the reference tracker's drain loop

use crate::NativeHandle;

/// Result of one batched destroy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyOutcome {
    /// Number of handles actually released
    pub destroyed: usize,

    /// Handles unknown to the sink (never allocated, or already destroyed).
    ///
    /// Each entry is an individual failure; the rest of the batch still
    /// completes. The corresponding native resources are orphaned.
    pub unknown: Vec<NativeHandle>,
}

impl DestroyOutcome {
    /// Outcome for a batch that released every handle
    pub fn complete(destroyed: usize) -> Self {
        Self {
            destroyed,
            unknown: Vec::new(),
        }
    }

    /// Check whether every handle in the batch was released
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty()
    }
}

/// Catastrophic failure of the destroy entry point itself.
///
/// Distinct from per-handle failures: once a sink reports this, no further
/// destruction can be guaranteed, and the tracker transitions to a terminal
/// failed state instead of leaking silently.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("destroy sink failure: {0}")]
pub struct SinkFailure(pub String);

/// Receiver of batched destroy calls from the reference tracker.
///
/// Implementations release native resources of any kind. The tracker
/// guarantees that batches are deduplicated before the call and that no
/// handle is passed twice across its lifetime of calls.
pub trait DestroySink: Send + Sync {
    /// Bulk-release every handle in `handles`, regardless of resource kind.
    ///
    /// An empty batch must be a no-op. Destruction is a cleanup operation
    /// with no meaningful partial-failure recovery; implementations must not
    /// expect retries.
    fn destroy(&self, handles: &[NativeHandle]) -> Result<DestroyOutcome, SinkFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_complete() {
        let outcome = DestroyOutcome::complete(3);
        assert_eq!(outcome.destroyed, 3);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_outcome_with_unknown() {
        let outcome = DestroyOutcome {
            destroyed: 1,
            unknown: vec![NativeHandle::new(42)],
        };
        assert!(!outcome.is_clean());
    }
}
