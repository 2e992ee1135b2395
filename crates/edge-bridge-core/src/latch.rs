//! One-shot readiness synchronization between guest startup and the bridge.
//!
//! The guest's entrypoint signals readiness exactly once, from inside a
//! host import; the bridge awaits that signal before dispatching the
//! event. [`ReadinessLatch::new`] produces the two halves:
//!
//! - [`ReadinessSignal`]: cloneable trigger, held by the import closure.
//!   Signaling is idempotent; only the first call fires the latch.
//! - [`ReadinessLatch`]: the single awaiter, held by the bridge. The wait
//!   is bounded: a guest that never signals fails the event with
//!   [`BridgeError::ReadinessTimeout`] instead of hanging it forever.
//!
//! Entrypoint completion and readiness are distinct: the entrypoint may
//! return before or after signaling, and the latch alone gates dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use edge_bridge_common::BridgeError;

/// Trigger half of the readiness latch.
///
/// Cloneable so it can be captured by the readiness import closure.
/// All clones share the same one-shot state.
#[derive(Clone)]
pub struct ReadinessSignal {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReadinessSignal {
    /// Fire the latch.
    ///
    /// Returns `true` if this call transitioned the latch to ready;
    /// `false` if it had already been signaled (the call is a no-op).
    pub fn signal(&self) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                // The receiver may already be gone; the transition still counts
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the latch has been signaled.
    pub fn is_signaled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl std::fmt::Debug for ReadinessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessSignal")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

/// Awaiter half of the readiness latch.
#[derive(Debug)]
pub struct ReadinessLatch {
    rx: oneshot::Receiver<()>,
}

impl ReadinessLatch {
    /// Create a fresh latch and its trigger half.
    pub fn new() -> (Self, ReadinessSignal) {
        let (tx, rx) = oneshot::channel();
        let signal = ReadinessSignal {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (Self { rx }, signal)
    }

    /// Wait for the guest to signal readiness, up to `deadline`.
    ///
    /// Resolves immediately if the signal already fired. Consumes the
    /// latch: readiness is awaited at most once per event.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ReadinessTimeout`] if the deadline expires,
    /// or if every signal handle was dropped unfired (the guest can no
    /// longer become ready).
    pub async fn wait(self, deadline: Duration) -> Result<(), BridgeError> {
        let start = Instant::now();

        match tokio::time::timeout(deadline, self.rx).await {
            Ok(Ok(())) => Ok(()),
            // Sender dropped without signaling or deadline expired
            Ok(Err(_)) | Err(_) => Err(BridgeError::ReadinessTimeout {
                waited_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_then_wait_resolves_immediately() {
        let (latch, signal) = ReadinessLatch::new();

        assert!(signal.signal());
        assert!(signal.is_signaled());

        // Already-signaled latch must not wait out the deadline
        let start = Instant::now();
        latch.wait(Duration::from_secs(5)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_then_signal() {
        let (latch, signal) = ReadinessLatch::new();

        let waiter = tokio::spawn(async move { latch.wait(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(signal.signal());

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_signal_is_noop() {
        let (latch, signal) = ReadinessLatch::new();

        assert!(signal.signal());
        assert!(!signal.signal());
        assert!(!signal.clone().signal());

        latch.wait(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_when_never_signaled() {
        let (latch, _signal) = ReadinessLatch::new();

        let result = latch.wait(Duration::from_millis(50)).await;
        match result {
            Err(BridgeError::ReadinessTimeout { waited_ms }) => {
                assert!(waited_ms >= 40, "waited only {waited_ms}ms");
            }
            other => panic!("expected ReadinessTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_signal_fails_fast() {
        let (latch, signal) = ReadinessLatch::new();
        drop(signal);

        // No point running out the full deadline once readiness is impossible
        let start = Instant::now();
        let result = latch.wait(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(BridgeError::ReadinessTimeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (_latch, signal) = ReadinessLatch::new();
        let clone = signal.clone();

        assert!(!clone.is_signaled());
        assert!(signal.signal());
        assert!(clone.is_signaled());
    }
}
