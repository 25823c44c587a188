//! Signal-of-Stop: a stop flag the decode loop can race in `select!`.
//!
//! The Ctrl-C handler holds one clone and the scan loop another. Once
//! raised the signal stays raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default, Clone)]
pub struct SignalOfStop {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    wakeup: Notify,
}

impl SignalOfStop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every pending [`wait`](Self::wait).
    pub fn cancel(&self) {
        self.inner.raised.store(true, Ordering::Release);
        self.inner.wakeup.notify_waiters();
    }

    pub fn cancelled(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    /// Resolve once the signal is raised.
    pub async fn wait(&self) {
        // Register before checking the flag so a concurrent cancel is not lost.
        let notified = self.inner.wakeup.notified();
        if !self.cancelled() {
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clone_wakes_on_cancel() {
        let sos = SignalOfStop::new();
        let waiter = sos.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sos.cancelled());
        sos.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_already_raised_resolves_immediately() {
        let sos = SignalOfStop::new();
        sos.cancel();
        sos.cancel();
        tokio::time::timeout(Duration::from_millis(100), sos.wait())
            .await
            .expect("already raised");
        assert!(sos.clone().cancelled());
    }
}
