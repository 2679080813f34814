//! Timers and the per-device semaphore (C9, §4.9).
//!
//! The C++ original's timer awaiter destructor conditionally leaks a coroutine
//! handle that hasn't completed (`original_source/common/timer.hpp`); here the
//! timer just owns a `tokio::task::JoinHandle`, so `Drop` unconditionally aborts
//! it and there is nothing to leak (recorded in DESIGN.md).

use std::time::Duration;

use tokio::sync::{oneshot, Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;

/// One-shot timer awaitable (§4.9 "Timer awaitable").
///
/// `arm` schedules expiry at `now + duration`; `wait` suspends until either expiry
/// or an explicit `stop()`. Dropping a still-armed `Timer` cancels its event
/// source, matching "Destruction cancels the event source."
pub struct Timer {
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<bool>>,
    expired: bool,
}

impl Timer {
    /// Arms a timer that fires after `duration` unless stopped first.
    pub fn arm(duration: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let _ = done_tx.send(true);
                }
                _ = stop_rx => {
                    let _ = done_tx.send(false);
                }
            }
        });
        Self {
            handle: Some(handle),
            stop_tx: Some(stop_tx),
            done_rx: Some(done_rx),
            expired: false,
        }
    }

    /// Waits for expiry or an explicit stop; returns whether it expired due to time.
    pub async fn wait(&mut self) -> bool {
        if let Some(done_rx) = self.done_rx.take() {
            self.expired = done_rx.await.unwrap_or(false);
        }
        self.expired
    }

    /// Whether completion (if any) was due to time rather than an explicit stop.
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Cancels the timer before it fires.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Binary per-device semaphore serializing long-running commands (§4.9, §5
/// "Invariants... at most one long-running command outstanding per device").
pub struct DeviceSemaphore {
    inner: Semaphore,
}

impl DeviceSemaphore {
    pub fn new() -> Self {
        Self {
            inner: Semaphore::new(1),
        }
    }

    /// Suspends until the semaphore is free, then holds it until the returned
    /// guard is dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.inner
            .acquire()
            .await
            .expect("device semaphore is never closed")
    }

    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        self.inner.try_acquire().ok()
    }
}

impl Default for DeviceSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timer_reports_expired_on_timeout() {
        let mut timer = Timer::arm(Duration::from_millis(5));
        assert!(timer.wait().await);
        assert!(timer.expired());
    }

    #[tokio::test]
    async fn timer_reports_not_expired_on_explicit_stop() {
        let mut timer = Timer::arm(Duration::from_secs(10));
        timer.stop();
        assert!(!timer.wait().await);
    }

    #[tokio::test]
    async fn device_semaphore_serializes_acquirers() {
        let sem = DeviceSemaphore::new();
        let guard = sem.acquire().await;
        assert!(sem.try_acquire().is_none());
        drop(guard);
        assert!(sem.try_acquire().is_some());
    }
}
