//! Stoppable poll loops.
//!
//! Background refresh and host readiness checks both run "do X every N
//! millis until told to stop" loops. [`PollTask`] guarantees that `clear()`
//! prevents any further iteration, including one already scheduled but not
//! yet fired.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{AppError, Result};

/// A recurring background task driven by a timer.
pub struct PollTask {
    cleared: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Run `op` every `interval`, starting one interval from now.
    pub fn spawn<F, Fut>(interval: Duration, mut op: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cleared = Arc::new(AtomicBool::new(false));
        let flag = cleared.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                // re-check after the sleep so a clear() that landed while the
                // timer was pending cancels the already-scheduled iteration
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                op().await;
            }
        });
        Self { cleared, handle }
    }

    /// Stop the loop. Idempotent.
    pub fn clear(&self) {
        self.cleared.store(true, Ordering::Relaxed);
        self.handle.abort();
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::Relaxed)
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Poll `pred` every `interval` until it reports ready, erroring out after
/// `timeout`.
pub async fn poll_until<F, Fut>(interval: Duration, timeout: Duration, mut pred: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if pred().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::Transfer("readiness poll timed out".into()));
        }
        tokio::time::sleep(interval).await;
    }
}
