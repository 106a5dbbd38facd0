//! Call pacing.
//!
//! Third-party APIs (the odds provider, Telegram) are called strictly one
//! at a time with a minimum gap between calls. The gap is a policy object
//! so call sites never sleep on their own.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Gatekeeper awaited before every outbound call.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait until the next call is allowed, then claim the slot.
    async fn ready(&self);
}

/// Enforces a fixed minimum interval between consecutive calls.
///
/// The first call passes immediately. Not adaptive: a 429 from the remote
/// side does not widen the interval.
pub struct MinInterval {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// A pacer that never waits.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for MinInterval {
    async fn ready(&self) {
        let mut last = self.last.lock().await;
        if let Some(due) = last.and_then(|prev| prev.checked_add(self.interval)) {
            if due > Instant::now() {
                trace!(wait_ms = (due - Instant::now()).as_millis() as u64, "Pacing call");
                tokio::time::sleep_until(due).await;
            }
        }
        *last = Some(Instant::now());
    }
}
