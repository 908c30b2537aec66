//! Time-windowed cache of the last health-check outcome.
//!
//! # Responsibilities
//! - Hold exactly one outcome plus a validity flag
//! - Invalidate the flag on a recurring timer
//! - Revalidate only when a fresh outcome is stored
//!
//! # Design Decisions
//! - Flag and outcome share one `AtomicU8`, so a store and a tick are each
//!   a single atomic operation and a stale flag always wins
//! - Reads of the outcome are unconditional; a request that already chose
//!   the cache still gets a value if a tick lands before it reads
//! - The timer is a tokio task owned by the holder and aborted on drop

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::outcome::{HealthCheckOutcome, HealthStatus};
use crate::observability::metrics;

const VALID: u8 = 0b001;
const UNHEALTHY: u8 = 0b010;
const DEGRADED: u8 = 0b100;

/// Packed flag + outcome.
#[derive(Debug, Default)]
struct CachedResponse {
    state: AtomicU8,
}

impl CachedResponse {
    fn encode(outcome: HealthCheckOutcome) -> u8 {
        let mut bits = 0;
        if outcome.status == HealthStatus::Unhealthy {
            bits |= UNHEALTHY;
        }
        if outcome.degraded {
            bits |= DEGRADED;
        }
        bits
    }

    fn decode(bits: u8) -> HealthCheckOutcome {
        HealthCheckOutcome {
            status: if bits & UNHEALTHY != 0 {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Healthy
            },
            degraded: bits & DEGRADED != 0,
        }
    }

    fn is_valid(&self) -> bool {
        self.state.load(Ordering::Acquire) & VALID != 0
    }

    fn store(&self, outcome: HealthCheckOutcome) {
        self.state
            .store(Self::encode(outcome) | VALID, Ordering::Release);
    }

    fn load(&self) -> HealthCheckOutcome {
        Self::decode(self.state.load(Ordering::Acquire))
    }

    fn invalidate(&self) {
        self.state.fetch_and(!VALID, Ordering::AcqRel);
    }
}

/// Shared cache of the last health-check outcome.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct HealthCheckCacheManager {
    slot: Arc<CachedResponse>,
    timeout: Duration,
    timer: JoinHandle<()>,
}

impl HealthCheckCacheManager {
    /// Create a cache whose entries stay valid for at most `timeout`.
    ///
    /// The cache starts stale; the first invalidation happens immediately.
    pub fn new(timeout: Duration) -> Self {
        let slot = Arc::new(CachedResponse::default());
        slot.invalidate();

        let timer = tokio::spawn(run_timer(slot.clone(), timeout));

        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Health check cache armed");

        Self {
            slot,
            timeout,
            timer,
        }
    }

    /// Whether the stored outcome may be reused.
    pub fn use_cached_response(&self) -> bool {
        self.slot.is_valid()
    }

    /// Store a fresh outcome and mark it reusable until the next tick.
    pub fn set_cached_response(&self, outcome: HealthCheckOutcome) {
        self.slot.store(outcome);
        metrics::record_cache_event("store");
    }

    /// The stored outcome, regardless of validity.
    pub fn cached_response(&self) -> HealthCheckOutcome {
        self.slot.load()
    }

    /// Length of the cache window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(test)]
    pub(crate) fn on_timer(&self) {
        self.slot.invalidate();
    }
}

impl Drop for HealthCheckCacheManager {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

async fn run_timer(slot: Arc<CachedResponse>, timeout: Duration) {
    let mut ticker = time::interval_at(Instant::now() + timeout, timeout);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        slot.invalidate();
        metrics::record_cache_event("invalidate");
    }
}
