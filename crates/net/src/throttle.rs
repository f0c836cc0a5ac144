//! Shared transfer-rate cap

use std::num::NonZeroU64;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Pauses shorter than this are carried as debt instead of slept
const MINIMUM_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct Bucket {
    /// Bytes that may still pass without waiting; negative means debt
    available: f64,
    last_refill: Instant,
}

/// Token-bucket limiter shared by every concurrent transfer.
///
/// The configured rate is per worker; the bucket holds `rate × workers`
/// so concurrent transfers split the total proportionally.
#[derive(Debug)]
pub struct RateLimiter {
    bytes_per_second: NonZeroU64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter from a per-worker rate and the number of workers
    #[must_use]
    pub fn new(per_worker: NonZeroU64, workers: usize) -> Self {
        let workers = u64::try_from(workers)
            .ok()
            .and_then(NonZeroU64::new)
            .unwrap_or(NonZeroU64::MIN);
        let total = per_worker.saturating_mul(workers);
        Self {
            bytes_per_second: total,
            bucket: Mutex::new(Bucket {
                available: 0.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Build a limiter when a cap is configured
    #[must_use]
    pub fn from_rate(per_worker: Option<u64>, workers: usize) -> Option<Self> {
        per_worker
            .and_then(NonZeroU64::new)
            .map(|rate| Self::new(rate, workers))
    }

    #[must_use]
    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_second.get()
    }

    /// Account for `bytes` just transferred, sleeping if the bucket ran dry
    pub async fn consume(&self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let wait = {
            let mut bucket = self.bucket.lock().await;
            // Rates beyond 2^53 bytes/s are not meaningful
            #[allow(clippy::cast_precision_loss)]
            let rate = self.bytes_per_second.get() as f64;
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.available = (bucket.available + elapsed * rate).min(rate);
            bucket.last_refill = now;
            #[allow(clippy::cast_precision_loss)]
            {
                bucket.available -= bytes as f64;
            }
            if bucket.available < 0.0 {
                Duration::from_secs_f64(-bucket.available / rate)
            } else {
                Duration::ZERO
            }
        };
        if wait >= MINIMUM_SLEEP {
            tokio::time::sleep(wait).await;
        }
    }
}
