use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket pacing outbound exchange requests.
/// Waiting is the only behaviour; a request is never dropped or retried here.
#[derive(Clone)]
pub struct TokenBucket {
    capacity: f64,
    fill_rate_per_sec: f64,
    state: Arc<Mutex<Bucket>>,
}

impl TokenBucket {
    /// Capacity is at least one token.
    pub fn new(capacity: usize, fill_rate_per_sec: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity: capacity as f64,
            fill_rate_per_sec,
            state: Arc::new(Mutex::new(Bucket {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Take one token if available, otherwise report how long until one is.
    fn take_or_wait_time(&self) -> Option<Duration> {
        let mut bucket = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.fill_rate_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else if self.fill_rate_per_sec <= 0.0 {
            Some(Duration::from_millis(50))
        } else {
            let missing = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(missing / self.fill_rate_per_sec))
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.take_or_wait_time().is_none()
    }

    /// Acquire a token, sleeping until the bucket refills if necessary.
    pub async fn acquire(&self) {
        while let Some(wait) = self.take_or_wait_time() {
            sleep(wait).await;
        }
    }
}
