//! Token-bucket rate limiting for outbound requests
//!
//! The bucket holds at most `burst` tokens and refills continuously at
//! `requests_per_second`. Over any window of length T at most
//! `burst + requests_per_second * T` acquisitions complete.

use crate::ConfigError;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Async token-bucket limiter shared by every fetch
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<Bucket>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// Creates a full bucket
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Refill rate, must be positive and finite
    /// * `burst` - Bucket capacity, must be at least 1
    pub fn new(requests_per_second: f64, burst: u32) -> Result<Self, ConfigError> {
        if !(requests_per_second > 0.0) || !requests_per_second.is_finite() {
            return Err(ConfigError::Validation(format!(
                "rate limit must be a positive number, got {}",
                requests_per_second
            )));
        }
        if burst == 0 {
            return Err(ConfigError::Validation(
                "rate limit burst must be >= 1".to_string(),
            ));
        }

        let capacity = f64::from(burst);
        Ok(Self {
            state: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: requests_per_second,
        })
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;
    }

    /// Waits until a token is available and consumes it
    ///
    /// The wait happens inside the critical section, so concurrent callers
    /// are served one at a time in lock order.
    pub async fn acquire(&self) {
        let mut bucket = self.state.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let deficit = (1.0 - bucket.tokens) / self.refill_rate;
        sleep(Duration::try_from_secs_f64(deficit).unwrap_or(Duration::MAX)).await;

        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }

    /// Consumes a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        let Ok(mut bucket) = self.state.try_lock() else {
            return false;
        };
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count, for diagnostics
    pub async fn available(&self) -> f64 {
        let mut bucket = self.state.lock().await;
        self.refill(&mut bucket);
        bucket.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}
