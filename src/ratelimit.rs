//! Per-client token-bucket rate limiter

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket per client key. A bucket holds `max_requests` tokens and
/// refills continuously over `window`.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_tokens: f64,
    refill_per_sec: f64,
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_tokens = f64::from(max_requests.max(1));
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_per_sec: max_tokens / window.as_secs_f64().max(0.001),
        }
    }

    /// Take one token for the given client, or report how long to wait
    pub fn check(&self, client_key: &str) -> Admission {
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();

        let bucket = buckets.entry(client_key.to_string()).or_insert(Bucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Admission::Allowed
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after = Duration::from_secs_f64(deficit / self.refill_per_sec);
            Admission::Limited { retry_after }
        }
    }
}
