//! Input Rate Limiting
//!
//! Admits at most one input per connection per fixed interval. Rejected
//! inputs are dropped, never queued: the next admitted input simply
//! overwrites the paddle position.

use std::hash::Hash;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter};

/// Default minimum spacing between admitted inputs (~60 Hz ceiling).
pub const DEFAULT_INPUT_INTERVAL: Duration = Duration::from_millis(16);

/// Keyed limiter type alias
pub type KeyedLimiter<K, C> = RateLimiter<K, HashMapStateStore<K>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Build the one-per-interval quota. A zero interval falls back to the default.
fn input_quota(interval: Duration) -> Quota {
    Quota::with_period(interval)
        .or_else(|| Quota::with_period(DEFAULT_INPUT_INTERVAL))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
}

/// Per-key input gate, one admission per interval with a burst of one.
pub struct InputRateLimiter<K, C = DefaultClock>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    limiter: KeyedLimiter<K, C>,
}

impl<K: Hash + Eq + Clone> InputRateLimiter<K> {
    /// Create a limiter admitting one input per `interval` per key.
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, &DefaultClock::default())
    }
}

impl<K, C> InputRateLimiter<K, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Create a limiter driven by `clock`.
    pub fn with_clock(interval: Duration, clock: &C) -> Self {
        Self {
            limiter: RateLimiter::hashmap_with_clock(input_quota(interval), clock),
        }
    }

    /// Admit an input arriving now.
    ///
    /// Rejections don't consume the quota, so a rejected burst never pushes
    /// the next admission further out.
    pub fn admit(&self, key: &K) -> bool {
        self.limiter.check_key(key).is_ok()
    }

    /// Drop keys whose window has fully elapsed.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of tracked keys.
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl<K: Hash + Eq + Clone> Default for InputRateLimiter<K> {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_INTERVAL)
    }
}
