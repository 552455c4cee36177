//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Create a limiter allowing `burst` events per `window`, replenished evenly
pub fn create_window_limiter(burst: u32, window: Duration) -> Arc<Limiter> {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let period = window / burst.get();
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct SessionRateLimiter {
    input_limiter: Arc<Limiter>,
    chat_limiter: Arc<Limiter>,
}

impl SessionRateLimiter {
    pub fn new(input_per_second: u32, chat_burst: u32, chat_window: Duration) -> Self {
        Self {
            input_limiter: create_limiter(input_per_second),
            chat_limiter: create_window_limiter(chat_burst, chat_window),
        }
    }

    /// Check if an inbound frame is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Check if a chat message is allowed (returns true if allowed)
    pub fn check_chat(&self) -> bool {
        self.chat_limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_burst_then_dropped() {
        let limiter = SessionRateLimiter::new(60, 3, Duration::from_secs(10));
        assert!(limiter.check_chat());
        assert!(limiter.check_chat());
        assert!(limiter.check_chat());
        assert!(!limiter.check_chat());
    }

    #[test]
    fn test_zero_burst_still_allows_one() {
        let limiter = create_window_limiter(0, Duration::from_secs(10));
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
