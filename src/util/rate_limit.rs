//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max inbound frames per second on one game connection (inputs, acks, pings)
pub const INPUT_RATE_LIMIT: u32 = 60;

/// Max join/cancel attempts per second on one connection
pub const MATCHMAKING_RATE_LIMIT: u32 = 5;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
    matchmaking_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(INPUT_RATE_LIMIT),
            matchmaking_limiter: create_limiter(MATCHMAKING_RATE_LIMIT),
        }
    }

    /// Check if an in-session message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Check if a queue operation is allowed
    pub fn check_matchmaking(&self) -> bool {
        self.matchmaking_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchmaking_burst_is_capped() {
        let limiter = ConnectionRateLimiter::new();
        let allowed = (0..20).filter(|_| limiter.check_matchmaking()).count();
        assert_eq!(allowed, MATCHMAKING_RATE_LIMIT as usize);
    }
}
