use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use std::time::Duration;

type SpecificGovernorRateLimiter =
    GovernorRateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

/// Enforces a minimum period between consecutive requests to one provider.
/// Each provider gets its own limiter, so a slow region never throttles the
/// others. The delay is a politeness policy, not a correctness requirement,
/// which is why [`RateLimiter::disabled`] exists for tests.
pub struct RateLimiter {
    between_req: Option<SpecificGovernorRateLimiter>,
}

impl RateLimiter {
    pub fn new(min_period: Duration) -> Self {
        // No two requests closer than min_period. A zero period yields no
        // quota at all, i.e. no throttling.
        let between_req = Quota::with_period(min_period).map(GovernorRateLimiter::direct);
        RateLimiter { between_req }
    }

    pub fn disabled() -> Self {
        RateLimiter { between_req: None }
    }

    pub async fn wait_until_ready(&self) {
        if let Some(limiter) = &self.between_req {
            // min_period has passed since the last time we called this.
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn disabled_limiter_never_waits() {
        let limiter = RateLimiter::disabled();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait_until_ready().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn zero_period_means_disabled() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait_until_ready().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn limiter_spaces_out_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        // First call is free, the next two each wait out the period.
        for _ in 0..3 {
            limiter.wait_until_ready().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
