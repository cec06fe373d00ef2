//! Rate limiting middleware.
//!
//! Exact sliding-window admission control: each client key carries a log of
//! request timestamps inside the trailing window. Precise, at the cost of
//! O(requests-in-window) memory per key - fine at back-office traffic.

use crate::auth::middleware::AuthError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Admission refused: the key already spent its window budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited;

impl std::fmt::Display for RateLimited {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rate limit exceeded")
    }
}

impl std::error::Error for RateLimited {}

/// Sliding-window rate limiter keyed by caller-supplied strings.
///
/// Keyed by client IP in the HTTP middleware, but any key works (per
/// account, per route). Pruning happens lazily on the next admission for a
/// key; keys themselves are only dropped by an explicit `sweep`.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit or reject a request for `key` at the current instant.
    pub fn admit(&self, key: &str) -> Result<(), RateLimited> {
        self.admit_at(key, Instant::now())
    }

    /// Admit or reject at an explicit instant.
    ///
    /// The whole read-prune-decide-write runs under one lock, so two
    /// concurrent requests can never both take the last remaining slot.
    pub fn admit_at(&self, key: &str, now: Instant) -> Result<(), RateLimited> {
        let mut state = self.state.lock();
        let log = state.entry(key.to_string()).or_default();

        // Entries strictly older than the window start are discarded; the
        // pruned log is what gets stored back either way.
        if let Some(window_start) = now.checked_sub(self.window) {
            log.retain(|&t| t >= window_start);
        }

        if log.len() >= self.max_requests {
            return Err(RateLimited);
        }

        log.push(now);
        Ok(())
    }

    /// Drop keys whose windows have fully drained.
    ///
    /// The limiter otherwise keeps every key it has ever seen; call this
    /// from a maintenance path to bound memory.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) {
        let window = self.window;
        let mut state = self.state.lock();

        state.retain(|_, log| {
            if let Some(window_start) = now.checked_sub(window) {
                log.retain(|&t| t >= window_start);
            }
            !log.is_empty()
        });
    }

    /// Number of distinct keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.state.lock().len()
    }
}

/// Rate limiting middleware function, keyed by client IP.
pub async fn rate_limit(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if limiter.admit(&addr.ip().to_string()).is_err() {
        warn!(client_ip = %addr.ip(), "Rate limit exceeded");
        return Err(AuthError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sliding_window_admission() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let base = Instant::now();

        // 3 admissions at t=0,1,2 succeed
        assert!(limiter.admit_at("client", base).is_ok());
        assert!(limiter
            .admit_at("client", base + Duration::from_secs(1))
            .is_ok());
        assert!(limiter
            .admit_at("client", base + Duration::from_secs(2))
            .is_ok());

        // 4th at t=3 is rejected
        assert_eq!(
            limiter.admit_at("client", base + Duration::from_secs(3)),
            Err(RateLimited)
        );

        // At t=61 the window has slid past the first admission
        assert!(limiter
            .admit_at("client", base + Duration::from_secs(61))
            .is_ok());
    }

    #[test]
    fn test_rejection_does_not_consume_a_slot() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let base = Instant::now();

        assert!(limiter.admit_at("client", base).is_ok());

        // Rejected attempts are not recorded: once the original admission
        // leaves the window, the next request goes straight through.
        for s in 1..5 {
            assert!(limiter
                .admit_at("client", base + Duration::from_secs(s))
                .is_err());
        }
        assert!(limiter
            .admit_at("client", base + Duration::from_secs(61))
            .is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let base = Instant::now();

        assert!(limiter.admit_at("10.0.0.1", base).is_ok());
        assert!(limiter.admit_at("10.0.0.2", base).is_ok());
        assert!(limiter.admit_at("10.0.0.1", base).is_err());
    }

    #[test]
    fn test_concurrent_admissions_single_slot() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.admit_at("shared", now).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        // Exactly one winner, never zero, never two
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_sweep_drops_drained_keys() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let base = Instant::now();

        limiter.admit_at("old", base).unwrap();
        limiter
            .admit_at("fresh", base + Duration::from_secs(100))
            .unwrap();
        assert_eq!(limiter.tracked_keys(), 2);

        // "old"'s only entry fell out of the window by t=100
        limiter.sweep_at(base + Duration::from_secs(100));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
