//! Sliding-window rate limiter for outbound catalog requests.
//!
//! Each catalog client owns one limiter; every task sharing the client
//! shares its window.

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::metrics;

/// Snapshot of a limiter's window.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub max_requests: usize,
    pub window: Duration,
    /// Requests recorded inside the current window.
    pub used: usize,
    /// Time until the next request may be issued, if the window is full.
    pub next_available_in: Option<Duration>,
}

/// Bounds the number of requests issued within a trailing time window.
///
/// The timestamp window is guarded by an async mutex held across the whole
/// read-modify-write, including any wait, so concurrent callers can never
/// both observe spare capacity and overshoot the limit.
pub struct RateLimiter {
    provider: String,
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`.
    ///
    /// A `max_requests` of zero is treated as one.
    pub fn new(provider: impl Into<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            provider: provider.into(),
            max_requests: max_requests.max(1),
            window,
            requests: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
        }
    }

    /// Wait until one more request fits in the window, then record it.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        Self::prune(&mut requests, now, self.window);

        let mut waited = Duration::ZERO;
        if requests.len() >= self.max_requests {
            if let Some(oldest) = requests.front().copied() {
                let wait = (oldest + self.window).saturating_duration_since(now);
                // A racing release can leave nothing to wait for.
                if !wait.is_zero() {
                    warn!(
                        "{} rate limit reached, waiting {:.2}s",
                        self.provider,
                        wait.as_secs_f64()
                    );
                    metrics::RATE_LIMIT_WAITS
                        .with_label_values(&[&self.provider])
                        .inc();
                    metrics::RATE_LIMIT_WAIT_SECONDS
                        .with_label_values(&[&self.provider])
                        .observe(wait.as_secs_f64());
                    sleep(wait).await;
                    waited = wait;
                }
            }
            Self::prune(&mut requests, Instant::now(), self.window);
        }

        requests.push_back(Instant::now());
        debug!(
            "{} rate limiter: {}/{} requests in window",
            self.provider,
            requests.len(),
            self.max_requests
        );
        waited
    }

    /// Number of requests currently inside the window.
    pub async fn in_flight(&self) -> usize {
        let mut requests = self.requests.lock().await;
        Self::prune(&mut requests, Instant::now(), self.window);
        requests.len()
    }

    /// Current window status.
    pub async fn status(&self) -> RateLimitStatus {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        Self::prune(&mut requests, now, self.window);

        let next_available_in = if requests.len() >= self.max_requests {
            requests
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
        } else {
            None
        };

        RateLimitStatus {
            max_requests: self.max_requests,
            window: self.window,
            used: requests.len(),
            next_available_in,
        }
    }

    fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = requests.front() {
            if now.duration_since(*oldest) >= window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }
}
