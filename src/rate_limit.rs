//! Per-user lookup cooldown
//!
//! Each user may trigger one lookup per cooldown window. Entries expire from
//! the cache once their cooldown has elapsed, so an expired entry and an
//! absent one behave the same.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request may proceed; the user's timestamp was recorded
    Allowed,
    /// The request arrived inside the cooldown window
    Limited {
        /// Time left until the next request is accepted
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Returns `true` for [`RateDecision::Allowed`]
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// In-memory store of the last accepted request per user
///
/// Cheap to clone; clones share the same underlying cache.
#[derive(Clone)]
pub struct RateLimiter {
    /// user_id -> instant of the last accepted request
    last_seen: Cache<i64, Instant>,
    cooldown: Duration,
    /// Rejected requests since startup
    rejected_count: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Creates a limiter with the given cooldown and capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use ipgeo_bot::rate_limit::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(Duration::from_secs(10), 10_000);
    /// assert_eq!(limiter.cooldown(), Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn new(cooldown: Duration, max_capacity: u64) -> Self {
        let last_seen = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown)
            .build();

        Self {
            last_seen,
            cooldown,
            rejected_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Checks the cooldown for `user_id` and records the request if accepted.
    ///
    /// A rejected request leaves the stored timestamp untouched. The
    /// check-and-record step is atomic per user.
    pub async fn check(&self, user_id: i64) -> RateDecision {
        let entry = self
            .last_seen
            .entry(user_id)
            .or_insert_with(async { Instant::now() })
            .await;

        if entry.is_fresh() {
            return RateDecision::Allowed;
        }

        let elapsed = entry.value().elapsed();
        if elapsed >= self.cooldown {
            // Expired but not yet evicted
            self.last_seen.insert(user_id, Instant::now()).await;
            return RateDecision::Allowed;
        }

        let count = self.rejected_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Rate limited user {user_id} (total rejected: {count})");

        RateDecision::Limited {
            retry_after: self.cooldown.saturating_sub(elapsed),
        }
    }

    /// Returns `true` and records the request when `user_id` is outside the cooldown
    pub async fn allow(&self, user_id: i64) -> bool {
        self.check(user_id).await.is_allowed()
    }

    /// Returns the configured cooldown duration
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns the total number of rejected requests
    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }
}
