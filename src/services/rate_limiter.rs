//! Rate limiter for login attempts
//!
//! Counts failed logins per email address inside a sliding window.
//! An email with `MAX_FAILED_ATTEMPTS` failures in the last
//! `WINDOW_MINUTES` minutes is refused until the oldest failure ages out.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Failures allowed inside one window
pub const MAX_FAILED_ATTEMPTS: usize = 5;

/// Window length in minutes
pub const WINDOW_MINUTES: i64 = 15;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by normalized email
    email_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    /// Create a new rate limiter with the default limits
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILED_ATTEMPTS, Duration::minutes(WINDOW_MINUTES))
    }

    pub fn with_limits(max_attempts: usize, window: Duration) -> Self {
        Self {
            email_attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Check if the email has used up its failures for the current window
    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.email_attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let Some(times) = attempts.get_mut(&email.to_lowercase()) else {
            return false;
        };
        times.retain(|time| *time > cutoff);
        times.len() >= self.max_attempts
    }

    /// Record a failed login attempt
    pub async fn record_failed_attempt(&self, email: &str) {
        let mut attempts = self.email_attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts (on successful login)
    pub async fn clear_attempts(&self, email: &str) {
        let mut attempts = self.email_attempts.write().await;
        attempts.remove(&email.to_lowercase());
    }

    /// Drop expired entries. Called periodically from a background task.
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.email_attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.email_attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_email_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_limited("owner@example.com").await);
            limiter.record_failed_attempt("owner@example.com").await;
        }

        limiter.record_failed_attempt("owner@example.com").await;
        assert!(limiter.is_limited("owner@example.com").await);

        limiter.clear_attempts("owner@example.com").await;
        assert!(!limiter.is_limited("owner@example.com").await);
    }

    #[tokio::test]
    async fn test_case_insensitive_email() {
        let limiter = LoginRateLimiter::new();

        limiter.record_failed_attempt("Owner@Example.com").await;
        limiter.record_failed_attempt("owner@example.com").await;
        limiter.record_failed_attempt("OWNER@EXAMPLE.COM").await;
        assert!(!limiter.is_limited("owner@example.com").await);

        limiter.record_failed_attempt("owner@example.com").await;
        limiter.record_failed_attempt("owner@example.com").await;
        assert!(limiter.is_limited("Owner@example.com").await);
    }

    #[tokio::test]
    async fn test_emails_are_independent() {
        let limiter = LoginRateLimiter::with_limits(1, Duration::minutes(15));
        limiter.record_failed_attempt("a@example.com").await;
        assert!(limiter.is_limited("a@example.com").await);
        assert!(!limiter.is_limited("b@example.com").await);
    }

    #[tokio::test]
    async fn test_old_attempts_age_out() {
        let limiter = LoginRateLimiter::with_limits(1, Duration::zero());
        limiter.record_failed_attempt("a@example.com").await;
        assert!(!limiter.is_limited("a@example.com").await);

        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 0);
    }
}
