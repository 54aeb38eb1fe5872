// ============================
// sessiongate-backend/src/auth/rate_limit.rs
// ============================
//! Throttling of failed login attempts.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before lockout
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// How long an idle failure record is kept
const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct AttemptEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

/// Rate limiter for login attempts, keyed by identity (usually the email)
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<String, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a failed attempt, locking the key out once the limit is hit
    pub fn record_failed_attempt(&self, key: &str) {
        let now = Instant::now();

        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(
                identity = key,
                lockout_secs = self.lockout_duration.as_secs(),
                "login locked out after repeated failures"
            );
        }
    }

    /// Forget failures after a successful login
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Whether another attempt is allowed right now
    pub fn check(&self, key: &str) -> bool {
        match self.attempts.get(key) {
            Some(entry) => entry
                .lockout_expiry
                .map_or(true, |expiry| Instant::now() >= expiry),
            None => true,
        }
    }

    /// Drop expired lockouts and stale failure records
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < RETENTION,
        });
    }

    /// Number of tracked identities
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}
