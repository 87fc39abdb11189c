use super::clock::{Clock, SystemClock};
use super::types::{RateLimitConfig, RateLimitResult};
use crate::error::Result;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Per-identifier sliding window request counter.
///
/// Every identifier keeps the timestamps of its admitted requests. A request is
/// admitted while fewer than `max_requests` timestamps fall inside the trailing
/// `window_ms`; denied requests are not recorded. Timestamps older than the
/// window are pruned lazily on access and in [`RateLimiter::cleanup`].
///
/// The prune, decide and append steps for one identifier happen under that
/// identifier's map entry guard, so concurrent callers can never admit more than
/// `max_requests` requests inside one window.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, VecDeque<u64>>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked", &self.entries.len())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter driven by the wall clock
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter with an injected clock
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            clock,
            entries: DashMap::new(),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Returns `true` and records the request if the identifier is under its limit
    pub fn is_allowed(&self, identifier: &str) -> bool {
        self.check(identifier).allowed
    }

    /// Check and record a request, reporting the remaining budget
    pub fn check(&self, identifier: &str) -> RateLimitResult {
        let now = self.clock.now_ms();
        let window_start = now.saturating_sub(self.config.window_ms);
        let limit = self.config.max_requests;

        let mut entry = self.entries.entry(identifier.to_string()).or_default();
        let timestamps = entry.value_mut();
        prune(timestamps, window_start);

        if timestamps.len() >= limit as usize {
            let reset_after_ms = self.reset_after(timestamps, now);
            debug!(
                identifier = %identifier,
                count = timestamps.len(),
                "Rate limit reached"
            );
            return RateLimitResult::denied(limit, reset_after_ms);
        }

        timestamps.push_back(now);
        let remaining = limit - timestamps.len() as u32;
        let reset_after_ms = self.reset_after(timestamps, now);

        RateLimitResult::allowed(remaining, limit, reset_after_ms)
    }

    /// Forget every recorded request for the identifier
    pub fn reset(&self, identifier: &str) {
        if self.entries.remove(identifier).is_some() {
            debug!(identifier = %identifier, "Rate limit state reset");
        }
    }

    /// Prune all identifiers and drop the ones with no request left in the window.
    ///
    /// Returns the number of identifiers removed.
    pub fn cleanup(&self) -> usize {
        let window_start = self.clock.now_ms().saturating_sub(self.config.window_ms);
        let before = self.entries.len();

        self.entries.retain(|_, timestamps| {
            prune(timestamps, window_start);
            !timestamps.is_empty()
        });

        before.saturating_sub(self.entries.len())
    }

    /// Number of identifiers currently holding state
    pub fn tracked_identifiers(&self) -> usize {
        self.entries.len()
    }

    fn reset_after(&self, timestamps: &VecDeque<u64>, now: u64) -> u64 {
        timestamps
            .iter()
            .min()
            .map(|oldest| (oldest + self.config.window_ms).saturating_sub(now))
            .unwrap_or(0)
    }
}

/// Drop timestamps strictly before `window_start`.
///
/// The wall clock can step backwards, so the sequence is not assumed ordered.
fn prune(timestamps: &mut VecDeque<u64>, window_start: u64) {
    timestamps.retain(|&t| t >= window_start);
}
