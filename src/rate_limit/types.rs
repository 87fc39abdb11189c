use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Fixed `Retry-After` advertisement for 429 responses, independent of the window
pub const RETRY_AFTER_SECS: u64 = 60;

/// Sliding window limit for one endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds
    pub window_ms: u64,
    /// Maximum number of requests allowed inside any window
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Reject non-positive windows or ceilings
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(GatewayError::InvalidConfiguration(
                "rate limit window_ms must be > 0".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(GatewayError::InvalidConfiguration(
                "rate limit max_requests must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rate limit result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Total limit
    pub limit: u32,
    /// Milliseconds until the oldest in-window request leaves the window
    pub reset_after_ms: u64,
}

impl RateLimitResult {
    /// Create an allowed result
    pub fn allowed(remaining: u32, limit: u32, reset_after_ms: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            limit,
            reset_after_ms,
        }
    }

    /// Create a denied result
    pub fn denied(limit: u32, reset_after_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
            reset_after_ms,
        }
    }
}
