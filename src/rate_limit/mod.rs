//! Rate limiting module
//!
//! Each protected endpoint owns one [`RateLimiter`], a per-identifier sliding
//! window counter. The limiter is created at startup, shared through the
//! application state and consulted by [`rate_limit_middleware`] before the
//! endpoint handler does any work.
//!
//! # Features
//!
//! - Sliding window counting (not a token bucket): at most `max_requests`
//!   admitted requests inside any trailing `window_ms`
//! - Injectable [`Clock`] for deterministic tests
//! - Explicit [`RateLimiter::cleanup`], scheduled by [`spawn_cleanup_task`]
//! - `429` responses with a fixed `Retry-After: 60`
//!
//! # Example
//!
//! ```rust
//! use folio_gateway::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(RateLimitConfig::new(60_000, 2)).unwrap();
//! assert!(limiter.is_allowed("1.2.3.4"));
//! assert!(limiter.is_allowed("1.2.3.4"));
//! assert!(!limiter.is_allowed("1.2.3.4"));
//! ```

pub mod cleanup;
pub mod clock;
pub mod limiter;
pub mod middleware;
pub mod types;

// Re-export commonly used types
pub use cleanup::spawn_cleanup_task;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::RateLimiter;
pub use middleware::{client_identifier, rate_limit_middleware, RateLimitMiddleware};
pub use types::{RateLimitConfig, RateLimitResult, RETRY_AFTER_SECS};
