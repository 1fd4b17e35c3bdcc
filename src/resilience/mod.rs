//! # Resilience Module
//!
//! Opt-in hardening for the upstream call.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | Bounded exponential-backoff retry for transport failures and provider 5xx |
//!
//! ```rust
//! use chat_cache_gateway::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_max_retries(2)
//!     .with_delays(Duration::from_millis(200), Duration::from_secs(2));
//! assert_eq!(policy.max_retries, 2);
//! ```

pub mod retry;

pub use retry::RetryPolicy;
