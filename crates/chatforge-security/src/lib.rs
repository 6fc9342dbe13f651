//! # ChatForge Security
//!
//! Admission control for outbound provider calls.

pub mod rate_limit;

pub use rate_limit::{RateLimitStatus, RateLimiter};
