//! Fixed-window request limits for the reporting application's endpoints.

mod limiter;
mod policy;

pub use limiter::{RateDecision, RateLimiter};
pub use policy::RateLimitPolicy;
