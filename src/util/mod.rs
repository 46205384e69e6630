//! Shared helpers: tick arithmetic and rate limiting

pub mod rate_limit;
pub mod time;
