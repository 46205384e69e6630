//! Time utilities for the peer simulation

use std::time::Duration;

/// Tick rate configuration
pub const DEFAULT_FIXED_TPS: u32 = 50; // 50 fixed ticks per second (0.02s step)
/// Highest rate whose tick interval is still at least one microsecond
pub const MAX_FIXED_TPS: u32 = 1_000_000;
pub const STATUS_POLL_MILLIS: u64 = 1_000;
pub const TEARDOWN_POLL_MILLIS: u64 = 50;

/// Seconds covered by one fixed tick
pub fn tick_delta(tps: u32) -> f64 {
    1.0 / tps.max(1) as f64
}

/// Interval between fixed ticks
pub fn tick_duration(tps: u32) -> Duration {
    Duration::from_micros(1_000_000 / tps.max(1) as u64)
}

/// Number of whole ticks needed to cover `seconds`, rounded up
pub fn ticks_for(seconds: f64, tps: u32) -> u64 {
    (seconds * tps.max(1) as f64).ceil().max(0.0) as u64
}

/// Number of whole ticks that fit in `seconds`, rounded down
pub fn whole_ticks_in(seconds: f64, tps: u32) -> u64 {
    (seconds * tps.max(1) as f64).floor().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifespan_rounds_up_to_whole_ticks() {
        assert_eq!(ticks_for(8.0, 50), 400);
        assert_eq!(ticks_for(0.03, 50), 2);
        assert_eq!(ticks_for(0.0, 50), 0);
    }

    #[test]
    fn lag_rounds_down() {
        assert_eq!(whole_ticks_in(0.059, 50), 2);
        assert_eq!(whole_ticks_in(-1.0, 50), 0);
    }

    #[test]
    fn zero_tps_is_treated_as_one() {
        assert_eq!(tick_delta(0), 1.0);
        assert_eq!(tick_duration(0), Duration::from_secs(1));
    }
}
