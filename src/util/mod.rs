//! Utility module
//!
//! Wrapping millisecond helpers for the busy-polled software timers.

/// Milliseconds elapsed between `since` and `now` on a wrapping `u32` clock
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Returns true once `interval` milliseconds have passed since `since`
pub fn interval_elapsed(now: u32, since: u32, interval: u32) -> bool {
    elapsed_ms(now, since) >= interval
}

/// Clamps a `Duration` into the `u32` millisecond domain of the poll loop
pub fn duration_to_ms(duration: std::time::Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_elapsed_across_wrap() {
        assert_eq!(elapsed_ms(5, u32::MAX - 4), 10);
        assert!(interval_elapsed(5, u32::MAX - 994, 1000));
        assert!(!interval_elapsed(4, u32::MAX - 994, 1000));
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(duration_to_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_to_ms(Duration::from_secs(u64::MAX)), u32::MAX);
    }
}
