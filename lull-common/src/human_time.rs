//! Human-readable countdown formatting
//!
//! Sleep-timer displays use `MM:SS`, switching to `HH:MM:SS` once an hour
//! or more remains.

use std::time::Duration;

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a remaining duration for countdown display.
///
/// Sub-second remainders are rounded up so a countdown never shows `00:00`
/// while time is still left.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use lull_common::human_time::format_countdown;
///
/// assert_eq!(format_countdown(Duration::from_secs(890)), "14:50");
/// assert_eq!(format_countdown(Duration::from_secs(3661)), "01:01:01");
/// assert_eq!(format_countdown(Duration::from_millis(400)), "00:01");
/// ```
pub fn format_countdown(remaining: Duration) -> String {
    let total = whole_seconds_ceil(remaining);
    let hours = total / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Whole seconds left, rounding any fractional second up
pub fn whole_seconds_ceil(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_format() {
        assert_eq!(format_countdown(Duration::ZERO), "00:00");
        assert_eq!(format_countdown(Duration::from_secs(59)), "00:59");
        assert_eq!(format_countdown(Duration::from_secs(900)), "15:00");
        assert_eq!(format_countdown(Duration::from_secs(3599)), "59:59");
    }

    #[test]
    fn test_hours_format() {
        assert_eq!(format_countdown(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(format_countdown(Duration::from_secs(7325)), "02:02:05");
    }

    #[test]
    fn test_fraction_rounds_up() {
        assert_eq!(whole_seconds_ceil(Duration::from_millis(1001)), 2);
        assert_eq!(whole_seconds_ceil(Duration::from_millis(1000)), 1);
        assert_eq!(format_countdown(Duration::from_millis(59_500)), "01:00");
    }
}
