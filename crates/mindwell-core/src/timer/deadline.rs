//! Pure deadline arithmetic.
//!
//! Remaining time is always derived from an absolute deadline and the current
//! instant. Nothing here accumulates state between observations, so any number
//! of missed or coalesced ticks leaves the result unchanged.

/// Absolute deadline for a session of `duration_secs` starting at `now_ms`.
pub fn deadline_from(now_ms: u64, duration_secs: u64) -> u64 {
    now_ms.saturating_add(duration_secs.saturating_mul(1000))
}

/// Whole seconds left until `end_at_ms`, rounded up, never negative.
///
/// Rounding up means a freshly started session reports its full duration and
/// the value only reaches zero once the deadline has actually passed.
pub fn remaining_secs(end_at_ms: u64, now_ms: u64) -> u64 {
    end_at_ms.saturating_sub(now_ms).div_ceil(1000)
}

/// Seconds of a session already consumed.
pub fn elapsed_secs(duration_secs: u64, remaining_secs: u64) -> u64 {
    duration_secs.saturating_sub(remaining_secs)
}

/// `MM:SS`, as shown by the timer page.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `m:ss`, as shown by the floating indicator.
pub fn format_compact(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn remaining_rounds_up_partial_seconds() {
        assert_eq!(remaining_secs(10_000, 9_001), 1);
        assert_eq!(remaining_secs(10_000, 9_000), 1);
        assert_eq!(remaining_secs(10_000, 8_999), 2);
    }

    #[test]
    fn remaining_is_zero_at_and_after_deadline() {
        assert_eq!(remaining_secs(10_000, 10_000), 0);
        assert_eq!(remaining_secs(10_000, 99_000), 0);
    }

    #[test]
    fn deadline_saturates() {
        assert_eq!(deadline_from(u64::MAX - 10, 60), u64::MAX);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_compact(1500), "25:00");
        assert_eq!(format_compact(65), "1:05");
    }

    proptest! {
        #[test]
        fn fresh_deadline_reports_full_duration(now in 0u64..4_000_000_000_000, d in 1u64..86_400) {
            let end = deadline_from(now, d);
            prop_assert_eq!(remaining_secs(end, now), d);
        }

        #[test]
        fn remaining_never_increases(now in 0u64..4_000_000_000_000, d in 1u64..86_400, a in 0u64..90_000_000, b in 0u64..90_000_000) {
            let end = deadline_from(now, d);
            let (t1, t2) = if a <= b { (now + a, now + b) } else { (now + b, now + a) };
            prop_assert!(remaining_secs(end, t2) <= remaining_secs(end, t1));
        }
    }
}
