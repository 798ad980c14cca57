//! Randomized feed scheduling
//!
//! The configured frequency divides one week into equal windows; each
//! feed lands a half-window past the start of its window plus a random
//! offset within the window. The offset is scaled from the raw draw by
//! a multiply-shift rather than a modulo, so the distribution stays
//! uniform over the window.

/// One week, in minutes - the scheduling period.
pub const WEEK_MINUTES: u16 = 10_080;

/// Compute the minutes until the next feed is due.
///
/// `draw` is a 31-bit PRNG draw. Returns 0 (scheduled feeding
/// disabled) when `feeds_per_week` is 0 or exceeds the period
/// granularity. Otherwise the result lies in
/// `[window / 2, window / 2 + window)` for `window = WEEK_MINUTES / n`.
pub fn next_feed_minutes(feeds_per_week: u16, draw: u32) -> u16 {
    if feeds_per_week == 0 {
        return 0;
    }
    let window = WEEK_MINUTES / feeds_per_week;
    if window == 0 {
        return 0;
    }
    // Scale the 31-bit draw into [0, window) without modulo bias.
    let jitter = ((u64::from(draw) * u64::from(window)) >> 31) as u16;
    window / 2 + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Prng;
    use proptest::prelude::*;

    #[test]
    fn zero_frequency_disables() {
        assert_eq!(next_feed_minutes(0, 0), 0);
        assert_eq!(next_feed_minutes(0, 0x7fff_ffff), 0);
    }

    #[test]
    fn frequency_beyond_granularity_disables() {
        // More feeds than minutes in a week: window truncates to zero
        assert_eq!(next_feed_minutes(WEEK_MINUTES + 1, 12345), 0);
    }

    #[test]
    fn three_per_week_bounds() {
        // window = 3360, offset = 1680
        assert_eq!(next_feed_minutes(3, 0), 1680);
        // A saturating draw approaches but never reaches offset + window
        let max = next_feed_minutes(3, 0x7fff_ffff);
        assert!(max < 1680 + 3360);
        assert_eq!(max, 1680 + 3359);
    }

    #[test]
    fn daily_window_midpoint() {
        // 7 feeds/week: window = 1440 (one day), offset = 720
        assert_eq!(next_feed_minutes(7, 0), 720);
        assert!(next_feed_minutes(7, 0x4000_0000) >= 720 + 1440 / 2);
    }

    #[test]
    fn advancing_prng_spreads_across_the_window() {
        // Bucket 4096 consecutive draws into 8 slices of the window and
        // require every slice to be hit: clustering at the boundaries
        // would break the statistical contract.
        let mut prng = Prng::seeded(0x0bad_5eed);
        let window = WEEK_MINUTES / 3;
        let mut buckets = [0u32; 8];
        for _ in 0..4096 {
            let due = next_feed_minutes(3, prng.draw());
            let jitter = due - window / 2;
            buckets[(jitter / (window / 8 + 1)) as usize] += 1;
        }
        for (i, count) in buckets.iter().enumerate() {
            assert!(
                *count > 4096 / 8 / 4,
                "bucket {} starved: {} draws",
                i,
                count
            );
        }
    }

    proptest! {
        /// For any frequency and draw the due time stays inside
        /// [window/2, window/2 + window).
        #[test]
        fn due_time_in_bounds(n in 1u16..=WEEK_MINUTES, draw in 0u32..=0x7fff_ffff) {
            let due = next_feed_minutes(n, draw);
            let window = WEEK_MINUTES / n;
            if window == 0 {
                prop_assert_eq!(due, 0);
            } else {
                prop_assert!(due >= window / 2);
                prop_assert!(due < window / 2 + window);
            }
        }
    }
}
