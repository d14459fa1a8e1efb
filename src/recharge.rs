//! Water-table-fluctuation (WTF) recharge estimation.
//!
//! Sign convention: positive rate = net recharge. Stored levels follow the
//! "lower value = worse" framing used by the alert thresholds, so a rising
//! level value means more stored water and the WTF sign agrees with the
//! alerting convention.

/// Default aquifer specific yield used when a caller supplies none.
pub const DEFAULT_SPECIFIC_YIELD: f64 = 0.1;

/// Instantaneous recharge rate from two level observations.
///
/// `Sy * (current - previous) / elapsed_hours`, in metres of water per hour.
/// No previous observation, or a non-positive elapsed time, yields zero
/// rather than an error: a missing baseline is a normal condition for a
/// station's first reading.
#[must_use]
pub fn estimate(
    current_level: f64,
    previous_level: Option<f64>,
    elapsed_hours: f64,
    specific_yield: f64,
) -> f64 {
    let Some(previous) = previous_level else {
        return 0.0;
    };
    if elapsed_hours <= 0.0 {
        return 0.0;
    }
    specific_yield * (current_level - previous) / elapsed_hours
}

/// Windowed recharge estimate over a fixed lookback.
///
/// Integrates the level change across the window instead of dividing by
/// elapsed time: `Sy * (level_now - level_window_ago)`, in metres of water.
/// Used for longer-horizon summaries (default window 30 days).
#[must_use]
pub fn estimate_windowed(
    level_now: f64,
    level_window_ago: Option<f64>,
    specific_yield: f64,
) -> f64 {
    match level_window_ago {
        Some(baseline) => specific_yield * (level_now - baseline),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_change_means_zero_rate() {
        for level in [0.0, 7.5, 19.0, 250.0] {
            assert_eq!(estimate(level, Some(level), 6.0, DEFAULT_SPECIFIC_YIELD), 0.0);
        }
    }

    #[test]
    fn no_previous_observation_means_zero_rate() {
        assert_eq!(estimate(12.3, None, 1.0, DEFAULT_SPECIFIC_YIELD), 0.0);
    }

    #[test]
    fn non_positive_elapsed_time_is_guarded() {
        assert_eq!(estimate(12.3, Some(11.0), 0.0, DEFAULT_SPECIFIC_YIELD), 0.0);
        assert_eq!(estimate(12.3, Some(11.0), -2.0, DEFAULT_SPECIFIC_YIELD), 0.0);
    }

    #[test]
    fn rising_level_is_positive_recharge() {
        // 2m rise over 10 hours at Sy = 0.1 -> 0.02 m/hr
        let rate = estimate(20.0, Some(18.0), 10.0, DEFAULT_SPECIFIC_YIELD);
        assert!((rate - 0.02).abs() < 1e-12);
    }

    #[test]
    fn falling_level_is_negative() {
        let rate = estimate(18.0, Some(20.0), 10.0, DEFAULT_SPECIFIC_YIELD);
        assert!((rate + 0.02).abs() < 1e-12);
    }

    #[test]
    fn windowed_estimate_integrates_over_window() {
        let estimate = estimate_windowed(19.5, Some(18.0), DEFAULT_SPECIFIC_YIELD);
        assert!((estimate - 0.15).abs() < 1e-12);
        assert_eq!(estimate_windowed(19.5, None, DEFAULT_SPECIFIC_YIELD), 0.0);
    }
}
