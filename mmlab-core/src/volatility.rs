//! Realized-volatility signal from irregular trade timestamps.
//!
//! Volatility is the sample standard deviation of log returns. The rolling
//! variant slides a wall-clock window over (timestamp, price) pairs with an
//! explicit eviction deque — trade data is irregular, so a fixed-count
//! window would conflate quiet and busy periods.

use chrono::{Duration, NaiveDateTime, Timelike};
use std::collections::VecDeque;
use thiserror::Error;

/// Default rolling window.
pub const DEFAULT_WINDOW_HOURS: i64 = 3;

/// Default minimum number of log-return observations inside the window.
pub const DEFAULT_MIN_POINTS: usize = 10;

#[derive(Debug, Error)]
pub enum VolatilityError {
    #[error("insufficient data points: need at least {needed} valid prices, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

/// Volatility of a price series: sample std-dev of log returns.
///
/// Non-positive and NaN prices are dropped first; fewer than `min_points`
/// valid prices after cleaning is an error, not a silent zero. A constant
/// series yields exactly 0.0.
pub fn volatility(prices: &[f64], min_points: usize) -> Result<f64, VolatilityError> {
    let needed = min_points.max(2);
    let valid: Vec<f64> = prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();

    if valid.len() < needed {
        return Err(VolatilityError::InsufficientData {
            needed,
            got: valid.len(),
        });
    }

    let log_returns: Vec<f64> = valid.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    Ok(sample_std(&log_returns))
}

/// Rolling volatility aligned to the input.
///
/// Output has the same length as `points`; positions where fewer than
/// `min_points` log returns have accumulated inside `window` yield NaN (a
/// sentinel, not an error). Points must be in ascending timestamp order.
pub fn rolling_volatility(
    points: &[(NaiveDateTime, f64)],
    window: Duration,
    min_points: usize,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut returns: VecDeque<(NaiveDateTime, f64)> = VecDeque::new();
    let mut last_valid: Option<f64> = None;

    for &(ts, price) in points {
        if price.is_finite() && price > 0.0 {
            if let Some(prev) = last_valid {
                returns.push_back((ts, (price / prev).ln()));
            }
            last_valid = Some(price);
        }

        let cutoff = ts - window;
        while returns.front().is_some_and(|(t, _)| *t < cutoff) {
            returns.pop_front();
        }

        if returns.len() >= min_points.max(2) {
            let values: Vec<f64> = returns.iter().map(|(_, r)| *r).collect();
            out.push(sample_std(&values));
        } else {
            out.push(f64::NAN);
        }
    }

    out
}

/// Conservative volatility gate: pause at or above the threshold.
/// An undefined (NaN) volatility is treated as 0 and does not pause.
pub fn should_pause_trading(volatility: f64, threshold: f64) -> bool {
    if volatility.is_nan() {
        return false;
    }
    volatility >= threshold
}

/// Per-clock-hour volatility of a trade series.
///
/// Buckets prices by the hour their timestamp falls in and computes the
/// non-windowed volatility per bucket; buckets with too few points are
/// skipped. Returns (hour_start, volatility) pairs in time order.
pub fn hourly_volatility(points: &[(NaiveDateTime, f64)]) -> Vec<(NaiveDateTime, f64)> {
    let mut out = Vec::new();
    let mut bucket_start: Option<NaiveDateTime> = None;
    let mut bucket: Vec<f64> = Vec::new();

    let flush = |start: Option<NaiveDateTime>, prices: &[f64], out: &mut Vec<(NaiveDateTime, f64)>| {
        if let Some(start) = start {
            if let Ok(vol) = volatility(prices, 2) {
                out.push((start, vol));
            }
        }
    };

    for &(ts, price) in points {
        let hour = ts
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(ts);
        if bucket_start != Some(hour) {
            flush(bucket_start, &bucket, &mut out);
            bucket_start = Some(hour);
            bucket.clear();
        }
        bucket.push(price);
    }
    flush(bucket_start, &bucket, &mut out);

    out
}

/// Sample standard deviation (n−1 denominator); 0.0 below two observations.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    // ── volatility ──

    #[test]
    fn constant_prices_zero_volatility() {
        assert_eq!(volatility(&[0.5; 20], 2).unwrap(), 0.0);
    }

    #[test]
    fn empty_series_errors() {
        assert!(matches!(
            volatility(&[], 2),
            Err(VolatilityError::InsufficientData { .. })
        ));
    }

    #[test]
    fn single_point_errors() {
        assert!(volatility(&[0.5], 2).is_err());
    }

    #[test]
    fn cleaning_can_leave_too_few_points() {
        // Two raw points but only one survives cleaning.
        let result = volatility(&[0.5, -1.0], 2);
        assert!(matches!(
            result,
            Err(VolatilityError::InsufficientData { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn nan_prices_are_dropped() {
        let with_nan = volatility(&[0.5, f64::NAN, 0.55, 0.52], 2).unwrap();
        let without = volatility(&[0.5, 0.55, 0.52], 2).unwrap();
        assert!((with_nan - without).abs() < 1e-12);
    }

    #[test]
    fn matches_manual_sample_std() {
        let prices: [f64; 4] = [0.50, 0.55, 0.52, 0.58];
        let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let expected = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (returns.len() - 1) as f64)
            .sqrt();
        assert!((volatility(&prices, 2).unwrap() - expected).abs() < 1e-12);
    }

    // ── rolling_volatility ──

    #[test]
    fn rolling_output_aligned_to_input() {
        let points: Vec<_> = (0..30).map(|i| (ts(i), 0.5 + 0.001 * i as f64)).collect();
        let vols = rolling_volatility(&points, Duration::hours(3), 10);
        assert_eq!(vols.len(), points.len());
    }

    #[test]
    fn rolling_warmup_is_nan_then_defined() {
        let points: Vec<_> = (0..30)
            .map(|i| (ts(i), 0.5 + 0.01 * ((i % 5) as f64)))
            .collect();
        let vols = rolling_volatility(&points, Duration::hours(3), 10);
        // First return appears at index 1, so index 9 has 9 returns: still NaN.
        assert!(vols[9].is_nan());
        // Index 10 has 10 returns: defined.
        assert!(vols[10].is_finite());
    }

    #[test]
    fn rolling_evicts_outside_window() {
        // A volatile early burst, then a constant run long enough that the
        // jump return ages out of the 1-hour window: the tail volatility
        // must decay to exactly zero.
        let mut points: Vec<_> = (0..5).map(|i| (ts(i), 0.50 + 0.02 * i as f64)).collect();
        let late = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        points.extend((0..8).map(|i| (late + Duration::minutes(i * 10), 0.70)));

        let vols = rolling_volatility(&points, Duration::hours(1), 3);
        // First late point: only the jump return is inside the window.
        assert!(vols[5].is_nan());
        // Last point is 70 minutes after the jump: only zero returns remain.
        assert_eq!(*vols.last().unwrap(), 0.0);
    }

    #[test]
    fn rolling_constant_prices_zero() {
        let points: Vec<_> = (0..20).map(|i| (ts(i), 0.5)).collect();
        let vols = rolling_volatility(&points, Duration::hours(3), 5);
        assert_eq!(*vols.last().unwrap(), 0.0);
    }

    // ── should_pause_trading ──

    #[test]
    fn pause_is_inclusive_at_threshold() {
        assert!(should_pause_trading(0.15, 0.15));
        assert!(should_pause_trading(0.20, 0.15));
        assert!(!should_pause_trading(0.149, 0.15));
    }

    #[test]
    fn nan_volatility_does_not_pause() {
        assert!(!should_pause_trading(f64::NAN, 0.15));
    }

    // ── hourly_volatility ──

    #[test]
    fn hourly_buckets_by_clock_hour() {
        let mut points: Vec<_> = (0..6).map(|i| (ts(i * 5), 0.5 + 0.01 * i as f64)).collect();
        let next_hour = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(13, 10, 0)
            .unwrap();
        points.extend((0..4).map(|i| (next_hour + Duration::minutes(i * 5), 0.6)));

        let hourly = hourly_volatility(&points);
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].0.hour(), 12);
        assert_eq!(hourly[1].0.hour(), 13);
        assert_eq!(hourly[1].1, 0.0); // constant prices in the second hour
    }

    #[test]
    fn hourly_skips_sparse_buckets() {
        let points = vec![(ts(0), 0.5)];
        assert!(hourly_volatility(&points).is_empty());
    }
}
