//! Shared time-series math for the feature pipeline and predictors.
//!
//! Every helper is defensive: degenerate windows (empty, constant, too short)
//! yield a neutral constant instead of NaN, so no caller ever propagates a
//! non-finite value into a feature vector or a candidate score.

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation; 0 for slices shorter than 2.
pub fn stddev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    sanitize(variance.sqrt())
}

/// Median of the slice; 0 when empty.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Smallest value; 0 for an empty slice.
pub fn min_value(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::INFINITY, f32::min)
}

/// Largest value; 0 for an empty slice.
pub fn max_value(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Ratio of distinct values to slice length; 0 when empty.
pub fn distinct_ratio(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted.len() as f32 / values.len() as f32
}

/// Consecutive differences `x[i+1] - x[i]`.
pub fn differences(values: &[f32]) -> Vec<f32> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Slope of the least-squares line through `(i, values[i])`; 0 when undefined.
pub fn linear_slope(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let xs_mean = (n - 1) as f32 / 2.0;
    let ys_mean = mean(values);
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f32 - xs_mean;
        numerator += dx * (y - ys_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return 0.0;
    }
    sanitize(numerator / denominator)
}

/// Autocorrelation at the given lag; 0 when undefined (short or constant series).
pub fn autocorrelation(values: &[f32], lag: usize) -> f32 {
    let n = values.len();
    if lag == 0 || n <= lag + 1 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>();
    if variance == 0.0 {
        return 0.0;
    }
    let covariance: f32 = values
        .windows(lag + 1)
        .map(|w| (w[0] - m) * (w[lag] - m))
        .sum();
    sanitize(covariance / variance)
}

/// Rough Hurst exponent via rescaled range, clipped to `[0, 1]`.
///
/// Returns the neutral 0.5 for windows that are too short or constant.
pub fn hurst_exponent(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 8 {
        return 0.5;
    }
    let deviation = stddev(values);
    if deviation == 0.0 {
        return 0.5;
    }

    let m = mean(values);
    let mut cumulative = 0.0f32;
    let mut running_min = 0.0f32;
    let mut running_max = 0.0f32;
    for &v in values {
        cumulative += v - m;
        running_min = running_min.min(cumulative);
        running_max = running_max.max(cumulative);
    }
    let range = running_max - running_min;
    if range <= 0.0 {
        return 0.5;
    }

    let rescaled = range / deviation;
    if rescaled <= 1.0 {
        return 0.5;
    }
    sanitize_or(rescaled.ln() / (n as f32).ln(), 0.5).clamp(0.0, 1.0)
}

/// Mean absolute deviation over standard deviation; 0 when undefined.
pub fn mean_reversion_score(values: &[f32]) -> f32 {
    let deviation = stddev(values);
    if deviation == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let mad = values.iter().map(|v| (v - m).abs()).sum::<f32>() / values.len() as f32;
    sanitize(mad / deviation)
}

/// Replaces a non-finite value with 0.
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Replaces a non-finite value with the supplied fallback.
pub fn sanitize_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_moments() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&xs) - 5.0).abs() < 1e-6);
        assert!((stddev(&xs) - 2.0).abs() < 1e-6);
        assert!((median(&xs) - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_slices_are_neutral() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stddev(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(distinct_ratio(&[]), 0.0);
        assert_eq!(linear_slope(&[]), 0.0);
    }

    #[test]
    fn test_distinct_ratio() {
        assert!((distinct_ratio(&[1.0, 1.0, 2.0, 3.0]) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_slope_of_line_is_exact() {
        let xs: Vec<f32> = (0..10).map(|i| 3.0 * i as f32 + 1.0).collect();
        assert!((linear_slope(&xs) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_autocorrelation_constant_series_is_zero() {
        let xs = [5.0; 16];
        assert_eq!(autocorrelation(&xs, 1), 0.0);
    }

    #[test]
    fn test_autocorrelation_alternating_series_is_negative() {
        let xs: Vec<f32> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(autocorrelation(&xs, 1) < 0.0);
    }

    #[test]
    fn test_hurst_neutral_on_degenerate_input() {
        assert_eq!(hurst_exponent(&[1.0, 2.0, 3.0]), 0.5);
        assert_eq!(hurst_exponent(&[4.0; 32]), 0.5);
    }

    #[test]
    fn test_hurst_trending_series_is_persistent() {
        let xs: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let h = hurst_exponent(&xs);
        assert!(h > 0.7, "trending series should look persistent, got {h}");
    }

    #[test]
    fn test_sanitize_masks_non_finite() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize_or(f32::NAN, 0.5), 0.5);
        assert_eq!(sanitize(1.5), 1.5);
    }
}
