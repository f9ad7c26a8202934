//! Growth-rate estimators over a snapshot series

use crate::config::GrowthEstimator;
use crate::models::DiskSnapshot;

const SECS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Used-space growth in GB/day for `series` (oldest first).
///
/// Returns 0.0 for fewer than two points or a zero time span.
pub fn growth_rate(estimator: GrowthEstimator, series: &[DiskSnapshot]) -> f64 {
    match estimator {
        GrowthEstimator::Endpoint => endpoint_rate(series),
        GrowthEstimator::LeastSquares => least_squares_rate(series),
    }
}

/// Slope between the first and last snapshot, ignoring the points between
pub fn endpoint_rate(series: &[DiskSnapshot]) -> f64 {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return 0.0;
    };

    let days = days_between(first, last);
    if days <= 0.0 {
        return 0.0;
    }
    (last.used_gb - first.used_gb) / days
}

/// Ordinary least-squares slope of used GB against elapsed days
pub fn least_squares_rate(series: &[DiskSnapshot]) -> f64 {
    let n = series.len() as f64;
    let Some(first) = series.first() else {
        return 0.0;
    };
    if n < 2.0 {
        return 0.0;
    }

    // Offsets from the first point keep the sums small
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for snapshot in series {
        let x = days_between(first, snapshot);
        let y = snapshot.used_gb;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

fn days_between(from: &DiskSnapshot, to: &DiskSnapshot) -> f64 {
    (to.timestamp - from.timestamp).num_milliseconds() as f64 / 1000.0 / SECS_PER_DAY
}
