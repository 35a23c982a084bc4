//! Adaptive histogram bucketing.
//!
//! The bucket width is derived from the requested resolution and the data
//! range, then snapped to a "nice" value: a power of ten divided by 1, 2 or
//! 4 for plain numbers, a whole number for integers, and a calendar-friendly
//! unit for dates.

use std::collections::BTreeMap;

use crate::bson::BsonType;

use super::results::{Histogram, HistogramBucket};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

const SUB_HOUR_UNITS: [f64; 7] = [1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0];
const SUB_DAY_UNITS: [f64; 6] = [1.0, 2.0, 3.0, 6.0, 12.0, 24.0];

/// Absorbs floating point noise when rounding steps and bounds.
const EPSILON: f64 = 1e-9;

/// How bucket widths are snapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Real,
    Integer,
    /// Values in Unix seconds.
    Date,
}

impl Domain {
    /// Domain of a value histogram over `ty`, if it has one.
    pub fn of(ty: BsonType) -> Option<Self> {
        match ty {
            BsonType::Double | BsonType::Decimal => Some(Domain::Real),
            BsonType::Int | BsonType::Long => Some(Domain::Integer),
            BsonType::Date => Some(Domain::Date),
            _ => None,
        }
    }
}

/// Bucket width for data spanning `[min, max]` at `resolution` points.
///
/// Returns `None` for an empty or non-finite range.
pub fn bucket_step(min: f64, max: f64, resolution: u32, domain: Domain) -> Option<f64> {
    let range = max - min;
    if resolution < 2 || !range.is_finite() || range <= 0.0 {
        return None;
    }
    let density = f64::from(resolution - 1) / range;
    let shift = 10f64.powf(density.log10().floor());
    let normalized = density / shift;
    let divisor = if normalized < 2.0 {
        1.0
    } else if normalized < 4.0 {
        2.0
    } else {
        4.0
    };
    let step = 1.0 / (divisor * shift);

    let step = match domain {
        Domain::Real => step,
        Domain::Integer => ceil_tolerant(step).max(1.0),
        Domain::Date => nice_date_step(step),
    };
    (step.is_finite() && step > 0.0).then_some(step)
}

/// Rounds `seconds` up to the next calendar-friendly unit.
pub fn nice_date_step(seconds: f64) -> f64 {
    let pick = |units: &[f64], scale: f64| {
        units
            .iter()
            .map(|u| u * scale)
            .find(|u| *u + EPSILON >= seconds)
    };
    if seconds <= SECONDS_PER_MINUTE {
        pick(&SUB_HOUR_UNITS, 1.0).unwrap_or(SECONDS_PER_MINUTE)
    } else if seconds <= SECONDS_PER_HOUR {
        pick(&SUB_HOUR_UNITS, SECONDS_PER_MINUTE).unwrap_or(SECONDS_PER_HOUR)
    } else if seconds <= SECONDS_PER_DAY {
        pick(&SUB_DAY_UNITS, SECONDS_PER_HOUR).unwrap_or(SECONDS_PER_DAY)
    } else {
        ceil_tolerant(seconds / SECONDS_PER_DAY) * SECONDS_PER_DAY
    }
}

/// `ceil` that treats values within [`EPSILON`] of an integer as that
/// integer.
fn ceil_tolerant(x: f64) -> f64 {
    let rounded = x.round();
    if (x - rounded).abs() < EPSILON {
        rounded
    } else {
        x.ceil()
    }
}

fn floor_tolerant(x: f64) -> f64 {
    let rounded = x.round();
    if (x - rounded).abs() < EPSILON {
        rounded
    } else {
        x.floor()
    }
}

/// Builds a histogram from `(value, count)` pairs.
///
/// Non-finite values are ignored. Returns `None` when fewer than two
/// distinct finite values exist.
pub fn build_histogram(
    values: impl IntoIterator<Item = (f64, u64)>,
    resolution: u32,
    domain: Domain,
) -> Option<Histogram> {
    let values: Vec<(f64, u64)> = values
        .into_iter()
        .filter(|(v, _)| v.is_finite())
        .collect();
    let min = values.iter().map(|(v, _)| *v).reduce(f64::min)?;
    let max = values.iter().map(|(v, _)| *v).reduce(f64::max)?;
    let step = bucket_step(min, max, resolution, domain)?;

    let start = floor_tolerant(min / step) * step;
    let end = ceil_tolerant(max / step) * step + step;
    let bucket_count = ((end - start) / step).round() as u64;

    let last = bucket_count.saturating_sub(1);
    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    for (value, count) in values {
        let index = (floor_tolerant((value - start) / step).max(0.0) as u64).min(last);
        *counts.entry(index).or_insert(0) += count;
    }
    let buckets = counts
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(index, count)| HistogramBucket::new(index, count))
        .collect();

    Some(Histogram {
        start,
        end,
        step,
        range: end - start,
        bucket_count,
        buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(values: &[f64]) -> Vec<(f64, u64)> {
        values.iter().map(|v| (*v, 1)).collect()
    }

    #[test]
    fn test_integer_example() {
        let h =
            build_histogram(ones(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), 5, Domain::Integer).unwrap();
        assert_eq!(h.start, 0.0);
        assert_eq!(h.end, 9.0);
        assert_eq!(h.step, 3.0);
        assert_eq!(h.range, 9.0);
        assert_eq!(h.bucket_count, 3);
        assert_eq!(
            h.buckets,
            vec![HistogramBucket::new(0, 3), HistogramBucket::new(1, 3)]
        );
    }

    #[test]
    fn test_real_step_uses_divisors() {
        // density 9 / 1 = 9 -> divisor 4 -> 0.25
        assert_eq!(bucket_step(0.0, 1.0, 10, Domain::Real), Some(0.25));
        // density 1.5 -> divisor 1 -> 1
        assert_eq!(bucket_step(0.0, 2.0, 4, Domain::Real), Some(1.0));
        // density 0.3 -> shift 0.1, normalized 3 -> divisor 2 -> 5
        assert_eq!(bucket_step(0.0, 10.0, 4, Domain::Real), Some(5.0));
    }

    #[test]
    fn test_empty_range_has_no_histogram() {
        assert!(build_histogram(ones(&[4.0, 4.0]), 10, Domain::Real).is_none());
        assert!(build_histogram(Vec::new(), 10, Domain::Real).is_none());
        assert!(bucket_step(0.0, f64::INFINITY, 10, Domain::Real).is_none());
    }

    #[test]
    fn test_nice_date_steps() {
        assert_eq!(nice_date_step(0.3), 1.0);
        assert_eq!(nice_date_step(3.0), 5.0);
        assert_eq!(nice_date_step(45.0), 60.0);
        assert_eq!(nice_date_step(61.0), 120.0);
        assert_eq!(nice_date_step(1000.0), 1800.0);
        assert_eq!(nice_date_step(3601.0), 7200.0);
        assert_eq!(nice_date_step(30_000.0), 43_200.0);
        assert_eq!(nice_date_step(90_000.0), 172_800.0);
    }

    #[test]
    fn test_date_histogram_over_a_week() {
        let day = SECONDS_PER_DAY;
        let values = ones(&[0.0, day, 2.0 * day, 6.0 * day]);
        // density 6 / 518400s -> step ~1.16 days -> rounded up to two days
        let h = build_histogram(values, 7, Domain::Date).unwrap();
        assert_eq!(h.step, 2.0 * day);
        assert_eq!(h.start, 0.0);
        assert_eq!(h.end, 8.0 * day);
        assert_eq!(h.bucket_count, 4);
        assert_eq!(h.total_count(), 4);
        assert_eq!(
            h.buckets,
            vec![
                HistogramBucket::new(0, 2),
                HistogramBucket::new(1, 1),
                HistogramBucket::new(3, 1)
            ]
        );
    }

    #[test]
    fn test_weighted_counts_sum() {
        let h = build_histogram(vec![(0.5, 3), (1.7, 2), (9.9, 5)], 20, Domain::Real).unwrap();
        assert_eq!(h.total_count(), 10);
        assert!(h.buckets.windows(2).all(|w| w[0].index < w[1].index));
        assert!(h.buckets.iter().all(|b| b.index < h.bucket_count));
    }
}
