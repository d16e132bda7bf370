//! Display-only thinning of long daily series.
//!
//! Runs after returns and statistics were computed on the full axis.

use crate::domain::benchmark::BenchmarkPoint;
use crate::domain::twr::{DailyReturn, ReturnPoint};
use crate::domain::valuation::ValuationPoint;
use chrono::NaiveDate;

pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for ValuationPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for DailyReturn {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for ReturnPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for BenchmarkPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Keep the first point, then any point at least `min_interval_days` after the
/// last kept one. The final point is always kept.
pub fn downsample<T: Dated + Clone>(points: &[T], min_interval_days: i64) -> Vec<T> {
    let Some(last) = points.last() else {
        return Vec::new();
    };
    if min_interval_days <= 1 {
        return points.to_vec();
    }

    let mut kept: Vec<T> = Vec::new();
    let mut last_kept: Option<NaiveDate> = None;
    for p in points {
        let due = match last_kept {
            None => true,
            Some(prev) => (p.date() - prev).num_days() >= min_interval_days,
        };
        if due {
            last_kept = Some(p.date());
            kept.push(p.clone());
        }
    }

    if last_kept != Some(last.date()) {
        kept.push(last.clone());
    }
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsamplePolicy {
    /// Ranges spanning more calendar days than this are thinned.
    pub threshold_days: i64,
    pub interval_days: i64,
}

impl Default for DownsamplePolicy {
    fn default() -> Self {
        Self {
            threshold_days: 365,
            interval_days: 7,
        }
    }
}

impl DownsamplePolicy {
    pub fn applies(&self, first: NaiveDate, last: NaiveDate) -> bool {
        (last - first).num_days() > self.threshold_days
    }

    pub fn apply<T: Dated + Clone>(&self, points: &[T]) -> Vec<T> {
        match (points.first(), points.last()) {
            (Some(f), Some(l)) if self.applies(f.date(), l.date()) => {
                downsample(points, self.interval_days)
            }
            _ => points.to_vec(),
        }
    }
}
