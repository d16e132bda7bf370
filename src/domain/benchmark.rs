//! Benchmark series aligned to the portfolio axis for overlay comparison.

use crate::domain::axis::Axis;
use crate::domain::metrics::cagr;
use crate::domain::price::{fill_carry, PricePoint};
use crate::domain::twr::{DailyReturn, VALUE_EPSILON};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
    /// Percent change versus the first non-null close on the axis.
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenchmarkSeries {
    pub points: Vec<BenchmarkPoint>,
    pub reference_close: Option<f64>,
}

pub fn normalize_benchmark(history: &[PricePoint], axis: &Axis) -> BenchmarkSeries {
    let closes = fill_carry(history, axis);
    let reference_close = closes
        .iter()
        .flatten()
        .next()
        .copied()
        .filter(|c| c.abs() > VALUE_EPSILON);

    let points = axis
        .days()
        .iter()
        .zip(closes)
        .map(|(&date, close)| BenchmarkPoint {
            date,
            close,
            pct: match (close, reference_close) {
                (Some(c), Some(base)) => Some((c / base - 1.0) * 100.0),
                _ => None,
            },
        })
        .collect();

    BenchmarkSeries {
        points,
        reference_close,
    }
}

/// Day-over-day returns, one per axis transition. Transitions without two
/// usable closes count as 0 so the series stays aligned with the axis.
pub fn benchmark_returns(series: &BenchmarkSeries) -> Vec<DailyReturn> {
    series
        .points
        .windows(2)
        .map(|w| {
            let r = match (w[0].close, w[1].close) {
                (Some(prev), Some(cur)) if prev > VALUE_EPSILON => cur / prev - 1.0,
                _ => 0.0,
            };
            DailyReturn { date: w[1].date, r }
        })
        .collect()
}

pub fn benchmark_cagr(series: &BenchmarkSeries) -> f64 {
    cagr(&benchmark_returns(series))
}
