//! Time-weighted return over an axis-aligned valuation series.
//!
//! Cashflows follow the end-of-day convention: a deposit on day `t` is already
//! inside `value[t]`, so it is subtracted before comparing with `value[t-1]`.
//!
//! ```text
//! r[t] = (V[t] - CF[t] - V[t-1]) / V[t-1]      (0 when V[t-1] ≈ 0)
//! cumulative[a, b] = Π (1 + r[t]) - 1,  t = a+1 ..= b
//! ```

use crate::domain::axis::Axis;
use crate::domain::valuation::ValuationPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior values at or below this are treated as "nothing invested yet".
pub const VALUE_EPSILON: f64 = 1e-9;

/// Fractional return of the transition ending on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub r: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwrResult {
    pub cumulative_return: f64,
    pub daily: Vec<DailyReturn>,
}

/// Cumulative return expressed in percent on one axis day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub percent: f64,
}

pub fn daily_return(value: f64, previous: f64, cashflow: f64) -> f64 {
    let v = value.max(0.0);
    let vp = previous.max(0.0);
    if vp <= VALUE_EPSILON {
        return 0.0;
    }
    (v - cashflow - vp) / vp
}

/// One [`DailyReturn`] per transition of `values`. Fewer than two points yield
/// a zero cumulative return and no daily entries.
pub fn compute_twr(values: &[ValuationPoint], external: &BTreeMap<NaiveDate, f64>) -> TwrResult {
    if values.len() <= 1 {
        return TwrResult {
            cumulative_return: 0.0,
            daily: Vec::new(),
        };
    }

    let daily: Vec<DailyReturn> = values
        .windows(2)
        .map(|w| {
            let cf = external.get(&w[1].date).copied().unwrap_or(0.0);
            DailyReturn {
                date: w[1].date,
                r: daily_return(w[1].value, w[0].value, cf),
            }
        })
        .collect();

    TwrResult {
        cumulative_return: chain(&daily),
        daily,
    }
}

pub fn chain(daily: &[DailyReturn]) -> f64 {
    daily.iter().fold(1.0, |acc, d| acc * (1.0 + d.r)) - 1.0
}

/// Cumulative return between axis indices `a` and `b` (`a ≤ b`). `daily[t-1]`
/// holds the transition ending on axis day `t`, so the range covers
/// `daily[a..b]`. Out-of-range indices are clamped.
pub fn chain_range(daily: &[DailyReturn], a: usize, b: usize) -> f64 {
    let hi = b.min(daily.len());
    let lo = a.min(hi);
    chain(&daily[lo..hi])
}

/// Running cumulative return in percent, one point per axis day, starting at 0.
pub fn cumulative_series(axis: &Axis, daily: &[DailyReturn]) -> Vec<ReturnPoint> {
    let mut growth = 1.0;
    let mut points = Vec::with_capacity(axis.len());
    if let Some(first) = axis.first() {
        points.push(ReturnPoint {
            date: first,
            percent: 0.0,
        });
    }
    for d in daily {
        growth *= 1.0 + d.r;
        points.push(ReturnPoint {
            date: d.date,
            percent: (growth - 1.0) * 100.0,
        });
    }
    points
}
