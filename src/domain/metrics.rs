//! Derived statistics over a daily return series.
//!
//! Every function tolerates empty or singleton input and returns its neutral
//! value instead of failing.

use super::twr::{chain, DailyReturn, VALUE_EPSILON};
use super::valuation::ValuationPoint;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFreeRate {
    pub daily_rate: f64,
    pub annual_rate: f64,
    pub as_of: Option<NaiveDate>,
}

impl RiskFreeRate {
    pub fn from_annual(annual_rate: f64, as_of: Option<NaiveDate>) -> Self {
        Self {
            daily_rate: annual_rate / TRADING_DAYS_PER_YEAR,
            annual_rate,
            as_of,
        }
    }

    pub fn zero() -> Self {
        Self::from_annual(0.0, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub period_return: f64,
    pub cagr: f64,
    pub volatility_annualized: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub months_positive: usize,
    pub months_negative: usize,
}

impl StatsSummary {
    pub fn compute(
        daily: &[DailyReturn],
        valuations: &[ValuationPoint],
        risk_free: &RiskFreeRate,
    ) -> Self {
        let months = monthly_counts(daily);
        StatsSummary {
            period_return: chain(daily),
            cagr: cagr(daily),
            volatility_annualized: annualized_volatility(daily),
            sharpe: sharpe_ratio(daily, risk_free.daily_rate),
            max_drawdown: max_drawdown(valuations),
            win_rate: win_rate(daily),
            months_positive: months.positive,
            months_negative: months.negative,
        }
    }
}

/// Sub-year periods report the plain compounded return; only periods of a
/// year or more are annualized.
pub fn cagr(daily: &[DailyReturn]) -> f64 {
    let total = chain(daily);
    let years = elapsed_days(daily) as f64 / CALENDAR_DAYS_PER_YEAR;
    if years < 1.0 {
        return total;
    }
    let growth = 1.0 + total;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Calendar days covered by the returns, counting the day before the first
/// one. Equals the transition count on a calendar axis and stays in calendar
/// time on a trading axis.
fn elapsed_days(daily: &[DailyReturn]) -> i64 {
    match (daily.first(), daily.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days() + 1,
        _ => 0,
    }
}

fn mean_and_stdev(daily: &[DailyReturn]) -> Option<(f64, f64)> {
    if daily.len() <= 1 {
        return None;
    }
    let n = daily.len() as f64;
    let mean = daily.iter().map(|d| d.r).sum::<f64>() / n;
    let variance = daily.iter().map(|d| (d.r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Sample standard deviation of daily returns scaled by √252.
pub fn annualized_volatility(daily: &[DailyReturn]) -> f64 {
    mean_and_stdev(daily)
        .map(|(_, stdev)| stdev * TRADING_DAYS_PER_YEAR.sqrt())
        .unwrap_or(0.0)
}

pub fn sharpe_ratio(daily: &[DailyReturn], risk_free_daily: f64) -> Option<f64> {
    let (mean, stdev) = mean_and_stdev(daily)?;
    if stdev <= f64::EPSILON {
        return None;
    }
    Some((mean - risk_free_daily) / stdev * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Most negative `value / running_peak - 1`, always in `[-1, 0]` for
/// non-negative series. Points before anything is invested are skipped.
pub fn max_drawdown(valuations: &[ValuationPoint]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;

    for point in valuations {
        if point.value > peak {
            peak = point.value;
        }
        if peak <= VALUE_EPSILON {
            continue;
        }
        let dd = (point.value.max(0.0) / peak) - 1.0;
        if dd < worst {
            worst = dd;
        }
    }

    worst
}

pub fn win_rate(daily: &[DailyReturn]) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }
    daily.iter().filter(|d| d.r > 0.0).count() as f64 / daily.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonthlyCounts {
    pub positive: usize,
    pub negative: usize,
}

/// Compounded return per calendar month, keyed by `(year, month)`.
pub fn monthly_returns(daily: &[DailyReturn]) -> BTreeMap<(i32, u32), f64> {
    let mut growth: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for d in daily {
        *growth.entry((d.date.year(), d.date.month())).or_insert(1.0) *= 1.0 + d.r;
    }
    growth.into_iter().map(|(k, g)| (k, g - 1.0)).collect()
}

/// Months with an exactly flat compounded return count toward neither side.
pub fn monthly_counts(daily: &[DailyReturn]) -> MonthlyCounts {
    monthly_returns(daily)
        .values()
        .fold(MonthlyCounts::default(), |mut acc, &r| {
            if r > 0.0 {
                acc.positive += 1;
            } else if r < 0.0 {
                acc.negative += 1;
            }
            acc
        })
}
