//! End-to-end analysis pass over one snapshot of inputs.
//!
//! Per entity: valuation + reconstructed cash → [`EntitySnapshot`]. Snapshots
//! are summed by the aggregator, then [`analyze`] runs returns, statistics and
//! benchmark normalization over the full daily axis of the selected range.
//! Downsampling happens last and only touches the `display` block.

use crate::domain::aggregator::EntitySnapshot;
use crate::domain::axis::Axis;
use crate::domain::benchmark::{benchmark_cagr, normalize_benchmark, BenchmarkPoint, BenchmarkSeries};
use crate::domain::cashflow::{external_cashflows, reconstruct_cash_balance, CashScope, CashflowEvent};
use crate::domain::downsample::DownsamplePolicy;
use crate::domain::metrics::{RiskFreeRate, StatsSummary};
use crate::domain::price::PricePoint;
use crate::domain::range::DisplayRange;
use crate::domain::twr::{compute_twr, cumulative_series, DailyReturn, ReturnPoint};
use crate::domain::valuation::{align, build_valuation_series, combine, InstrumentSeries, ValuationPoint};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct EntityInputs {
    pub instruments: BTreeMap<String, InstrumentSeries>,
    pub cashflows: Vec<CashflowEvent>,
    /// Known cash balance on the last axis day; `None` leaves cash out.
    pub cash_end_balance: Option<f64>,
}

pub fn build_snapshot(inputs: &EntityInputs, axis: &Axis, scope: CashScope) -> EntitySnapshot {
    let instruments = build_valuation_series(&inputs.instruments, axis);
    let valuations = match inputs.cash_end_balance {
        Some(end_balance) => {
            let cash = reconstruct_cash_balance(&inputs.cashflows, axis, end_balance, scope);
            combine(&instruments, &cash.series)
        }
        None => instruments,
    };
    EntitySnapshot {
        valuations,
        cashflows: inputs.cashflows.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub range: DisplayRange,
    pub risk_free: RiskFreeRate,
    pub downsample: DownsamplePolicy,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            range: DisplayRange::All,
            risk_free: RiskFreeRate::zero(),
            downsample: DownsamplePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub id: String,
    pub series: BenchmarkSeries,
    pub cagr: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplaySeries {
    pub downsampled: bool,
    pub valuations: Vec<ValuationPoint>,
    pub cumulative: Vec<ReturnPoint>,
    pub benchmarks: Vec<(String, Vec<BenchmarkPoint>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub range: DisplayRange,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub valuations: Vec<ValuationPoint>,
    pub daily: Vec<DailyReturn>,
    pub cumulative: Vec<ReturnPoint>,
    pub stats: StatsSummary,
    pub benchmarks: Vec<BenchmarkReport>,
    pub display: DisplaySeries,
}

/// Sub-axis for `range`. The base day is the last axis day on or before the
/// range start, so its own return is not counted.
pub fn range_axis(axis: &Axis, range: DisplayRange) -> Axis {
    let (Some(inception), Some(end)) = (axis.first(), axis.last()) else {
        return Axis::default();
    };
    let start = range.start_for(end, inception);
    let base = axis
        .floor_index(start)
        .map(|i| axis.days()[i])
        .unwrap_or(inception);
    axis.slice(base, end)
}

pub fn analyze(
    snapshot: &EntitySnapshot,
    axis: &Axis,
    settings: &AnalysisSettings,
    benchmarks: &[(String, Vec<PricePoint>)],
) -> AnalysisReport {
    let axis = range_axis(axis, settings.range);
    let valuations = align(&snapshot.valuations, &axis);
    let external = external_cashflows(&snapshot.cashflows, &axis);

    tracing::debug!(
        range = %settings.range,
        days = axis.len(),
        cashflow_days = external.len(),
        "running analysis"
    );

    let twr = compute_twr(&valuations, &external);
    let stats = StatsSummary::compute(&twr.daily, &valuations, &settings.risk_free);
    let cumulative = cumulative_series(&axis, &twr.daily);

    let benchmarks: Vec<BenchmarkReport> = benchmarks
        .iter()
        .map(|(id, history)| {
            let series = normalize_benchmark(history, &axis);
            if series.reference_close.is_none() {
                tracing::warn!(benchmark = %id, "benchmark has no usable close in range");
            }
            BenchmarkReport {
                id: id.clone(),
                cagr: benchmark_cagr(&series),
                series,
            }
        })
        .collect();

    let policy = settings.downsample;
    let downsampled = match (axis.first(), axis.last()) {
        (Some(first), Some(last)) => policy.applies(first, last),
        _ => false,
    };
    let display = DisplaySeries {
        downsampled,
        valuations: policy.apply(&valuations),
        cumulative: policy.apply(&cumulative),
        benchmarks: benchmarks
            .iter()
            .map(|b| (b.id.clone(), policy.apply(&b.series.points)))
            .collect(),
    };

    AnalysisReport {
        range: settings.range,
        start: axis.first(),
        end: axis.last(),
        valuations,
        daily: twr.daily,
        cumulative,
        stats,
        benchmarks,
        display,
    }
}
