//! Daily total-value series built from instrument price histories.

use crate::domain::axis::Axis;
use crate::domain::price::{fill_zero, PricePoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Price history and as-of-now held quantity of one instrument.
#[derive(Debug, Clone, Default)]
pub struct InstrumentSeries {
    pub history: Vec<PricePoint>,
    pub quantity: f64,
}

/// One point per axis day: `Σ quantity × zero-filled close`.
pub fn build_valuation_series(
    instruments: &BTreeMap<String, InstrumentSeries>,
    axis: &Axis,
) -> Vec<ValuationPoint> {
    let mut totals = vec![0.0_f64; axis.len()];

    for (id, instrument) in instruments {
        if instrument.quantity == 0.0 || !instrument.quantity.is_finite() {
            tracing::debug!(instrument = %id, "instrument holds no quantity, contributes 0");
            continue;
        }
        if instrument.history.is_empty() {
            tracing::debug!(instrument = %id, "no price history, contributes 0");
            continue;
        }
        for (total, close) in totals.iter_mut().zip(fill_zero(&instrument.history, axis)) {
            *total += close * instrument.quantity;
        }
    }

    axis.days()
        .iter()
        .zip(totals)
        .map(|(&date, value)| ValuationPoint { date, value })
        .collect()
}

/// Add a per-axis-day cash series to an instrument valuation. Missing cash
/// entries count as 0.
pub fn combine(instruments: &[ValuationPoint], cash: &[f64]) -> Vec<ValuationPoint> {
    instruments
        .iter()
        .enumerate()
        .map(|(i, p)| ValuationPoint {
            date: p.date,
            value: p.value + cash.get(i).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Re-key a series onto `axis`. Axis days absent from `values` read as 0.
pub fn align(values: &[ValuationPoint], axis: &Axis) -> Vec<ValuationPoint> {
    let by_day: BTreeMap<NaiveDate, f64> = values.iter().map(|p| (p.date, p.value)).collect();
    axis.days()
        .iter()
        .map(|&date| ValuationPoint {
            date,
            value: by_day.get(&date).copied().unwrap_or(0.0),
        })
        .collect()
}
