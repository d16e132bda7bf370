//! Price observations and the two forward-fill policies.
//!
//! Instruments and benchmarks fill differently before their first observed
//! close: an instrument contributes nothing yet ([`fill_zero`]), a benchmark has
//! no value at all ([`fill_carry`]).

use crate::domain::axis::Axis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: Option<f64>) -> Self {
        Self { date, close }
    }

    /// The close, when present and finite.
    pub fn observed(&self) -> Option<f64> {
        self.close.filter(|c| c.is_finite())
    }
}

/// Carry the last observed close onto every axis day. Days before the first
/// observation stay `None`.
pub fn fill_carry(history: &[PricePoint], axis: &Axis) -> Vec<Option<f64>> {
    let mut sorted: Vec<&PricePoint> = history.iter().filter(|p| p.observed().is_some()).collect();
    sorted.sort_by_key(|p| p.date);

    let mut filled = Vec::with_capacity(axis.len());
    let mut cursor = 0;
    let mut last: Option<f64> = None;

    for day in axis.days() {
        while cursor < sorted.len() && sorted[cursor].date <= *day {
            last = sorted[cursor].observed();
            cursor += 1;
        }
        filled.push(last);
    }

    filled
}

/// Instrument fill: same carry as [`fill_carry`] but 0 before the first close.
pub fn fill_zero(history: &[PricePoint], axis: &Axis) -> Vec<f64> {
    fill_carry(history, axis)
        .into_iter()
        .map(|c| c.unwrap_or(0.0))
        .collect()
}
