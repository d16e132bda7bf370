//! Holding lots and their per-instrument quantity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One lot of an instrument. Several lots of the same instrument may coexist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument_id: String,
    pub quantity: f64,
    pub unit_cost: f64,
    pub acquired_on: NaiveDate,
}

/// Sum every lot per instrument. Lots are added, never replaced.
pub fn aggregate_lots(lots: &[Position]) -> BTreeMap<String, f64> {
    let mut quantities = BTreeMap::new();
    for lot in lots {
        if !lot.quantity.is_finite() {
            tracing::warn!(
                instrument = %lot.instrument_id,
                "skipping lot with non-finite quantity"
            );
            continue;
        }
        *quantities.entry(lot.instrument_id.clone()).or_insert(0.0) += lot.quantity;
    }
    quantities
}
