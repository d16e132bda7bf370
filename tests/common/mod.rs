#![allow(dead_code)]

use chrono::NaiveDate;
use folioperf::domain::aggregator::{EntityKey, EntitySnapshot};
use folioperf::domain::axis::Axis;
use folioperf::domain::cashflow::{CashflowEvent, CashflowKind};
use folioperf::domain::error::FolioError;
use folioperf::domain::position::Position;
pub use folioperf::domain::price::PricePoint;
use folioperf::domain::valuation::ValuationPoint;
use folioperf::ports::data_port::{HoldingsPort, LedgerPort, PricePort};
use std::collections::HashMap;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, id: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(id.to_string(), points);
        self
    }

    pub fn with_error(mut self, id: &str, reason: &str) -> Self {
        self.errors.insert(id.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_history(
        &self,
        id: &str,
        _start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, FolioError> {
        if let Some(reason) = self.errors.get(id) {
            return Err(FolioError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(id)
            .map(|h| h.iter().filter(|p| p.date <= end_date).copied().collect())
            .unwrap_or_default())
    }
}

/// Holdings, ledger and cash balances keyed by entity.
#[derive(Default)]
pub struct MockBook {
    pub positions: HashMap<EntityKey, Vec<Position>>,
    pub cashflows: HashMap<EntityKey, Vec<CashflowEvent>>,
    pub balances: HashMap<EntityKey, f64>,
}

impl MockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lot(mut self, entity: &str, id: &str, quantity: f64) -> Self {
        self.positions
            .entry(EntityKey::from_id(entity))
            .or_default()
            .push(Position {
                instrument_id: id.to_string(),
                quantity,
                unit_cost: 1.0,
                acquired_on: date(2020, 1, 1),
            });
        self
    }

    pub fn with_flow(mut self, entity: &str, event: CashflowEvent) -> Self {
        self.cashflows
            .entry(EntityKey::from_id(entity))
            .or_default()
            .push(event);
        self
    }

    pub fn with_balance(mut self, entity: &str, balance: f64) -> Self {
        self.balances.insert(EntityKey::from_id(entity), balance);
        self
    }
}

impl HoldingsPort for MockBook {
    fn entities(&self) -> Result<Vec<EntityKey>, FolioError> {
        let mut keys: Vec<EntityKey> = self
            .positions
            .keys()
            .chain(self.cashflows.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn positions(&self, entity: &EntityKey) -> Result<Vec<Position>, FolioError> {
        Ok(self.positions.get(entity).cloned().unwrap_or_default())
    }

    fn cash_balance(&self, entity: &EntityKey) -> Result<Option<f64>, FolioError> {
        Ok(self.balances.get(entity).copied())
    }
}

impl LedgerPort for MockBook {
    fn cashflows(&self, entity: &EntityKey) -> Result<Vec<CashflowEvent>, FolioError> {
        Ok(self.cashflows.get(entity).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn flow(day: NaiveDate, amount: f64, kind: CashflowKind) -> CashflowEvent {
    CashflowEvent::new(day, amount, kind)
}

/// Closes on consecutive days starting at `start`.
pub fn closes(start: NaiveDate, values: &[f64]) -> Vec<PricePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &c)| PricePoint::new(start + chrono::Days::new(i as u64), Some(c)))
        .collect()
}

pub fn valuations(axis: &Axis, values: &[f64]) -> Vec<ValuationPoint> {
    axis.days()
        .iter()
        .zip(values)
        .map(|(&date, &value)| ValuationPoint { date, value })
        .collect()
}

pub fn snapshot(axis: &Axis, values: &[f64], cashflows: Vec<CashflowEvent>) -> EntitySnapshot {
    EntitySnapshot {
        valuations: valuations(axis, values),
        cashflows,
    }
}
