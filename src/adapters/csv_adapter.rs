//! CSV file data adapter.
//!
//! Layout under the data directory:
//! - `prices/<id>.csv`: `date,close` (blank close = no trade)
//! - `holdings.csv`: `entity,instrument_id,quantity,unit_cost,acquired_on`
//! - `ledger.csv`: `entity,date,amount,kind,exclude_from_return,is_reversal,linked_position_id`
//! - `balances.csv` (optional): `entity,balance`

use crate::domain::aggregator::EntityKey;
use crate::domain::cashflow::{parse_records, CashflowEvent, RawCashflowRecord};
use crate::domain::error::FolioError;
use crate::domain::position::Position;
use crate::domain::price::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{HoldingsPort, LedgerPort, PricePort};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    prices_dir: PathBuf,
    holdings_path: PathBuf,
    ledger_path: PathBuf,
    balances_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    #[serde(default)]
    entity: String,
    instrument_id: String,
    quantity: f64,
    #[serde(default)]
    unit_cost: Option<f64>,
    acquired_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(default)]
    entity: String,
    balance: f64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            prices_dir: base_path.join("prices"),
            holdings_path: base_path.join("holdings.csv"),
            ledger_path: base_path.join("ledger.csv"),
            balances_path: base_path.join("balances.csv"),
        }
    }

    /// `[data] dir` is required; the individual file keys override the
    /// default names relative to it.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FolioError> {
        let base = config
            .get_string("data", "dir")
            .map(PathBuf::from)
            .ok_or_else(|| FolioError::ConfigMissing {
                section: "data".into(),
                key: "dir".into(),
            })?;
        let resolve = |key: &str, default: &str| {
            base.join(config.get_string("data", key).unwrap_or_else(|| default.to_string()))
        };
        Ok(Self {
            prices_dir: resolve("prices_dir", "prices"),
            holdings_path: resolve("holdings", "holdings.csv"),
            ledger_path: resolve("ledger", "ledger.csv"),
            balances_path: resolve("balances", "balances.csv"),
        })
    }

    fn price_path(&self, id: &str) -> PathBuf {
        self.prices_dir.join(format!("{}.csv", id))
    }

    /// Deserialize every row; rows that fail to deserialize are skipped.
    fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, FolioError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| FolioError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut rows = Vec::new();
        for (line, result) in rdr.deserialize::<T>().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!(
                    file = %path.display(),
                    row = line + 1,
                    error = %e,
                    "skipping malformed row"
                ),
            }
        }
        Ok(rows)
    }

    fn holding_rows(&self) -> Result<Vec<HoldingRow>, FolioError> {
        Self::read_rows(&self.holdings_path)
    }

    fn ledger_rows(&self) -> Result<Vec<RawCashflowRecord>, FolioError> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }
        Self::read_rows(&self.ledger_path)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_history(
        &self,
        id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, FolioError> {
        let rows: Vec<PriceRow> = Self::read_rows(&self.price_path(id))?;

        let mut points: Vec<PricePoint> = rows
            .into_iter()
            .filter_map(|row| match NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") {
                Ok(date) => Some(PricePoint::new(date, row.close)),
                Err(e) => {
                    tracing::warn!(instrument = id, date = %row.date, error = %e, "skipping price row");
                    None
                }
            })
            .filter(|p| p.date <= end_date)
            .collect();

        // Keep the last observation before the range so it can seed the fill.
        points.sort_by_key(|p| p.date);
        let seed = points
            .iter()
            .rposition(|p| p.date < start_date && p.observed().is_some());
        let first = seed.unwrap_or_else(|| points.partition_point(|p| p.date < start_date));
        Ok(points.split_off(first))
    }
}

impl HoldingsPort for CsvAdapter {
    fn entities(&self) -> Result<Vec<EntityKey>, FolioError> {
        let mut keys: BTreeSet<EntityKey> = self
            .holding_rows()?
            .iter()
            .map(|r| EntityKey::from_id(&r.entity))
            .collect();
        keys.extend(self.ledger_rows()?.iter().map(|r| EntityKey::from_id(&r.entity)));
        Ok(keys.into_iter().collect())
    }

    fn positions(&self, entity: &EntityKey) -> Result<Vec<Position>, FolioError> {
        Ok(self
            .holding_rows()?
            .into_iter()
            .filter(|r| EntityKey::from_id(&r.entity) == *entity)
            .map(|r| Position {
                instrument_id: r.instrument_id,
                quantity: r.quantity,
                unit_cost: r.unit_cost.unwrap_or(0.0),
                acquired_on: r.acquired_on,
            })
            .collect())
    }

    fn cash_balance(&self, entity: &EntityKey) -> Result<Option<f64>, FolioError> {
        if !self.balances_path.exists() {
            return Ok(None);
        }
        let rows: Vec<BalanceRow> = Self::read_rows(&self.balances_path)?;
        let matching: Vec<f64> = rows
            .into_iter()
            .filter(|r| EntityKey::from_id(&r.entity) == *entity)
            .map(|r| r.balance)
            .collect();
        Ok((!matching.is_empty()).then(|| matching.iter().sum()))
    }
}

impl LedgerPort for CsvAdapter {
    fn cashflows(&self, entity: &EntityKey) -> Result<Vec<CashflowEvent>, FolioError> {
        let rows: Vec<RawCashflowRecord> = self
            .ledger_rows()?
            .into_iter()
            .filter(|r| EntityKey::from_id(&r.entity) == *entity)
            .collect();
        Ok(parse_records(&rows))
    }
}
