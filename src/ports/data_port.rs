//! Collaborator ports feeding the analysis core.
//!
//! Providers may fail or return partial data; callers treat a failed fetch
//! as an empty snapshot.

use crate::domain::aggregator::EntityKey;
use crate::domain::cashflow::CashflowEvent;
use crate::domain::error::FolioError;
use crate::domain::metrics::RiskFreeRate;
use crate::domain::position::Position;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

/// Price histories for instruments and benchmarks alike.
pub trait PricePort {
    fn fetch_history(
        &self,
        id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, FolioError>;
}

pub trait HoldingsPort {
    fn entities(&self) -> Result<Vec<EntityKey>, FolioError>;

    /// Every lot held by `entity`.
    fn positions(&self, entity: &EntityKey) -> Result<Vec<Position>, FolioError>;

    /// Known cash balance at the end of the analysed range, if any.
    fn cash_balance(&self, _entity: &EntityKey) -> Result<Option<f64>, FolioError> {
        Ok(None)
    }
}

pub trait LedgerPort {
    fn cashflows(&self, entity: &EntityKey) -> Result<Vec<CashflowEvent>, FolioError>;
}

pub trait RiskFreeRatePort {
    fn risk_free_rate(&self) -> Result<RiskFreeRate, FolioError>;
}
