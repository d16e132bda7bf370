//! Ledger classification and snapping of cashflows onto the axis.
//!
//! External flows (money entering or leaving the investor's control) are netted
//! out of the time-weighted return. Internal flows already show up in the cash
//! sub-balance or the held-asset valuation and must never reach the external map.

use crate::domain::axis::Axis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashflowKind {
    Deposit,
    Withdraw,
    Dividend,
    Fee,
    Buy,
    Sell,
    Correction,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cashflow kind: {0}")]
pub struct UnknownKind(pub String);

impl CashflowKind {
    pub fn flow_type(self) -> FlowType {
        classify(self)
    }
}

impl FromStr for CashflowKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(CashflowKind::Deposit),
            "withdraw" | "withdrawal" => Ok(CashflowKind::Withdraw),
            "dividend" => Ok(CashflowKind::Dividend),
            "fee" => Ok(CashflowKind::Fee),
            "buy" => Ok(CashflowKind::Buy),
            "sell" => Ok(CashflowKind::Sell),
            "correction" => Ok(CashflowKind::Correction),
            "manual" => Ok(CashflowKind::Manual),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for CashflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CashflowKind::Deposit => "deposit",
            CashflowKind::Withdraw => "withdraw",
            CashflowKind::Dividend => "dividend",
            CashflowKind::Fee => "fee",
            CashflowKind::Buy => "buy",
            CashflowKind::Sell => "sell",
            CashflowKind::Correction => "correction",
            CashflowKind::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Signed base-currency amount: positive enters the portfolio, negative leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowEvent {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: CashflowKind,
    pub exclude_from_return: bool,
    pub is_reversal: bool,
    pub linked_position_id: Option<String>,
}

impl CashflowEvent {
    pub fn new(date: NaiveDate, amount: f64, kind: CashflowKind) -> Self {
        Self {
            date,
            amount,
            kind,
            exclude_from_return: false,
            is_reversal: false,
            linked_position_id: None,
        }
    }

    /// Exclusion wins over everything else: flagged or non-finite entries
    /// never affect returns.
    pub fn affects_return(&self) -> bool {
        !self.exclude_from_return && !self.is_reversal && self.amount.is_finite()
    }
}

/// Ledger row as handed over by a ledger provider, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCashflowRecord {
    #[serde(default)]
    pub entity: String,
    pub date: String,
    pub amount: Option<f64>,
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub exclude_from_return: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_reversal: bool,
    #[serde(default)]
    pub linked_position_id: Option<String>,
}

/// Blank, `0`, `false` and `no` read as false.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(matches!(
        raw.as_deref().map(|s| s.trim().to_lowercase()).as_deref(),
        Some("true" | "yes" | "1" | "y")
    ))
}

/// Validate raw ledger rows; malformed rows are skipped without aborting the rest.
pub fn parse_records(records: &[RawCashflowRecord]) -> Vec<CashflowEvent> {
    records
        .iter()
        .filter_map(|raw| {
            let date = match NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(date = %raw.date, error = %e, "skipping cashflow with unparseable date");
                    return None;
                }
            };
            let kind = match raw.kind.parse::<CashflowKind>() {
                Ok(k) => k,
                Err(e) => {
                    tracing::warn!(%date, error = %e, "skipping cashflow");
                    return None;
                }
            };
            let amount = match raw.amount {
                Some(a) if a.is_finite() => a,
                _ => {
                    tracing::warn!(%date, %kind, "skipping cashflow with missing or non-finite amount");
                    return None;
                }
            };
            Some(CashflowEvent {
                date,
                amount,
                kind,
                exclude_from_return: raw.exclude_from_return,
                is_reversal: raw.is_reversal,
                linked_position_id: raw
                    .linked_position_id
                    .clone()
                    .filter(|s| !s.trim().is_empty()),
            })
        })
        .collect()
}

pub fn classify(kind: CashflowKind) -> FlowType {
    match kind {
        CashflowKind::Deposit
        | CashflowKind::Withdraw
        | CashflowKind::Correction
        | CashflowKind::Manual => FlowType::External,
        CashflowKind::Dividend | CashflowKind::Fee | CashflowKind::Buy | CashflowKind::Sell => {
            FlowType::Internal
        }
    }
}

pub fn is_external(event: &CashflowEvent) -> bool {
    event.affects_return() && classify(event.kind) == FlowType::External
}

/// Snap every event matching `keep` onto the axis and sum per axis day.
fn snap_and_sum<F>(events: &[CashflowEvent], axis: &Axis, keep: F) -> BTreeMap<NaiveDate, f64>
where
    F: Fn(&CashflowEvent) -> bool,
{
    let mut by_day = BTreeMap::new();
    for event in events.iter().filter(|e| keep(e)) {
        match axis.snap(event.date) {
            Some(day) => *by_day.entry(day).or_insert(0.0) += event.amount,
            None => tracing::debug!(
                date = %event.date,
                kind = %event.kind,
                "cashflow falls after axis end, dropped"
            ),
        }
    }
    by_day
}

/// Day → summed external amount, defined over a subset of axis days. Days not
/// present in the map carry no cashflow.
pub fn external_cashflows(events: &[CashflowEvent], axis: &Axis) -> BTreeMap<NaiveDate, f64> {
    snap_and_sum(events, axis, is_external)
}

/// Which ledger entries move the reconstructed cash balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CashScope {
    /// Dividends, fees, buys and sells only. External flows then never reach
    /// the valuation, so use this only when they are tracked outside the
    /// reported end balance.
    Internal,
    /// Every entry that affects returns, external ones included. An external
    /// flow subtracted as CF also lands in V, keeping deposits return-neutral.
    #[default]
    AllFlows,
}

impl FromStr for CashScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "internal" => Ok(CashScope::Internal),
            "all" | "all_flows" => Ok(CashScope::AllFlows),
            other => Err(format!("unknown cash scope '{other}' (expected internal or all)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashBalance {
    /// One balance per axis day.
    pub series: Vec<f64>,
    pub initial_balance: f64,
    /// The starting balance is derived backward from the end balance, so any
    /// ledger entry missing from the range is silently absorbed into it.
    pub assumes_complete_ledger: bool,
}

/// Rebuild a daily cash balance backward from a known balance at the axis end:
/// `initial = end_balance - Σ amounts in range`, then a running sum.
pub fn reconstruct_cash_balance(
    events: &[CashflowEvent],
    axis: &Axis,
    end_balance: f64,
    scope: CashScope,
) -> CashBalance {
    let moves = snap_and_sum(events, axis, |e| {
        e.affects_return()
            && match scope {
                CashScope::Internal => classify(e.kind) == FlowType::Internal,
                CashScope::AllFlows => true,
            }
    });

    let in_range: f64 = moves.values().sum();
    let initial_balance = end_balance - in_range;
    tracing::debug!(
        initial_balance,
        end_balance,
        entries = moves.len(),
        "reconstructed cash balance assumes a complete ledger for the axis range"
    );

    let mut running = initial_balance;
    let series = axis
        .days()
        .iter()
        .map(|day| {
            running += moves.get(day).copied().unwrap_or(0.0);
            running
        })
        .collect();

    CashBalance {
        series,
        initial_balance,
        assumes_complete_ledger: true,
    }
}
