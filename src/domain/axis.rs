//! Shared calendar axis every series in one computation is aligned to.

use crate::domain::price::PricePoint;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::str::FromStr;

/// How the analysis axis is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisMode {
    /// Every calendar day.
    #[default]
    Calendar,
    /// Only days carrying at least one observed price.
    Trading,
}

impl FromStr for AxisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "calendar" | "daily" => Ok(AxisMode::Calendar),
            "trading" => Ok(AxisMode::Trading),
            other => Err(format!("unknown axis mode '{other}' (expected calendar or trading)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Axis {
    days: Vec<NaiveDate>,
}

impl Axis {
    /// Every calendar day from `start` to `end` inclusive.
    pub fn daily(start: NaiveDate, end: NaiveDate) -> Self {
        let days = start
            .iter_days()
            .take_while(|d| *d <= end)
            .collect();
        Self { days }
    }

    /// Sorted, de-duplicated set of days.
    pub fn from_days<I: IntoIterator<Item = NaiveDate>>(days: I) -> Self {
        let unique: BTreeSet<NaiveDate> = days.into_iter().collect();
        Self {
            days: unique.into_iter().collect(),
        }
    }

    /// Union of every day carrying an observed close, clipped to `[start, end]`.
    pub fn trading_days<'a, I>(histories: I, start: NaiveDate, end: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a [PricePoint]>,
    {
        Self::from_days(
            histories
                .into_iter()
                .flat_map(|h| h.iter())
                .filter(|p| p.observed().is_some())
                .map(|p| p.date)
                .filter(|d| *d >= start && *d <= end),
        )
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.days.last().copied()
    }

    /// Index of the first axis day on or after `day`. Never snaps backward;
    /// `None` when `day` falls after the last axis day.
    pub fn snap_index(&self, day: NaiveDate) -> Option<usize> {
        let idx = self.days.partition_point(|d| *d < day);
        (idx < self.days.len()).then_some(idx)
    }

    /// Index of the last axis day on or before `day`.
    pub fn floor_index(&self, day: NaiveDate) -> Option<usize> {
        self.days.partition_point(|d| *d <= day).checked_sub(1)
    }

    pub fn snap(&self, day: NaiveDate) -> Option<NaiveDate> {
        self.snap_index(day).map(|i| self.days[i])
    }

    /// Sub-axis holding the days within `[start, end]`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Axis {
        let lo = self.days.partition_point(|d| *d < start);
        let hi = self.days.partition_point(|d| *d <= end);
        Axis {
            days: self.days[lo..hi.max(lo)].to_vec(),
        }
    }
}
