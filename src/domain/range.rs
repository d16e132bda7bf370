//! Display ranges selectable for a performance view.

use chrono::{Datelike, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRange {
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    ThreeYears,
    FiveYears,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("unknown range '{0}' (expected 1m, 3m, 6m, ytd, 1y, 3y, 5y or all)")]
    Unknown(String),
}

impl FromStr for DisplayRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(DisplayRange::OneMonth),
            "3m" => Ok(DisplayRange::ThreeMonths),
            "6m" => Ok(DisplayRange::SixMonths),
            "ytd" => Ok(DisplayRange::YearToDate),
            "1y" => Ok(DisplayRange::OneYear),
            "3y" => Ok(DisplayRange::ThreeYears),
            "5y" => Ok(DisplayRange::FiveYears),
            "all" | "max" => Ok(DisplayRange::All),
            other => Err(RangeError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for DisplayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisplayRange::OneMonth => "1m",
            DisplayRange::ThreeMonths => "3m",
            DisplayRange::SixMonths => "6m",
            DisplayRange::YearToDate => "ytd",
            DisplayRange::OneYear => "1y",
            DisplayRange::ThreeYears => "3y",
            DisplayRange::FiveYears => "5y",
            DisplayRange::All => "all",
        };
        f.write_str(s)
    }
}

impl DisplayRange {
    /// First day of the range ending on `end`, never earlier than `inception`.
    pub fn start_for(&self, end: NaiveDate, inception: NaiveDate) -> NaiveDate {
        let months_back = |m: u32| end.checked_sub_months(Months::new(m)).unwrap_or(inception);
        let start = match self {
            DisplayRange::OneMonth => months_back(1),
            DisplayRange::ThreeMonths => months_back(3),
            DisplayRange::SixMonths => months_back(6),
            DisplayRange::YearToDate => {
                // The base is the last day of the previous year.
                NaiveDate::from_ymd_opt(end.year(), 1, 1)
                    .and_then(|jan1| jan1.pred_opt())
                    .unwrap_or(inception)
            }
            DisplayRange::OneYear => months_back(12),
            DisplayRange::ThreeYears => months_back(36),
            DisplayRange::FiveYears => months_back(60),
            DisplayRange::All => inception,
        };
        start.max(inception)
    }
}
