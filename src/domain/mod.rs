//! Core domain types and logic.

pub mod axis;
pub mod price;
pub mod position;
pub mod valuation;
pub mod cashflow;
pub mod twr;
pub mod metrics;
pub mod aggregator;
pub mod benchmark;
pub mod downsample;
pub mod range;
pub mod analysis;
pub mod config_validation;
pub mod error;
