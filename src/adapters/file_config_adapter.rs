//! INI file configuration adapter.

use crate::domain::error::FolioError;
use crate::domain::metrics::RiskFreeRate;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::RiskFreeRatePort;
use chrono::NaiveDate;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    /// Comma-separated list, blanks dropped.
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.config
            .get(section, key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

/// `[analysis] risk_free_rate` (annual, default 0) and optional
/// `risk_free_as_of`.
impl RiskFreeRatePort for FileConfigAdapter {
    fn risk_free_rate(&self) -> Result<RiskFreeRate, FolioError> {
        let annual = match self.config.get("analysis", "risk_free_rate") {
            None => 0.0,
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| FolioError::ConfigInvalid {
                section: "analysis".to_string(),
                key: "risk_free_rate".to_string(),
                reason: format!("'{}' is not a number", raw),
            })?,
        };
        let as_of = match self.config.get("analysis", "risk_free_as_of") {
            None => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(
                |_| FolioError::ConfigInvalid {
                    section: "analysis".to_string(),
                    key: "risk_free_as_of".to_string(),
                    reason: "expected YYYY-MM-DD".to_string(),
                },
            )?),
        };
        Ok(RiskFreeRate::from_annual(annual, as_of))
    }
}
