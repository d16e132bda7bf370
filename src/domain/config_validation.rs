//! Configuration validation.
//!
//! Validates all config fields before an analysis runs.

use crate::domain::axis::AxisMode;
use crate::domain::cashflow::CashScope;
use crate::domain::error::FolioError;
use crate::domain::range::DisplayRange;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), FolioError> {
    validate_data_dir(config)?;
    validate_dates(config)?;
    validate_risk_free_rate(config)?;
    validate_choice::<DisplayRange>(config, "analysis", "range")?;
    validate_choice::<AxisMode>(config, "analysis", "axis")?;
    validate_choice::<CashScope>(config, "analysis", "cash_scope")?;
    validate_display(config)?;
    Ok(())
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), FolioError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(FolioError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), FolioError> {
    let value = config.get_double("analysis", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(FolioError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), FolioError> {
    let start = parse_optional_date(config, "start_date")?;
    let end = parse_optional_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(FolioError::ConfigInvalid {
                section: "analysis".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok(())
}

/// Missing keys are fine; present keys must be `YYYY-MM-DD`.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<NaiveDate>, FolioError> {
    match config.get_string("analysis", field) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| FolioError::ConfigInvalid {
                section: "analysis".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }),
    }
}

fn validate_choice<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), FolioError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(()),
        Some(s) => s
            .parse::<T>()
            .map(|_| ())
            .map_err(|e| FolioError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn validate_display(config: &dyn ConfigPort) -> Result<(), FolioError> {
    let threshold = config.get_int("display", "downsample_threshold_days", 365);
    if threshold < 0 {
        return Err(FolioError::ConfigInvalid {
            section: "display".to_string(),
            key: "downsample_threshold_days".to_string(),
            reason: "downsample_threshold_days must be non-negative".to_string(),
        });
    }
    let interval = config.get_int("display", "downsample_interval_days", 7);
    if interval < 1 {
        return Err(FolioError::ConfigInvalid {
            section: "display".to_string(),
            key: "downsample_interval_days".to_string(),
            reason: "downsample_interval_days must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                values: HashMap::new(),
            }
        }

        fn set(mut self, section: &str, key: &str, value: &str) -> Self {
            self.values
                .insert((section.to_string(), key.to_string()), value.to_string());
            self
        }

        fn valid() -> Self {
            Self::new()
                .set("data", "dir", "/tmp/data")
                .set("analysis", "start_date", "2023-01-01")
                .set("analysis", "end_date", "2023-12-31")
                .set("analysis", "risk_free_rate", "0.04")
                .set("analysis", "range", "1y")
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .map(|v| v == "true")
                .unwrap_or(default)
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_analysis_config(&MockConfig::valid()).is_ok());
    }

    #[test]
    fn dates_are_optional() {
        let config = MockConfig::new().set("data", "dir", "/tmp");
        assert!(validate_analysis_config(&config).is_ok());
    }

    #[test]
    fn missing_data_dir() {
        let config = MockConfig::new();
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, FolioError::ConfigMissing { key, .. } if key == "dir"));
    }

    #[test]
    fn bad_date_format() {
        let config = MockConfig::valid().set("analysis", "end_date", "31/12/2023");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, FolioError::ConfigInvalid { key, .. } if key == "end_date"));
    }

    #[test]
    fn start_after_end() {
        let config = MockConfig::valid().set("analysis", "start_date", "2024-01-01");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, FolioError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn risk_free_rate_out_of_bounds() {
        let config = MockConfig::valid().set("analysis", "risk_free_rate", "1.5");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, FolioError::ConfigInvalid { key, .. } if key == "risk_free_rate"));
    }

    #[test]
    fn unknown_range_axis_and_scope() {
        for (key, value) in [("range", "2w"), ("axis", "weekly"), ("cash_scope", "partial")] {
            let config = MockConfig::valid().set("analysis", key, value);
            let err = validate_analysis_config(&config).unwrap_err();
            assert!(
                matches!(&err, FolioError::ConfigInvalid { key: k, .. } if k == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn downsample_interval_must_be_positive() {
        let config = MockConfig::valid().set("display", "downsample_interval_days", "0");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(
            matches!(err, FolioError::ConfigInvalid { key, .. } if key == "downsample_interval_days")
        );
    }
}
