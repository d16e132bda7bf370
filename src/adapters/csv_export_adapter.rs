//! CSV export of analysis series.
//!
//! Writes `valuations.csv` (`date,value`), `returns.csv` (`date,percent`)
//! and one `benchmark_<id>.csv` (`date,percent`) per benchmark into the
//! output directory.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::FolioError;
use crate::ports::export_port::ExportPort;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvExportAdapter {
    out_dir: PathBuf,
    /// Export the downsampled display series instead of the full daily ones.
    display: bool,
}

#[derive(Debug, Serialize)]
struct ValueRow {
    date: NaiveDate,
    value: f64,
}

#[derive(Debug, Serialize)]
struct PercentRow {
    date: NaiveDate,
    percent: Option<f64>,
}

impl CsvExportAdapter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            display: false,
        }
    }

    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), FolioError> {
        let export_err = |e: csv::Error| FolioError::Export {
            reason: format!("{}: {}", path.display(), e),
        };
        let mut wtr = csv::Writer::from_path(path).map_err(export_err)?;
        for row in rows {
            wtr.serialize(row).map_err(export_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Ids can come from the config file; keep file names tame.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

impl ExportPort for CsvExportAdapter {
    fn write_report(&self, report: &AnalysisReport) -> Result<(), FolioError> {
        fs::create_dir_all(&self.out_dir)?;

        let (valuations, cumulative) = if self.display {
            (&report.display.valuations, &report.display.cumulative)
        } else {
            (&report.valuations, &report.cumulative)
        };

        Self::write_rows(
            &self.out_dir.join("valuations.csv"),
            valuations.iter().map(|p| ValueRow {
                date: p.date,
                value: p.value,
            }),
        )?;
        Self::write_rows(
            &self.out_dir.join("returns.csv"),
            cumulative.iter().map(|p| PercentRow {
                date: p.date,
                percent: Some(p.percent),
            }),
        )?;

        for benchmark in &report.benchmarks {
            let points = if self.display {
                report
                    .display
                    .benchmarks
                    .iter()
                    .find(|(id, _)| *id == benchmark.id)
                    .map(|(_, points)| points.as_slice())
                    .unwrap_or(&[])
            } else {
                benchmark.series.points.as_slice()
            };
            let path = self
                .out_dir
                .join(format!("benchmark_{}.csv", file_safe(&benchmark.id)));
            Self::write_rows(
                &path,
                points.iter().map(|p| PercentRow {
                    date: p.date,
                    percent: p.pct,
                }),
            )?;
        }

        tracing::info!(dir = %self.out_dir.display(), benchmarks = report.benchmarks.len(), "exported series");
        Ok(())
    }
}
