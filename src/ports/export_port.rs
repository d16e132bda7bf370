//! Flat-file export of analysis results.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::FolioError;

/// Port for writing `(date, value)` and `(date, percent)` series.
pub trait ExportPort {
    fn write_report(&self, report: &AnalysisReport) -> Result<(), FolioError>;
}
