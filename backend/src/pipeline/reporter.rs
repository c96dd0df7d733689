//! Builds and exports the invalid-ID report.

use crate::error::ReportExportError;
use crate::pipeline::{IdentifierSet, InvalidReport};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Turns a report into a downloadable file.
///
/// Resolved once at start-up and injected into the orchestrator.
pub trait ReportExporter: Send + Sync {
    fn export(&self, report: &InvalidReport) -> Result<(), ReportExportError>;
}

pub struct InvalidRecordReporter;

impl InvalidRecordReporter {
    /// Returns `None` for an empty set; otherwise a single `Invalid IDs`
    /// header row followed by one row per identifier, in order.
    pub fn build_report(invalid_ids: &IdentifierSet) -> Option<InvalidReport> {
        if invalid_ids.is_empty() {
            return None;
        }
        let rows = std::iter::once(vec![InvalidReport::HEADER.to_string()])
            .chain(invalid_ids.iter().map(|id| vec![id.clone()]))
            .collect();
        Some(InvalidReport::new(rows))
    }
}

/// Writes the report as a CSV file at a fixed path, replacing any earlier one.
pub struct CsvReportExporter {
    path: PathBuf,
}

impl CsvReportExporter {
    pub fn new(output_dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: output_dir.as_ref().join(file_name),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportExporter for CsvReportExporter {
    fn export(&self, report: &InvalidReport) -> Result<(), ReportExportError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        for row in report.rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(
            "Exported {} invalid IDs to {}",
            report.len(),
            self.path.display()
        );
        Ok(())
    }
}
