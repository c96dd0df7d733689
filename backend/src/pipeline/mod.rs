//! The ingestion, validation and bulk update pipeline.
//!
//! Data flows one way through the stages:
//!
//! - [`parser`] turns a [`RawUpload`] into an ordered [`IdentifierSet`].
//! - [`validator`] partitions it into a [`ValidationOutcome`] using the
//!   identifier validation service.
//! - [`reporter`] builds an [`InvalidReport`] from the invalid partition and
//!   hands it to a [`reporter::ReportExporter`].
//! - [`updater`] applies the selected options to the valid partition.
//! - [`orchestrator`] sequences the stages, enforces limits and owns the
//!   per-cycle state machine.
//!
//! Every stage output is a fresh value; nothing is mutated after creation.

pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod reporter;
pub mod updater;
pub mod validator;

#[cfg(test)]
pub mod testing;

use crate::config::AppConfig;
use std::time::Duration;

/// A file handed over by the file selection boundary.
///
/// The declared size is known before any parsing happens. The bytes may be
/// truncated when the upload exceeded the size limit; in that case the
/// declared size still reflects the full upload and the cycle is rejected
/// before the bytes are looked at.
#[derive(Debug, Clone)]
pub struct RawUpload {
    file_name: String,
    declared_size: u64,
    bytes: Vec<u8>,
}

impl RawUpload {
    #[cfg(test)]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self::with_declared_size(file_name, declared_size, bytes)
    }

    pub fn with_declared_size(
        file_name: impl Into<String>,
        declared_size: u64,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            declared_size,
            bytes,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Case-insensitive check for the `.csv` extension.
    pub fn has_csv_extension(&self) -> bool {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

/// Ordered identifiers, each trimmed, free of `\r`/`\n` and non-empty.
/// Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet(Vec<String>);

impl IdentifierSet {
    /// Builds a set from values already known to satisfy the invariant.
    pub(crate) fn from_normalized(ids: Vec<String>) -> Self {
        debug_assert!(ids
            .iter()
            .all(|id| !id.is_empty() && !id.contains(['\r', '\n'])));
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a IdentifierSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Total partition of an [`IdentifierSet`], both halves in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: IdentifierSet,
    pub invalid: IdentifierSet,
}

/// Tabular invalid-ID report: a header row followed by one row per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReport {
    rows: Vec<Vec<String>>,
}

impl InvalidReport {
    pub const HEADER: &'static str = "Invalid IDs";

    pub(crate) fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// All rows, header included.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of identifier rows, header excluded.
    pub fn len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Limits and timeouts the orchestrator enforces on every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_file_size_bytes: u64,
    /// Header-inclusive.
    pub max_rows: usize,
    pub validation_timeout: Duration,
    pub update_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1_500_000,
            max_rows: 10_000,
            validation_timeout: Duration::from_secs(30),
            update_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_file_size_bytes: config.limits.max_file_size_bytes,
            max_rows: config.limits.max_rows,
            validation_timeout: Duration::from_secs(config.remote.validation_timeout_secs),
            update_timeout: Duration::from_secs(config.remote.update_timeout_secs),
        }
    }
}
