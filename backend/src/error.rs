//! Error types for the mass update pipeline.
//!
//! File-shape errors (`InvalidFileType`, `FileTooLarge`, `RowLimitExceeded`) are
//! raised before any remote call. Remote-call errors wrap a [`ServiceError`]
//! from the collaborator that failed. [`ReportExportError`] is never escalated
//! to a pipeline failure; the orchestrator logs it and carries on.

use common::model::mass_update::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while turning raw CSV text into identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("CSV file has {rows} rows, more than the allowed {max}")]
    RowLimitExceeded { rows: usize, max: usize },
}

/// Failure of an external collaborator (validation or update service).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Backend(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Backend(format!("worker task failed: {}", err))
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("'{file_name}' is not a .csv file")]
    InvalidFileType { file_name: String },
    #[error("file is {size} bytes, larger than the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },
    #[error("CSV file has {rows} rows, more than the allowed {max}")]
    RowLimitExceeded { rows: usize, max: usize },
    #[error("identifier validation failed: {0}")]
    ValidationService(#[source] ServiceError),
    #[error("bulk update failed: {0}")]
    UpdateService(#[source] ServiceError),
    #[error("an upload is already in progress")]
    ReentrantUploadRejected,
    #[error("no CSV file selected")]
    NoFileSelected,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidFileType { .. } => ErrorKind::InvalidFileType,
            PipelineError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            PipelineError::RowLimitExceeded { .. } => ErrorKind::RowLimitExceeded,
            PipelineError::ValidationService(_) => ErrorKind::ValidationServiceError,
            PipelineError::UpdateService(_) => ErrorKind::UpdateServiceError,
            PipelineError::ReentrantUploadRejected => ErrorKind::ReentrantUploadRejected,
            PipelineError::NoFileSelected => ErrorKind::NoFileSelected,
        }
    }
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::RowLimitExceeded { rows, max } => {
                PipelineError::RowLimitExceeded { rows, max }
            }
        }
    }
}

/// Failure to write the invalid-ID report. Logged, never fatal.
#[derive(Debug, Error)]
pub enum ReportExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ReportExportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ReportExportError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_keep_their_kind() {
        let err: PipelineError = ParseError::RowLimitExceeded { rows: 11, max: 10 }.into();
        assert_eq!(err.kind(), ErrorKind::RowLimitExceeded);
        assert_eq!(err.to_string(), "CSV file has 11 rows, more than the allowed 10");
    }

    #[test]
    fn remote_errors_map_to_service_kinds() {
        let validation = PipelineError::ValidationService(ServiceError::Timeout(
            Duration::from_secs(1),
        ));
        let update = PipelineError::UpdateService(ServiceError::Backend("down".into()));
        assert_eq!(validation.kind(), ErrorKind::ValidationServiceError);
        assert_eq!(update.kind(), ErrorKind::UpdateServiceError);
        assert_eq!(update.to_string(), "bulk update failed: backend failure: down");
    }
}
