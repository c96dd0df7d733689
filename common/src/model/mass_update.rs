use crate::model::notification::Notification;
use serde::{Deserialize, Serialize};

/// Response of the identifier validation service.
///
/// The two lists together must be a total partition of the request: every
/// requested identifier appears in exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid_ids: Vec<String>,
    pub invalid_ids: Vec<String>,
}

/// Request sent to the bulk update service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub ids: Vec<String>,
    /// Sorted, de-duplicated option names. May be empty.
    pub options: Vec<String>,
}

/// Summary returned by the bulk update service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Number of records the backing store actually changed.
    pub updated: usize,
}

/// Stages of one upload cycle, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    FileSelected,
    SizeChecked,
    Parsing,
    Validating,
    ReportingInvalid,
    Updating,
    Done,
    Failed,
}

/// Failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFileType,
    FileTooLarge,
    RowLimitExceeded,
    ValidationServiceError,
    UpdateServiceError,
    ReportExportError,
    ReentrantUploadRejected,
    NoFileSelected,
}

/// Outcome of a cycle that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub file_name: String,
    /// Hex MD5 of the uploaded bytes.
    pub upload_md5: String,
    pub total_ids: usize,
    pub valid_ids: usize,
    pub invalid_ids: Vec<String>,
    /// Records changed by the bulk update; zero when nothing was valid.
    pub updated: usize,
    pub options: Vec<String>,
    /// Whether the invalid-ID report was written. `false` when there was
    /// nothing to report or the export failed.
    pub report_exported: bool,
    /// Set when the report could not be written. The cycle still completes.
    #[serde(default)]
    pub report_error: Option<ErrorKind>,
    pub notification: Notification,
}

/// Outcome of a cycle that reached `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub notification: Notification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_response_uses_camel_case_keys() {
        let response: ValidationResponse =
            serde_json::from_str(r#"{"validIds":["A001"],"invalidIds":["A003"]}"#).unwrap();
        assert_eq!(response.valid_ids, vec!["A001"]);
        assert_eq!(response.invalid_ids, vec!["A003"]);
    }
}
