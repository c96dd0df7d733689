//! User-facing notifications emitted by the orchestrator.

use crate::error::PipelineError;
use common::model::notification::{Notification, Persistence, Severity};
use log::{error, info, warn};
use num_format::{Locale, ToFormattedString};

/// Sink for notifications. The UI collaborator decides how to show them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes every notification to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.severity {
            Severity::Error => error!("{}: {}", notification.title, notification.message),
            Severity::Warning => warn!("{}: {}", notification.title, notification.message),
            Severity::Success | Severity::Info => {
                info!("{}: {}", notification.title, notification.message)
            }
        }
    }
}

pub fn for_error(err: &PipelineError) -> Notification {
    match err {
        PipelineError::InvalidFileType { .. } => {
            Notification::error("Please upload a valid CSV file.")
        }
        PipelineError::FileTooLarge { .. } => Notification::new(
            "Error",
            "File Size is too large",
            Severity::Error,
            Persistence::Sticky,
        ),
        PipelineError::RowLimitExceeded { max, .. } => Notification::error(format!(
            "The CSV file exceeds the maximum allowed rows of {}.",
            max.to_formatted_string(&Locale::en)
        )),
        PipelineError::ValidationService(_) => Notification::error("Failed to validate IDs"),
        PipelineError::UpdateService(_) => Notification::error("Failed to update EPOS records"),
        PipelineError::ReentrantUploadRejected => Notification::new(
            "Busy",
            "An upload is already being processed. Please wait for it to finish.",
            Severity::Warning,
            Persistence::Dismissable,
        ),
        PipelineError::NoFileSelected => {
            Notification::error("Please select a CSV file to upload!!")
        }
    }
}

pub fn success(updated: usize) -> Notification {
    Notification::new(
        "Success",
        format!("Updated Successfully!!! {} records updated.", updated),
        Severity::Success,
        Persistence::Dismissable,
    )
}

/// Warning for a cycle with invalid IDs. The message points at the exported
/// report only when it was actually written.
pub fn partial_success(invalid: usize, updated: usize, report_exported: bool) -> Notification {
    let hint = if report_exported {
        "Check the exported file for details."
    } else {
        "The invalid IDs report could not be exported; see the server log."
    };
    Notification::new(
        "Partial Success",
        format!(
            "Some IDs are invalid. {} {} invalid, {} records updated.",
            hint, invalid, updated
        ),
        Severity::Warning,
        Persistence::Dismissable,
    )
}

pub fn nothing_to_update() -> Notification {
    Notification::new(
        "No IDs",
        "The CSV file does not contain any IDs.",
        Severity::Info,
        Persistence::Dismissable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_limit_message_uses_grouped_limit() {
        let n = for_error(&PipelineError::RowLimitExceeded {
            rows: 10_001,
            max: 10_000,
        });
        assert_eq!(
            n.message,
            "The CSV file exceeds the maximum allowed rows of 10,000."
        );
        assert_eq!(n.severity, Severity::Error);

        let n = for_error(&PipelineError::RowLimitExceeded {
            rows: 1_500_001,
            max: 1_500_000,
        });
        assert_eq!(
            n.message,
            "The CSV file exceeds the maximum allowed rows of 1,500,000."
        );
    }

    #[test]
    fn partial_success_mentions_the_report_only_when_written() {
        let exported = partial_success(1, 2, true);
        assert_eq!(
            exported.message,
            "Some IDs are invalid. Check the exported file for details. 1 invalid, 2 records updated."
        );

        let missing = partial_success(1, 2, false);
        assert!(!missing.message.contains("Check the exported file"));
        assert!(missing.message.contains("could not be exported"));
        assert_eq!(missing.severity, Severity::Warning);
    }

    #[test]
    fn oversized_file_notification_is_sticky() {
        let n = for_error(&PipelineError::FileTooLarge {
            size: 2,
            max: 1,
        });
        assert_eq!(n.persistence, Persistence::Sticky);
    }
}
