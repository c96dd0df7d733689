use serde::{Deserialize, Serialize};

/// How a notification should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Whether the notification disappears on its own or stays until dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    Dismissable,
    Sticky,
}

/// A user-facing message emitted by the mass update pipeline.
///
/// Every cycle produces exactly one of these: either the failure that aborted
/// it, or the success / partial-success summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub persistence: Persistence,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        persistence: Persistence,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            persistence,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message, Severity::Error, Persistence::Dismissable)
    }
}
