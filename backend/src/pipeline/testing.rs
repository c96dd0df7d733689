//! In-memory collaborators for pipeline tests.

use crate::error::{ReportExportError, ServiceError};
use crate::pipeline::notifier::Notifier;
use crate::pipeline::reporter::ReportExporter;
use crate::pipeline::updater::BulkUpdateService;
use crate::pipeline::validator::IdentifierValidationService;
use crate::pipeline::{IdentifierSet, InvalidReport};
use async_trait::async_trait;
use common::model::mass_update::{UpdateOutcome, UpdateRequest, ValidationResponse};
use common::model::notification::Notification;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn id_set(ids: &[&str]) -> IdentifierSet {
    IdentifierSet::from_normalized(ids.iter().map(|id| id.to_string()).collect())
}

pub fn options(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[derive(Clone)]
enum Answer {
    KnownIds(HashSet<String>),
    Fixed(ValidationResponse),
    Fail(String),
}

#[derive(Clone)]
pub struct FakeValidationService {
    answer: Answer,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeValidationService {
    /// Treats `known` as the records present in the store.
    pub fn answering(known: &[&str]) -> Self {
        Self::new(Answer::KnownIds(
            known.iter().map(|id| id.to_string()).collect(),
        ))
    }

    pub fn with_response(response: ValidationResponse) -> Self {
        Self::new(Answer::Fixed(response))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Answer::Fail(message.to_string()))
    }

    fn new(answer: Answer) -> Self {
        Self {
            answer,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentifierValidationService for FakeValidationService {
    async fn validate_ids(&self, ids: &[String]) -> Result<ValidationResponse, ServiceError> {
        self.requests.lock().unwrap().push(ids.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            Answer::KnownIds(known) => {
                let (valid_ids, invalid_ids): (Vec<String>, Vec<String>) =
                    ids.iter().cloned().partition(|id| known.contains(id));
                Ok(ValidationResponse {
                    valid_ids,
                    invalid_ids,
                })
            }
            Answer::Fixed(response) => Ok(response.clone()),
            Answer::Fail(message) => Err(ServiceError::Backend(message.clone())),
        }
    }
}

#[derive(Clone)]
pub struct FakeUpdateService {
    failure: Option<String>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<UpdateRequest>>>,
}

impl FakeUpdateService {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::succeeding()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<UpdateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BulkUpdateService for FakeUpdateService {
    async fn update_records(&self, request: &UpdateRequest) -> Result<UpdateOutcome, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(ServiceError::Backend(message.clone())),
            None => Ok(UpdateOutcome {
                updated: request.ids.len(),
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingExporter {
    fail: bool,
    reports: Arc<Mutex<Vec<InvalidReport>>>,
}

impl RecordingExporter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<InvalidReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ReportExporter for RecordingExporter {
    fn export(&self, report: &InvalidReport) -> Result<(), ReportExportError> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(std::io::Error::other("disk full").into());
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().unwrap().push(notification.clone());
    }
}
