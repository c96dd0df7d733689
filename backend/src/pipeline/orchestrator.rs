//! Sequences one upload cycle and owns its state machine.
//!
//! ```text
//! Idle -> FileSelected -> SizeChecked -> Parsing -> Validating
//!      -> [ReportingInvalid] -> [Updating] -> Done | Failed
//! ```
//!
//! Only one cycle runs at a time. While a cycle is in flight, selecting a
//! file or starting another cycle is rejected with
//! `ReentrantUploadRejected`. Every cycle ends with exactly one notification
//! and leaves the orchestrator ready for the next file, whether it succeeded
//! or not.

use crate::error::PipelineError;
use crate::pipeline::notifier::{self, Notifier};
use crate::pipeline::parser;
use crate::pipeline::reporter::{InvalidRecordReporter, ReportExporter};
use crate::pipeline::updater::{BulkUpdateService, BulkUpdater};
use crate::pipeline::validator::{IdentifierValidationService, IdentifierValidator};
use crate::pipeline::{PipelineConfig, RawUpload};
use common::model::mass_update::{CycleFailure, CycleSummary, ErrorKind, PipelineStage};
use common::model::notification::Notification;
use log::{debug, info, warn};
use md5::Context;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked on every stage a cycle enters.
pub type StageObserver = Box<dyn Fn(PipelineStage) + Send + Sync>;

struct Session {
    stage: PipelineStage,
    busy: bool,
    upload: Option<RawUpload>,
    options: BTreeSet<String>,
    last_failure: Option<ErrorKind>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Idle,
            busy: false,
            upload: None,
            options: BTreeSet::new(),
            last_failure: None,
        }
    }
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    validator: IdentifierValidator,
    updater: BulkUpdater,
    exporter: Arc<dyn ReportExporter>,
    notifier: Arc<dyn Notifier>,
    session: Mutex<Session>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        validation_service: Arc<dyn IdentifierValidationService>,
        update_service: Arc<dyn BulkUpdateService>,
        exporter: Arc<dyn ReportExporter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            validator: IdentifierValidator::new(validation_service, config.validation_timeout),
            updater: BulkUpdater::new(update_service, config.update_timeout),
            config,
            exporter,
            notifier,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.session().stage
    }

    pub fn is_busy(&self) -> bool {
        self.session().busy
    }

    /// Kind of the failure that ended the most recent cycle, cleared when a
    /// cycle reaches `Done`.
    pub fn last_failure(&self) -> Option<ErrorKind> {
        self.session().last_failure
    }

    pub fn selected_options(&self) -> Vec<String> {
        self.session().options.iter().cloned().collect()
    }

    /// Adds or removes one update option from the current selection.
    pub fn toggle_option(&self, name: &str, checked: bool) {
        let mut session = self.session();
        if checked {
            session.options.insert(name.to_string());
        } else {
            session.options.remove(name);
        }
    }

    /// Selects the file for the next cycle.
    ///
    /// Files without a `.csv` extension are rejected and leave the
    /// orchestrator `Idle` with no file selected.
    pub fn select_file(&self, upload: RawUpload) -> Result<(), PipelineError> {
        let result = {
            let mut session = self.session();
            select_locked(&mut session, upload)
        };
        result.map_err(|err| self.reject(err))
    }

    /// Reserves the orchestrator for a cycle over the selected file.
    ///
    /// The selected options are snapshotted here; the file is handed to the
    /// cycle and no longer retained by the orchestrator.
    pub fn begin(self: &Arc<Self>) -> Result<Cycle, PipelineError> {
        let result = {
            let mut session = self.session();
            if session.busy {
                Err(PipelineError::ReentrantUploadRejected)
            } else if let Some(upload) = session.upload.take() {
                session.busy = true;
                Ok((upload, session.options.clone()))
            } else {
                Err(PipelineError::NoFileSelected)
            }
        };
        let (upload, options) = result.map_err(|err| self.reject(err))?;
        Ok(Cycle::new(Arc::clone(self), upload, options))
    }

    /// Selects `upload` and reserves the orchestrator, all under one lock so
    /// concurrent callers cannot swap each other's files.
    ///
    /// `Some(options)` replaces the option selection; `None` runs with the
    /// options already selected through [`toggle_option`](Self::toggle_option).
    pub fn start(
        self: &Arc<Self>,
        upload: RawUpload,
        options: Option<Vec<String>>,
    ) -> Result<Cycle, PipelineError> {
        let result = {
            let mut session = self.session();
            select_locked(&mut session, upload).map(|()| {
                if let Some(options) = options {
                    session.options = options.into_iter().collect();
                }
                session.busy = true;
                let upload = session.upload.take();
                (upload, session.options.clone())
            })
        };
        match result {
            Ok((Some(upload), options)) => Ok(Cycle::new(Arc::clone(self), upload, options)),
            Ok((None, _)) => Err(self.reject(PipelineError::NoFileSelected)),
            Err(err) => Err(self.reject(err)),
        }
    }

    /// Runs a full cycle over the selected file.
    pub async fn submit(self: &Arc<Self>) -> Result<CycleSummary, PipelineError> {
        self.begin()?.run().await
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, err: PipelineError) -> PipelineError {
        warn!("Upload rejected: {}", err);
        self.notifier.notify(&notifier::for_error(&err));
        err
    }

    fn enter(&self, stage: PipelineStage) {
        let mut session = self.session();
        debug!("Pipeline stage {:?} -> {:?}", session.stage, stage);
        session.stage = stage;
    }

    fn finish(&self, result: &Result<CycleSummary, PipelineError>) {
        let mut session = self.session();
        session.busy = false;
        match result {
            Ok(_) => {
                session.stage = PipelineStage::Done;
                session.last_failure = None;
                session.options.clear();
            }
            Err(err) => {
                session.stage = PipelineStage::Failed;
                session.last_failure = Some(err.kind());
            }
        }
    }
}

fn select_locked(session: &mut Session, upload: RawUpload) -> Result<(), PipelineError> {
    if session.busy {
        return Err(PipelineError::ReentrantUploadRejected);
    }
    if !upload.has_csv_extension() {
        session.stage = PipelineStage::Idle;
        session.upload = None;
        return Err(PipelineError::InvalidFileType {
            file_name: upload.file_name().to_string(),
        });
    }
    debug!("Selected '{}' ({} bytes)", upload.file_name(), upload.declared_size());
    session.stage = PipelineStage::FileSelected;
    session.upload = Some(upload);
    Ok(())
}

/// One reserved upload cycle. Dropping it without calling [`Cycle::run`]
/// releases the orchestrator.
pub struct Cycle {
    orchestrator: Arc<PipelineOrchestrator>,
    upload: RawUpload,
    options: BTreeSet<String>,
    observer: Option<StageObserver>,
    finished: bool,
}

impl Cycle {
    fn new(
        orchestrator: Arc<PipelineOrchestrator>,
        upload: RawUpload,
        options: BTreeSet<String>,
    ) -> Self {
        Self {
            orchestrator,
            upload,
            options,
            observer: None,
            finished: false,
        }
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn file_name(&self) -> &str {
        self.upload.file_name()
    }

    /// Runs the cycle to `Done` or `Failed` and emits its notification.
    pub async fn run(mut self) -> Result<CycleSummary, PipelineError> {
        info!(
            "Starting mass update for '{}' with options {:?}",
            self.upload.file_name(),
            self.options
        );
        let result = self.execute().await;

        let orchestrator = Arc::clone(&self.orchestrator);
        orchestrator.finish(&result);
        self.finished = true;

        let (stage, notification) = match &result {
            Ok(summary) => {
                info!(
                    "Mass update done: {} ids, {} invalid, {} updated",
                    summary.total_ids,
                    summary.invalid_ids.len(),
                    summary.updated
                );
                (PipelineStage::Done, summary.notification.clone())
            }
            Err(err) => {
                warn!("Mass update failed: {}", err);
                (PipelineStage::Failed, notifier::for_error(err))
            }
        };
        self.observe(stage);
        orchestrator.notifier.notify(&notification);
        result
    }

    async fn execute(&self) -> Result<CycleSummary, PipelineError> {
        let orchestrator = &self.orchestrator;
        let config = orchestrator.config;

        if self.upload.declared_size() > config.max_file_size_bytes {
            return Err(PipelineError::FileTooLarge {
                size: self.upload.declared_size(),
                max: config.max_file_size_bytes,
            });
        }
        self.enter(PipelineStage::SizeChecked);

        self.enter(PipelineStage::Parsing);
        let ids = parser::parse(&self.upload, config.max_rows)?;
        let upload_md5 = fingerprint(self.upload.bytes());

        if ids.is_empty() {
            return Ok(self.summary(
                upload_md5,
                0,
                0,
                Vec::new(),
                0,
                false,
                None,
                notifier::nothing_to_update(),
            ));
        }

        self.enter(PipelineStage::Validating);
        let outcome = orchestrator.validator.validate(&ids).await?;

        let mut report_exported = false;
        let mut report_error = None;
        if let Some(report) = InvalidRecordReporter::build_report(&outcome.invalid) {
            self.enter(PipelineStage::ReportingInvalid);
            match orchestrator.exporter.export(&report) {
                Ok(()) => report_exported = true,
                Err(err) => {
                    warn!("Error in exporting invalid IDs report: {}", err);
                    report_error = Some(err.kind());
                }
            }
        }

        let updated = if outcome.valid.is_empty() {
            0
        } else {
            self.enter(PipelineStage::Updating);
            orchestrator
                .updater
                .update(&outcome.valid, &self.options)
                .await?
                .updated
        };

        let notification = if outcome.invalid.is_empty() {
            notifier::success(updated)
        } else {
            notifier::partial_success(outcome.invalid.len(), updated, report_exported)
        };

        Ok(self.summary(
            upload_md5,
            ids.len(),
            outcome.valid.len(),
            outcome.invalid.into_vec(),
            updated,
            report_exported,
            report_error,
            notification,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn summary(
        &self,
        upload_md5: String,
        total_ids: usize,
        valid_ids: usize,
        invalid_ids: Vec<String>,
        updated: usize,
        report_exported: bool,
        report_error: Option<ErrorKind>,
        notification: Notification,
    ) -> CycleSummary {
        CycleSummary {
            file_name: self.upload.file_name().to_string(),
            upload_md5,
            total_ids,
            valid_ids,
            invalid_ids,
            updated,
            options: self.options.iter().cloned().collect(),
            report_exported,
            report_error,
            notification,
        }
    }

    fn enter(&self, stage: PipelineStage) {
        self.orchestrator.enter(stage);
        self.observe(stage);
    }

    fn observe(&self, stage: PipelineStage) {
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }
}

impl Drop for Cycle {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Cycle for '{}' abandoned before completion",
                self.upload.file_name()
            );
            let mut session = self.orchestrator.session();
            session.busy = false;
            session.stage = PipelineStage::Failed;
        }
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Context::new();
    hasher.consume(bytes);
    format!("{:x}", hasher.finalize())
}

/// Builds the failure payload reported to job pollers.
pub fn failure_report(err: &PipelineError) -> CycleFailure {
    CycleFailure {
        kind: err.kind(),
        message: err.to_string(),
        notification: notifier::for_error(err),
    }
}
