use crate::error::PipelineError;
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::pipeline::orchestrator::{failure_report, PipelineOrchestrator, StageObserver};
use crate::pipeline::RawUpload;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{web, HttpResponse, Responder};
use common::jobs::JobStatus;
use common::model::mass_update::PipelineStage;
use common::requests::UploadOptions;
use futures_util::StreamExt;
use log::{debug, info};
use serde_json::from_slice;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("invalid options part: {0}")]
    Options(#[from] serde_json::Error),
    #[error("missing file part")]
    MissingFile,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl UploadError {
    fn into_response(self) -> HttpResponse {
        let body = format!("Error: {}", self);
        match self {
            UploadError::Pipeline(PipelineError::InvalidFileType { .. }) => {
                HttpResponse::UnsupportedMediaType().body(body)
            }
            UploadError::Pipeline(PipelineError::ReentrantUploadRejected) => {
                HttpResponse::Conflict().body(body)
            }
            _ => HttpResponse::BadRequest().body(body),
        }
    }
}

/// Handler for `POST /upload`.
///
/// - `200 OK` with `{"job_id": ..}` once the cycle has been started.
/// - `415` for a non-CSV file, `409` while another cycle is running,
///   `400` for a malformed request.
pub(crate) async fn process(
    payload: Multipart,
    orchestrator: web::Data<PipelineOrchestrator>,
    jobs_state: web::Data<JobsState>,
) -> impl Responder {
    match start_upload(payload, orchestrator.into_inner(), jobs_state.get_ref()).await {
        Ok(job_id) => HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })),
        Err(err) => err.into_response(),
    }
}

/// Reads the multipart body, starts a cycle and schedules it in the background.
async fn start_upload(
    mut payload: Multipart,
    orchestrator: Arc<PipelineOrchestrator>,
    jobs_state: &JobsState,
) -> Result<String, UploadError> {
    let limit = orchestrator.config().max_file_size_bytes;
    let mut options: Option<UploadOptions> = None;
    let mut upload: Option<RawUpload> = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                let (bytes, size) = read_bounded(&mut field, limit).await?;
                upload = Some(RawUpload::with_declared_size(file_name, size, bytes));
            }
            Some("options") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    bytes.extend_from_slice(&chunk?);
                }
                options = Some(from_slice(&bytes)?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or(UploadError::MissingFile)?;
    // Without an options part the cycle uses the selection made via /options.
    let cycle = orchestrator.start(upload, options.map(|o| o.options))?;
    let job_id = jobs_state.register().await;
    info!("Scheduled mass update job {} for '{}'", job_id, cycle.file_name());

    let tx = jobs_state.tx.clone();
    let cycle = cycle.with_observer(progress_observer(tx.clone(), job_id.clone()));

    let final_job = job_id.clone();
    actix_web::rt::spawn(async move {
        let status = match cycle.run().await {
            Ok(summary) => JobStatus::Completed(summary),
            Err(err) => JobStatus::Failed(failure_report(&err)),
        };
        let _ = tx.send(JobUpdate::new(final_job, status)).await;
    });

    Ok(job_id)
}

/// Publishes every non-terminal stage as `InProgress`. Progress is best
/// effort: when the channel is full the update is dropped, the final status
/// is still delivered by the awaited send after the cycle.
fn progress_observer(tx: mpsc::Sender<JobUpdate>, job_id: String) -> StageObserver {
    Box::new(move |stage| {
        if matches!(stage, PipelineStage::Done | PipelineStage::Failed) {
            return;
        }
        let update = JobUpdate::new(job_id.clone(), JobStatus::InProgress(stage));
        if let Err(err) = tx.try_send(update) {
            debug!("Dropped progress update {:?} for job {}: {}", stage, job_id, err);
        }
    })
}

/// Drains a file field, keeping at most `limit` bytes in memory. Returns the
/// kept bytes and the full size of the field.
async fn read_bounded(field: &mut Field, limit: u64) -> Result<(Vec<u8>, u64), MultipartError> {
    let mut bytes = Vec::new();
    let mut size: u64 = 0;
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        if size <= limit {
            bytes.extend_from_slice(&chunk);
        }
    }
    Ok((bytes, size))
}
