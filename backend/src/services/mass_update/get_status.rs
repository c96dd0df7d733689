use crate::job_controller::state::JobsState;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub(crate) async fn process(job_id: web::Path<String>, state: web::Data<JobsState>) -> impl Responder {
    match state.status(&job_id.into_inner()).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().body("Job ID not found"),
    }
}

/// Current state of the orchestrator, for UIs that poll instead of tracking jobs.
pub(crate) async fn session(orchestrator: web::Data<PipelineOrchestrator>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "stage": orchestrator.stage(),
        "busy": orchestrator.is_busy(),
        "last_failure": orchestrator.last_failure(),
        "options": orchestrator.selected_options(),
    }))
}
