use crate::pipeline::orchestrator::PipelineOrchestrator;
use actix_web::{web, HttpResponse, Responder};
use common::requests::ToggleOptionRequest;

/// Handler for `POST /options`: checks or unchecks one update option.
pub(crate) async fn toggle(
    orchestrator: web::Data<PipelineOrchestrator>,
    req: web::Json<ToggleOptionRequest>,
) -> impl Responder {
    let req = req.into_inner();
    if req.name.trim().is_empty() {
        return HttpResponse::BadRequest().body("Option name must not be empty");
    }
    orchestrator.toggle_option(req.name.trim(), req.checked);
    HttpResponse::Ok().json(orchestrator.selected_options())
}

/// Handler for `GET /options`.
pub(crate) async fn list(orchestrator: web::Data<PipelineOrchestrator>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.selected_options())
}
