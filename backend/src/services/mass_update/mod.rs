//! HTTP endpoints for the EPOS mass update.
//!
//! The provided routes are:
//! - `POST /api/mass_update/upload`: multipart/form-data with an optional
//!   `options` JSON part (`{"options": ["..."]}`) and a `file` part holding the
//!   CSV. Starts an upload cycle in the background and returns its `job_id`.
//!   The file body is buffered only up to the configured size limit.
//!
//! - `GET /api/mass_update/status/{job_id}`: current `JobStatus` of a cycle:
//!   `Pending`, `InProgress(stage)`, `Completed(summary)` or `Failed(failure)`.
//!
//! - `GET /api/mass_update/report`: downloads the last invalid-ID report.
//!
//! - `GET|POST /api/mass_update/options`: lists or toggles the update options
//!   applied by the next cycle.
//!
//! - `GET /api/mass_update/state`: stage, busy flag and last failure of the
//!   orchestrator.

use actix_web::web::{get, post, scope};
use actix_web::Scope;

mod get_status;
mod options;
pub mod report;
mod upload;

const API_PATH: &str = "/api/mass_update";

/// Configures and returns the Actix scope for mass update routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/status/{job_id}", get().to(get_status::process))
        .route("/state", get().to(get_status::session))
        .route("/report", get().to(report::process))
        .route("/options", get().to(options::list))
        .route("/options", post().to(options::toggle))
}
