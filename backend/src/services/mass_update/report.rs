use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use std::path::PathBuf;

/// Where the report exporter writes the invalid-ID report.
#[derive(Debug, Clone)]
pub struct ReportLocation(pub PathBuf);

/// Handler for `GET /report`: serves the last exported report as a download.
pub(crate) async fn process(req: HttpRequest, location: web::Data<ReportLocation>) -> HttpResponse {
    let path = &location.0;
    match NamedFile::open_async(path).await {
        Ok(file) => {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report.csv".to_string());
            file.set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(file_name)],
            })
            .into_response(&req)
        }
        Err(_) => HttpResponse::NotFound().body("No invalid IDs report available"),
    }
}
