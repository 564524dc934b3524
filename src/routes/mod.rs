// Route exports
pub mod matches;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::models::ErrorResponse;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure),
    )
    .default_service(web::to(not_found));
}

/// Unknown routes answer with the same envelope as handler errors
async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Not found".to_string(),
        message: format!("No route for {} {}", req.method(), req.path()),
        status_code: 404,
        retryable: false,
    })
}
