//! Handlers not linked to the webhook

use crate::consts;
use ntex::web;

/// Liveness endpoint
#[web::get("/")]
pub async fn index() -> impl web::Responder {
    web::HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(consts::LIVENESS_TEXT)
}

/// Empty 404 for urls not defined
pub async fn serve_not_found() -> web::HttpResponse {
    web::HttpResponse::NotFound().finish()
}
