use actix_web::HttpResponse;

/// Liveness check. Does not touch the database.
pub async fn health_check() -> HttpResponse {
    tracing::trace!("Health check endpoint called");
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
