/// Role-gated ping endpoints. The role check itself happens in
/// `JwtMiddleware`; these only answer once it has passed.

use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct PingResponse {
    message: &'static str,
}

pub async fn admin_ping() -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        message: "Admin access granted.",
    })
}

pub async fn doctor_ping() -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        message: "Doctor access granted.",
    })
}

pub async fn patient_ping() -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        message: "Patient access granted.",
    })
}
