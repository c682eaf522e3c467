use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{
    spawn_sweeper, AuthService, InMemoryRefreshTokenStore, PasswordHasher,
    PostgresRefreshTokenStore, RefreshTokenStore, TokenSigner,
};
use crate::configuration::{Environment, RefreshTokenBackend, Settings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    admin_ping, doctor_ping, health_check, login, logout, patient_ping, profile, refresh, register,
};
use crate::users::{PostgresUserRepository, Role, UserRepository};

/// Wire the auth service to its Postgres-backed collaborators.
///
/// Resolves the signing secret (fatal in production when weak), picks the
/// refresh token backend, and starts the periodic sweep when configured.
pub fn build_auth_service(
    settings: &Settings,
    environment: Environment,
    pool: PgPool,
) -> Result<AuthService, AppError> {
    let users: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool.clone()));

    let refresh_tokens: Arc<dyn RefreshTokenStore> = match settings.refresh_tokens.backend {
        RefreshTokenBackend::Memory => Arc::new(InMemoryRefreshTokenStore::new()),
        RefreshTokenBackend::Postgres => Arc::new(PostgresRefreshTokenStore::new(pool)),
    };
    tracing::info!(backend = ?settings.refresh_tokens.backend, "Refresh token store ready");

    if let Some(seconds) = settings.refresh_tokens.sweep_interval_seconds.filter(|s| *s > 0) {
        spawn_sweeper(refresh_tokens.clone(), std::time::Duration::from_secs(seconds));
        tracing::info!(interval_seconds = seconds, "Refresh token sweep scheduled");
    }

    build_with(settings, environment, users, refresh_tokens)
}

/// Same as [`build_auth_service`] with caller-supplied storage.
pub fn build_with(
    settings: &Settings,
    environment: Environment,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
) -> Result<AuthService, AppError> {
    let secret = settings.jwt.signing_secret(environment)?;
    let signer = Arc::new(TokenSigner::new(
        &secret,
        &settings.jwt.issuer,
        &settings.jwt.audience,
        settings.jwt.access_token_ttl(),
    ));

    Ok(AuthService::new(
        users,
        refresh_tokens,
        signer,
        PasswordHasher::new(settings.application.bcrypt_cost),
        settings.jwt.refresh_token_ttl(),
    ))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(ValidationError::MalformedBody(err.to_string())).into()
    })
}

pub fn run(listener: TcpListener, auth: AuthService) -> Result<Server, std::io::Error> {
    let signer = auth.signer().clone();
    let auth = web::Data::new(auth);

    let server = HttpServer::new(move || {
        let bearer = || JwtMiddleware::new(signer.clone());

        App::new()
            .wrap(LoggerMiddleware)
            .app_data(auth.clone())
            .app_data(json_config())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    // Public authentication endpoints
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/refresh", web::post().to(refresh))
                            .service(
                                web::resource("/logout")
                                    .wrap(bearer())
                                    .route(web::post().to(logout)),
                            )
                            .service(
                                web::resource("/profile")
                                    .wrap(bearer())
                                    .route(web::get().to(profile)),
                            ),
                    )
                    // Role-gated endpoints
                    .service(
                        web::resource("/admin/ping")
                            .wrap(bearer().require_role(Role::Admin))
                            .route(web::get().to(admin_ping)),
                    )
                    .service(
                        web::resource("/doctor/ping")
                            .wrap(bearer().require_role(Role::Doctor))
                            .route(web::get().to(doctor_ping)),
                    )
                    .service(
                        web::resource("/patient/ping")
                            .wrap(bearer().require_role(Role::Patient))
                            .route(web::get().to(patient_ping)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
