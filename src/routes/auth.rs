/// Authentication Routes
///
/// Registration, login, token refresh, logout and profile lookup under
/// `/api/auth`.

use actix_web::{http::header, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, AuthSession, Claims, RegisterCommand};
use crate::error::{AppError, ValidationError};
use crate::users::{Role, UserId};

/// User registration request
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

impl From<RegisterRequest> for RegisterCommand {
    fn from(request: RegisterRequest) -> Self {
        RegisterCommand {
            username: request.username,
            email: request.email,
            password: request.password,
            role: request.role,
        }
    }
}

/// User login request
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request; without a token every session of the caller ends
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: UserId,
}

/// Token pair returned by login and refresh
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at_utc: DateTime<Utc>,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

impl AuthResponse {
    fn new(session: AuthSession, message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            access_token_expires_at_utc: session.access_token_expires_at,
            user_id: session.user_id,
            username: session.username,
            role: session.role,
        }
    }
}

/// POST /api/auth/register
///
/// # Errors
/// - 400 `{success: false, message}`: blank field, unknown role, or the
///   username/email is already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = auth.register(form.into_inner().into()).await?;

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/api/auth/profile/{}", user_id)))
        .json(RegisterResponse {
            success: true,
            message: "Registration successful.".to_string(),
            user_id,
        }))
}

/// POST /api/auth/login
///
/// # Errors
/// - 401 with an empty body for any credential problem. Unknown account
///   and wrong password are indistinguishable.
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth
        .login(&form.username_or_email, &form.password)
        .await
        .map_err(AppError::into_unauthorized)?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(session, "Login successful.")))
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token: the presented one stops working.
///
/// # Errors
/// - 401: Missing, unknown, expired or revoked refresh token, or the
///   account is no longer active
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth
        .refresh(&form.refresh_token)
        .await
        .map_err(AppError::into_unauthorized)?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(session, "Token refreshed.")))
}

/// POST /api/auth/logout
///
/// **Requires a valid access token.** An empty body ends every session of
/// the caller.
///
/// # Errors
/// - 400: The body is present but is not a valid `LogoutRequest`
pub async fn logout(
    claims: web::ReqData<Claims>,
    body: web::Bytes,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let refresh_token = parse_logout_body(&body)?.and_then(|form| form.refresh_token);

    auth.logout(user_id, refresh_token.as_deref()).await?;

    Ok(HttpResponse::NoContent().finish())
}

fn parse_logout_body(body: &[u8]) -> Result<Option<LogoutRequest>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()).into())
}

/// GET /api/auth/profile
///
/// **Requires a valid access token.**
///
/// # Errors
/// - 401: Token subject is not a user id
/// - 404: The account no longer exists
pub async fn profile(
    claims: web::ReqData<Claims>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    match auth.get_profile(user_id).await? {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Err(AppError::NotFound(format!("user {}", user_id))),
    }
}
