/// Application error handling
///
/// Every failure in the service maps to one `AppError`. Domain rejections
/// (bad input, duplicate accounts, failed authentication, missing profiles)
/// are ordinary values the route handlers shape into the HTTP contract;
/// infrastructure failures become an opaque 500 with a traceable error id.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Input that is missing or malformed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username, email and password are required.")]
    MissingRegistrationFields,

    #[error("Invalid role. Allowed roles: Patient, Doctor, Admin.")]
    InvalidRole(String),

    #[error("Refresh token is required.")]
    MissingRefreshToken,

    #[error("Request body is not valid JSON.")]
    MalformedBody(String),
}

/// Authentication failures. Messages stay generic so callers cannot tell
/// which part of a credential was wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username/email or password.")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token.")]
    InvalidRefreshToken,

    #[error("User is not active.")]
    InactiveAccount,

    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Token does not carry a valid subject")]
    InvalidSubject,
}

/// Database operation errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),

    #[error("Database connection error: {0}")]
    ConnectionPool(String),

    #[error("Query error: {0}")]
    QueryExecution(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("{0} is not a supported environment. Use either `development` or `production`.")]
    UnknownEnvironment(String),

    #[error("JWT signing secret must be at least {0} bytes in production")]
    WeakSigningSecret(usize),
}

// ============================================================================
// UNIFIED APPLICATION ERROR TYPE
// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Access to this resource requires the {0} role")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Conflict raised when a username or email is already taken.
    pub fn duplicate_user() -> Self {
        AppError::Conflict("A user with the same username or email already exists.".to_string())
    }

    /// Collapses every domain rejection into a 401, keeping infrastructure
    /// failures intact. Token endpoints never explain why a token was refused.
    pub fn into_unauthorized(self) -> Self {
        match self {
            AppError::Auth(_) => self,
            AppError::Validation(ValidationError::MissingRefreshToken) => {
                AppError::Auth(AuthError::MissingToken)
            }
            AppError::Validation(_) | AppError::Conflict(_) | AppError::NotFound(_) => {
                AppError::Auth(AuthError::InvalidCredentials)
            }
            other => other,
        }
    }

    fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::Database(DatabaseError::UniqueConstraintViolation(
                    db_err.constraint().unwrap_or("unique").to_string(),
                ))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::QueryExecution(err.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::Migration(err.to_string()))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(ConfigError::Load(err.to_string()))
    }
}

// ============================================================================
// HTTP RESPONSE MAPPING
// ============================================================================

/// Body returned for rejected registrations and other soft failures
#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub success: bool,
    pub message: String,
}

impl FailureBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Body returned for infrastructure failures
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => "DUPLICATE_ENTRY",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => "Duplicate entry",
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable"
            }
            AppError::Database(_) => "Database error occurred",
            AppError::Config(_) => "Server configuration error",
            _ => "Internal server error",
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => tracing::debug!(error = %e, "Validation error"),
            AppError::Conflict(msg) => tracing::info!(error = %msg, "Duplicate account attempt"),
            AppError::Auth(e) => tracing::info!(error = %e, "Authentication rejected"),
            AppError::Forbidden(role) => tracing::info!(required_role = %role, "Authorization rejected"),
            AppError::NotFound(what) => tracing::debug!(resource = %what, "Resource not found"),
            _ => tracing::error!(error_id = error_id, error = %self, "Request failed"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => StatusCode::CONFLICT,
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        match self {
            AppError::Validation(e) => HttpResponse::build(status).json(FailureBody::new(e.to_string())),
            AppError::Conflict(msg) => HttpResponse::build(status).json(FailureBody::new(msg.clone())),
            _ if self.is_infrastructure() => HttpResponse::build(status).json(ErrorResponse::new(
                error_id,
                self.public_message().to_string(),
                self.error_code().to_string(),
                status.as_u16(),
            )),
            // Authentication, authorization and not-found answers carry no body
            _ => HttpResponse::build(status).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidRole("superuser".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid role. Allowed roles: Patient, Doctor, Admin."
        );
    }

    #[test]
    fn test_status_codes_follow_taxonomy() {
        let cases = vec![
            (AppError::from(ValidationError::MissingRegistrationFields), 400),
            (AppError::duplicate_user(), 400),
            (AppError::from(AuthError::InvalidCredentials), 401),
            (AppError::Forbidden("Admin".to_string()), 403),
            (AppError::NotFound("user 7".to_string()), 404),
            (AppError::Internal("boom".to_string()), 500),
            (AppError::Database(DatabaseError::ConnectionPool("down".to_string())), 503),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code().as_u16(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_auth_errors_have_empty_body() {
        let response = AppError::from(AuthError::InvalidCredentials).error_response();
        let body = response.into_body().try_into_bytes().unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = AppError::Internal("secret stack detail".to_string()).error_response();
        let body = response.into_body().try_into_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!String::from_utf8_lossy(&body).contains("secret stack detail"));
    }

    #[test]
    fn test_conflict_renders_soft_failure() {
        let response = AppError::duplicate_user().error_response();
        let body = response.into_body().try_into_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(
            json["message"],
            "A user with the same username or email already exists."
        );
    }

    #[test]
    fn test_into_unauthorized_keeps_infrastructure_errors() {
        let missing = AppError::from(ValidationError::MissingRefreshToken).into_unauthorized();
        assert!(matches!(missing, AppError::Auth(AuthError::MissingToken)));

        let internal = AppError::Internal("db".to_string()).into_unauthorized();
        assert!(matches!(internal, AppError::Internal(_)));
    }
}
