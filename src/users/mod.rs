/// User accounts
///
/// The persisted user model, the closed set of roles, and the repository
/// port the auth service talks to. Two adapters implement the port:
/// Postgres for deployments and an in-memory map for tests.

mod memory;
mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ValidationError};

pub use memory::InMemoryUserRepository;
pub use postgres::PostgresUserRepository;

pub type UserId = i64;

/// Roles a hospital account can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Admin => "Admin",
        }
    }

    /// Case-insensitive match against the known role names.
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_lowercase().as_str() {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Role requested at registration. Blank or absent means Patient.
    pub fn normalize(requested: Option<&str>) -> Result<Role, ValidationError> {
        match requested.map(str::trim) {
            None | Some("") => Ok(Role::Patient),
            Some(value) => {
                Role::parse(value).ok_or_else(|| ValidationError::InvalidRole(value.to_string()))
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored account, including its password hash
#[derive(Clone)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Row to insert on registration. Username and email are already trimmed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Persistence operations for user accounts.
///
/// Uniqueness of username and email is enforced by the implementation:
/// `create` returns `AppError::Conflict` when either is already taken, even
/// if a prior `exists` check passed.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Whether any account uses this username or this email.
    async fn exists(&self, username: &str, email: &str) -> Result<bool, AppError>;

    /// Insert an active account and return its assigned id.
    async fn create(&self, user: NewUser) -> Result<UserId, AppError>;

    /// Account whose username or email equals `login` exactly.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_role_defaults_to_patient() {
        assert_eq!(Role::normalize(None), Ok(Role::Patient));
        assert_eq!(Role::normalize(Some("   ")), Ok(Role::Patient));
    }

    #[test]
    fn test_role_matching_is_case_insensitive() {
        assert_eq!(Role::normalize(Some("ADMIN")), Ok(Role::Admin));
        assert_eq!(Role::normalize(Some(" doctor ")), Ok(Role::Doctor));
        assert_eq!(Role::normalize(Some("Patient")), Ok(Role::Patient));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert_eq!(
            Role::normalize(Some("superuser")),
            Err(ValidationError::InvalidRole("superuser".to_string()))
        );
    }

    #[test]
    fn test_role_serializes_canonically() {
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"Doctor\"");
        assert_eq!(Role::Admin.to_string(), "Admin");
    }

    #[test]
    fn test_user_debug_omits_password_hash() {
        let user = User {
            user_id: 1,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::Patient,
            is_active: true,
        };
        assert!(!format!("{:?}", user).contains("$2b$"));
    }
}
