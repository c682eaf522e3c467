/// JWT Claims structure
///
/// Payload of an access token. The user id and role are written twice: once
/// under the registered/generic names (`sub`, `role`) and once under the
/// XML-schema claim URIs that role-based policies in other stacks look for.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AuthError};
use crate::users::{Role, UserId};

pub const NAME_IDENTIFIER_CLAIM: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
pub const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (numeric user id as a string)
    pub sub: String,
    #[serde(
        rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub name_identifier: Option<String>,
    pub unique_name: String,
    pub email: String,
    pub role: String,
    #[serde(
        rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub role_uri: Option<String>,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        username: &str,
        email: &str,
        role: Role,
        issuer: &str,
        audience: &str,
        issued_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            name_identifier: Some(user_id.to_string()),
            unique_name: username.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            role_uri: Some(role.as_str().to_string()),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: expires_at,
            iat: issued_at,
        }
    }

    /// Numeric user id, read from the name-identifier claim with `sub` as fallback
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.name_identifier
            .as_deref()
            .unwrap_or(&self.sub)
            .parse::<UserId>()
            .map_err(|_| AppError::Auth(AuthError::InvalidSubject))
    }

    /// Whether either role claim names `role`
    pub fn has_role(&self, role: Role) -> bool {
        Role::parse(&self.role) == Some(role)
            || self
                .role_uri
                .as_deref()
                .and_then(Role::parse)
                .map_or(false, |r| r == role)
    }
}
