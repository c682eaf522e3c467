/// Authentication service
///
/// Registration, login, refresh-token rotation, logout and profile lookup.
/// Rejections come back as `AppError` domain variants (validation, conflict,
/// auth, not found); only repository or store failures are infrastructure
/// errors.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::{PasswordHasher, RefreshTokenStore, TokenSigner};
use crate::error::{AppError, AuthError, ValidationError};
use crate::users::{NewUser, Role, User, UserId, UserProfile, UserRepository};

/// Registration input as received from the client
#[derive(Debug, Clone, Default)]
pub struct RegisterCommand {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// Tokens handed out by a successful login or refresh
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    signer: Arc<TokenSigner>,
    hasher: PasswordHasher,
    refresh_token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        signer: Arc<TokenSigner>,
        hasher: PasswordHasher,
        refresh_token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            signer,
            hasher,
            refresh_token_ttl,
        }
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Create an active account and return its id.
    ///
    /// # Errors
    /// - `Validation` when a field is blank or the role is unknown
    /// - `Conflict` when the username or email is taken
    pub async fn register(&self, command: RegisterCommand) -> Result<UserId, AppError> {
        let username = command.username.trim();
        let email = command.email.trim();
        let password = command.password.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingRegistrationFields.into());
        }

        let role = Role::normalize(command.role.as_deref())?;

        // Friendlier early answer; the repository enforces uniqueness on insert
        if self.users.exists(username, email).await? {
            return Err(AppError::duplicate_user());
        }

        let password_hash = self.hasher.hash(password).await?;
        let user_id = self
            .users
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = %user_id, role = %role, "User registered");
        Ok(user_id)
    }

    /// Authenticate by username or email.
    ///
    /// Unknown account, inactive account and wrong password all fail with
    /// the same `InvalidCredentials`.
    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<AuthSession, AppError> {
        let login = username_or_email.trim();
        if login.is_empty() || password.trim().is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        let rejected = || {
            tracing::info!("Login rejected");
            AppError::Auth(AuthError::InvalidCredentials)
        };

        let user = match self.users.find_by_login(login).await? {
            Some(user) if user.is_active => user,
            _ => return Err(rejected()),
        };
        if !self.password_matches(password, &user).await? {
            return Err(rejected());
        }

        let session = self.open_session(&user).await?;
        tracing::info!(user_id = %user.user_id, "User logged in");
        Ok(session)
    }

    /// Exchange a refresh token for a new token pair. The presented token is
    /// revoked, so each refresh token works once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        if refresh_token.trim().is_empty() {
            return Err(ValidationError::MissingRefreshToken.into());
        }

        let user_id = self
            .refresh_tokens
            .validate(refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Deactivated accounts cannot extend their sessions
        let user = match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::info!(user_id = %user_id, "Refresh rejected for missing or inactive user");
                return Err(AuthError::InactiveAccount.into());
            }
        };

        self.refresh_tokens.revoke(refresh_token).await?;
        let session = self.open_session(&user).await?;

        tracing::info!(user_id = %user_id, "Token refreshed");
        Ok(session)
    }

    /// Revoke the given refresh token, or every token of the user when none
    /// is supplied.
    pub async fn logout(&self, user_id: UserId, refresh_token: Option<&str>) -> Result<(), AppError> {
        match refresh_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let found = self.refresh_tokens.revoke(token).await?;
                tracing::info!(user_id = %user_id, found, "User logged out of one session");
            }
            None => {
                self.refresh_tokens.revoke_all(user_id).await?;
                tracing::info!(user_id = %user_id, "User logged out of all sessions");
            }
        }
        Ok(())
    }

    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users.find_by_id(user_id).await?.map(UserProfile::from))
    }

    /// The password as typed is checked first. Registration stores the hash
    /// of the trimmed password, so the trimmed form is tried when it differs.
    async fn password_matches(&self, password: &str, user: &User) -> Result<bool, AppError> {
        if self.hasher.verify(password, &user.password_hash).await? {
            return Ok(true);
        }

        let trimmed = password.trim();
        if trimmed.len() == password.len() {
            return Ok(false);
        }
        self.hasher.verify(trimmed, &user.password_hash).await
    }

    async fn open_session(&self, user: &User) -> Result<AuthSession, AppError> {
        let (access_token, access_token_expires_at) =
            self.signer
                .issue(user.user_id, &user.username, &user.email, user.role)?;

        let refresh_token = self
            .refresh_tokens
            .issue(
                user.user_id,
                &user.username,
                user.role,
                Utc::now() + self.refresh_token_ttl,
            )
            .await?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            access_token_expires_at,
            user_id: user.user_id,
            username: user.username.clone(),
            role: user.role,
        })
    }
}
