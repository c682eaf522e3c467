/// Refresh Token Management
///
/// Refresh tokens are opaque, single-use credentials:
/// - 48 bytes from the OS CSPRNG, URL-safe base64 without padding
/// - Stored only as a SHA-256 digest, never in plaintext
/// - Revoked on rotation and logout, purged lazily when next presented
///
/// Two stores implement the same contract: a sharded in-process map (the
/// default) and a Postgres table for deployments that want tokens to
/// survive restarts.

mod memory;
mod postgres;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::users::{Role, UserId};

pub use memory::InMemoryRefreshTokenStore;
pub use postgres::PostgresRefreshTokenStore;

const TOKEN_BYTES: usize = 48;

/// Session registry behind login, refresh and logout.
///
/// Every operation is safe to call concurrently; implementations make each
/// per-token read-modify-write atomic.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync + 'static {
    /// Create a live token for the user. Earlier tokens are left untouched.
    async fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Role,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError>;

    /// Owning user id of a live token.
    ///
    /// Returns `None` for unknown tokens. Revoked or expired entries are
    /// deleted as a side effect and also yield `None`.
    async fn validate(&self, token: &str) -> Result<Option<UserId>, AppError>;

    /// Mark a token revoked. Returns false only when the token is unknown;
    /// revoking twice is fine.
    async fn revoke(&self, token: &str) -> Result<bool, AppError>;

    /// Mark every token owned by the user revoked.
    async fn revoke_all(&self, user_id: UserId) -> Result<(), AppError>;

    /// Drop every revoked or expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

/// Generate a new cryptographically secure refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest used as the storage key of a token
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Spawn a task that purges dead entries every `interval`
pub fn spawn_sweeper(
    store: std::sync::Arc<dyn RefreshTokenStore>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Purged dead refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "Refresh token sweep failed"),
            }
        }
    })
}
