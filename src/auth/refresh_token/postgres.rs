use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{generate_refresh_token, hash_token, RefreshTokenStore};
use crate::error::AppError;
use crate::users::{Role, UserId};

/// Refresh tokens kept in the `refresh_tokens` table.
///
/// Each statement touches one row (or one user's rows) atomically, which
/// gives the same per-token guarantees as the in-memory store across any
/// number of processes sharing the database.
pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Role,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let token = generate_refresh_token();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, username, role, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            "#,
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(username)
        .bind(role.as_str())
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    async fn validate(&self, token: &str) -> Result<Option<UserId>, AppError> {
        let token_hash = hash_token(token);
        let now = Utc::now();

        let evicted = sqlx::query_scalar::<_, i64>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1 AND (revoked OR expires_at <= $2)
            RETURNING user_id
            "#,
        )
        .bind(&token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user_id) = evicted {
            tracing::debug!(user_id = %user_id, "Evicted unusable refresh token");
            return Ok(None);
        }

        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id
            FROM refresh_tokens
            WHERE token_hash = $1 AND NOT revoked AND expires_at > $2
            "#,
        )
        .bind(&token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn revoke(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = COALESCE(revoked_at, $1)
            WHERE token_hash = $2
            "#,
        )
        .bind(Utc::now())
        .bind(hash_token(token))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $1
            WHERE user_id = $2 AND NOT revoked
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            revoked = result.rows_affected(),
            "All refresh tokens revoked for user"
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE revoked OR expires_at <= $1
            "#,
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
