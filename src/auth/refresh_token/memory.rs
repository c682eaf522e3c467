use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{generate_refresh_token, hash_token, RefreshTokenStore};
use crate::error::AppError;
use crate::users::{Role, UserId};

#[derive(Debug, Clone)]
struct RefreshTokenEntry {
    user_id: UserId,
    // Snapshot at issue time
    #[allow(dead_code)]
    username: String,
    #[allow(dead_code)]
    role: Role,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl RefreshTokenEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Refresh tokens held in a sharded concurrent map.
///
/// Each key's read-modify-write runs under its shard lock, so validation,
/// revocation and lazy eviction of one token are atomic. State is lost on
/// restart and not shared between processes.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshTokenEntry>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, dead ones included
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Role,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let token = generate_refresh_token();
        self.tokens.insert(
            hash_token(&token),
            RefreshTokenEntry {
                user_id,
                username: username.to_string(),
                role,
                expires_at,
                revoked: false,
            },
        );
        Ok(token)
    }

    async fn validate(&self, token: &str) -> Result<Option<UserId>, AppError> {
        let now = Utc::now();
        match self.tokens.entry(hash_token(token)) {
            Entry::Vacant(_) => Ok(None),
            Entry::Occupied(entry) if entry.get().is_live(now) => Ok(Some(entry.get().user_id)),
            Entry::Occupied(entry) => {
                let (_, dead) = entry.remove_entry();
                tracing::debug!(
                    user_id = %dead.user_id,
                    revoked = dead.revoked,
                    "Evicted unusable refresh token"
                );
                Ok(None)
            }
        }
    }

    async fn revoke(&self, token: &str) -> Result<bool, AppError> {
        match self.tokens.get_mut(&hash_token(token)) {
            Some(mut entry) => {
                entry.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<(), AppError> {
        let mut revoked = 0usize;
        for mut entry in self.tokens.iter_mut() {
            if entry.user_id == user_id && !entry.revoked {
                entry.revoked = true;
                revoked += 1;
            }
        }

        tracing::info!(user_id = %user_id, revoked, "All refresh tokens revoked for user");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut removed = 0u64;
        self.tokens.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
