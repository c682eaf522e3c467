use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{NewUser, User, UserId, UserRepository};
use crate::error::AppError;

/// Process-local user table. Ids start at 1 and increase monotonically.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the active flag of an account. Returns false if the id is unknown.
    pub async fn set_active(&self, user_id: UserId, is_active: bool) -> bool {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) => {
                user.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn exists(&self, username: &str, email: &str) -> Result<bool, AppError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .any(|u| u.username == username || u.email == email))
    }

    async fn create(&self, user: NewUser) -> Result<UserId, AppError> {
        // Check and insert under one write lock, like a unique index would
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::duplicate_user());
        }

        let user_id = users.last().map_or(1, |u| u.user_id + 1);
        users.push(User {
            user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
        });

        Ok(user_id)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.user_id == user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Patient,
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_sequentially() {
        let repo = InMemoryUserRepository::new();
        assert_eq!(repo.create(new_user("alice", "alice@x.com")).await.unwrap(), 1);
        assert_eq!(repo.create(new_user("bob", "bob@x.com")).await.unwrap(), 2);
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        let same_name = repo.create(new_user("alice", "other@x.com")).await;
        let same_email = repo.create(new_user("other", "alice@x.com")).await;

        assert!(matches!(same_name, Err(AppError::Conflict(_))));
        assert!(matches!(same_email, Err(AppError::Conflict(_))));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_login_matches_username_or_email() {
        let repo = InMemoryUserRepository::new();
        let id = repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        assert_eq!(repo.find_by_login("alice").await.unwrap().unwrap().user_id, id);
        assert_eq!(repo.find_by_login("alice@x.com").await.unwrap().unwrap().user_id, id);
        assert!(repo.find_by_login("ALICE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_active() {
        let repo = InMemoryUserRepository::new();
        let id = repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        assert!(repo.set_active(id, false).await);
        assert!(!repo.find_by_id(id).await.unwrap().unwrap().is_active);
        assert!(!repo.set_active(99, false).await);
    }
}
