//! Storage tests against a real Postgres instance.
//!
//! Run with `cargo test -- --ignored` once the database from
//! `configuration/base.yaml` is reachable. Each test creates its own
//! throwaway database.

use chrono::{Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};

use hospital_auth::auth::{PostgresRefreshTokenStore, RefreshTokenStore};
use hospital_auth::configuration::{get_configuration, DatabaseSettings, Environment};
use hospital_auth::error::AppError;
use hospital_auth::users::{NewUser, PostgresUserRepository, Role, UserRepository};

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn test_pool() -> PgPool {
    let mut configuration =
        get_configuration(Environment::Development).expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    configure_database(&configuration.database).await
}

fn new_user(username: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholderplace".to_string(),
        role,
    }
}

// --- User Repository Tests ---

#[tokio::test]
#[ignore]
async fn users_round_trip_through_postgres() {
    let pool = test_pool().await;
    let repo = PostgresUserRepository::new(pool);

    let user_id = repo
        .create(new_user("house", "house@x.com", Role::Doctor))
        .await
        .expect("Failed to create user");

    let by_name = repo.find_by_login("house").await.unwrap().expect("missing by username");
    let by_email = repo.find_by_login("house@x.com").await.unwrap().expect("missing by email");
    let by_id = repo.find_by_id(user_id).await.unwrap().expect("missing by id");

    for user in [by_name, by_email, by_id] {
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::Doctor);
        assert!(user.is_active);
    }
    assert!(repo.exists("house", "nobody@x.com").await.unwrap());
    assert!(!repo.exists("nobody", "nobody@x.com").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn unique_index_rejects_duplicate_accounts() {
    let pool = test_pool().await;
    let repo = PostgresUserRepository::new(pool);
    repo.create(new_user("alice", "alice@x.com", Role::Patient))
        .await
        .unwrap();

    let same_name = repo.create(new_user("alice", "other@x.com", Role::Patient)).await;
    let same_email = repo.create(new_user("bob", "alice@x.com", Role::Patient)).await;

    assert!(matches!(same_name, Err(AppError::Conflict(_))));
    assert!(matches!(same_email, Err(AppError::Conflict(_))));
}

// --- Refresh Token Store Tests ---

#[tokio::test]
#[ignore]
async fn refresh_tokens_validate_until_revoked() {
    let pool = test_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let store = PostgresRefreshTokenStore::new(pool.clone());
    let user_id = users
        .create(new_user("alice", "alice@x.com", Role::Patient))
        .await
        .unwrap();

    let token = store
        .issue(user_id, "alice", Role::Patient, Utc::now() + Duration::days(7))
        .await
        .unwrap();

    assert_eq!(store.validate(&token).await.unwrap(), Some(user_id));
    assert!(store.revoke(&token).await.unwrap());
    assert_eq!(store.validate(&token).await.unwrap(), None);
    assert!(!store.revoke("never-issued").await.unwrap());

    // Only digests are persisted
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE token_hash = $1")
        .bind(&token)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
#[ignore]
async fn expired_refresh_tokens_are_rejected_and_evicted() {
    let pool = test_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let store = PostgresRefreshTokenStore::new(pool.clone());
    let user_id = users
        .create(new_user("alice", "alice@x.com", Role::Patient))
        .await
        .unwrap();

    let token = store
        .issue(user_id, "alice", Role::Patient, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    assert_eq!(store.validate(&token).await.unwrap(), None);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore]
async fn revoke_all_ends_every_session_of_one_user() {
    let pool = test_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let store = PostgresRefreshTokenStore::new(pool);
    let alice = users
        .create(new_user("alice", "alice@x.com", Role::Patient))
        .await
        .unwrap();
    let bob = users
        .create(new_user("bob", "bob@x.com", Role::Doctor))
        .await
        .unwrap();
    let expires_at = Utc::now() + Duration::days(7);

    let first = store.issue(alice, "alice", Role::Patient, expires_at).await.unwrap();
    let second = store.issue(alice, "alice", Role::Patient, expires_at).await.unwrap();
    let other = store.issue(bob, "bob", Role::Doctor, expires_at).await.unwrap();

    store.revoke_all(alice).await.unwrap();

    assert_eq!(store.validate(&first).await.unwrap(), None);
    assert_eq!(store.validate(&second).await.unwrap(), None);
    assert_eq!(store.validate(&other).await.unwrap(), Some(bob));

    // Revoking again is harmless
    store.revoke_all(alice).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn purge_removes_only_dead_tokens() {
    let pool = test_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let store = PostgresRefreshTokenStore::new(pool);
    let user_id = users
        .create(new_user("alice", "alice@x.com", Role::Patient))
        .await
        .unwrap();

    let live = store
        .issue(user_id, "alice", Role::Patient, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    let revoked = store
        .issue(user_id, "alice", Role::Patient, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    store
        .issue(user_id, "alice", Role::Patient, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    store.revoke(&revoked).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 2);
    assert_eq!(store.validate(&live).await.unwrap(), Some(user_id));
}
