/// Authentication module
///
/// Password hashing, access token signing, refresh token stores, and the
/// service that ties them to the user repository.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::{Claims, NAME_IDENTIFIER_CLAIM, ROLE_CLAIM};
pub use jwt::TokenSigner;
pub use password::PasswordHasher;
pub use refresh_token::{
    generate_refresh_token, spawn_sweeper, InMemoryRefreshTokenStore, PostgresRefreshTokenStore,
    RefreshTokenStore,
};
pub use service::{AuthService, AuthSession, RegisterCommand};
