/// JWT Token Generation and Validation
///
/// HS256 access tokens with issuer, audience and expiry checks. Validation
/// allows no clock skew.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::error::{AppError, AuthError};
use crate::users::{Role, UserId};

/// Issues and verifies signed access tokens
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenSigner {
    /// # Arguments
    /// * `secret` - Shared HMAC secret, already resolved from configuration
    /// * `issuer` - Value of the `iss` claim
    /// * `audience` - Value of the `aud` claim
    /// * `ttl` - Lifetime of issued tokens
    pub fn new(secret: &str, issuer: &str, audience: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    /// Sign an access token for a user
    ///
    /// # Returns
    /// The compact token and its absolute expiry
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue(
        &self,
        user_id: UserId,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims::new(
            user_id,
            username,
            email,
            role,
            &self.issuer,
            &self.audience,
            now.timestamp(),
            expires_at.timestamp(),
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok((token, expires_at))
    }

    /// Validate signature, issuer, audience and expiry, returning the claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation error: {}", e);
                AuthError::TokenInvalid
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET, "test", "test-client", Duration::minutes(60))
    }

    #[test]
    fn test_generate_and_validate_token() {
        let signer = signer();
        let before = Utc::now();

        let (token, expires_at) = signer
            .issue(7, "alice", "alice@x.com", Role::Patient)
            .expect("Failed to generate token");
        let claims = signer.validate(&token).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.unique_name, "alice");
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.role, "Patient");
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.aud, "test-client");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(expires_at >= before + Duration::minutes(59));
    }

    #[test]
    fn test_invalid_token() {
        assert!(signer().validate("invalid.token.here").is_err());
    }

    #[test]
    fn test_tampered_token() {
        let (token, _) = signer().issue(7, "alice", "alice@x.com", Role::Patient).unwrap();
        let tampered = format!("{}X", token);

        assert_eq!(signer().validate(&tampered), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_secret() {
        let (token, _) = signer().issue(7, "alice", "alice@x.com", Role::Patient).unwrap();
        let other = TokenSigner::new(
            "a-completely-different-secret-of-32-bytes",
            "test",
            "test-client",
            Duration::minutes(60),
        );

        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let (token, _) = signer().issue(7, "alice", "alice@x.com", Role::Patient).unwrap();
        let other = TokenSigner::new(SECRET, "wrong-issuer", "test-client", Duration::minutes(60));

        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_audience() {
        let (token, _) = signer().issue(7, "alice", "alice@x.com", Role::Patient).unwrap();
        let other = TokenSigner::new(SECRET, "test", "someone-else", Duration::minutes(60));

        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected_despite_valid_signature() {
        let expired = TokenSigner::new(SECRET, "test", "test-client", Duration::seconds(-5));
        let (token, _) = expired.issue(7, "alice", "alice@x.com", Role::Patient).unwrap();

        // Same key, issuer and audience: only the expiry is wrong
        assert_eq!(signer().validate(&token), Err(AuthError::TokenInvalid));
    }
}
