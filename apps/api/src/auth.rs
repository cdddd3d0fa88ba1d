use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use auditvault_core::{AppError, AppResult, AuthClaims};

/// HS256 bearer-token authenticator sharing one symmetric secret.
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration: Duration,
}

impl JwtAuthenticator {
    #[must_use]
    pub fn new(secret: &str, expiration_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration: Duration::hours(expiration_hours),
        }
    }

    /// Issues a token for the given identity. Used by operator tooling.
    pub fn generate(
        &self,
        user_id: &str,
        tenant_id: Uuid,
        roles: Vec<String>,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = AuthClaims {
            user_id: user_id.to_owned(),
            tenant_id,
            roles,
            exp: (now + self.expiration).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign token: {error}")))
    }

    /// Verifies signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> AppResult<AuthClaims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<AuthClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("invalid or expired token".to_owned()))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> AppResult<&str> {
    let mut parts = header_value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AppError::Unauthorized(
            "invalid authorization header format".to_owned(),
        )),
    }
}
