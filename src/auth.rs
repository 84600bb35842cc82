// Bearer-token authentication
//
// Stateless HS256 tokens carrying the user id. Ownership scoping in the
// job and payment stores builds on the id extracted here; this module only
// answers "who is calling".

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{DubError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// Shared signing/verification keys, derived once from the configured
/// secret.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    token_ttl_secs: u64,
}

impl AuthKeys {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            exp: Utc::now().timestamp() + self.token_ttl_secs as i64,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| DubError::Unauthorized(format!("Failed to issue token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| DubError::Unauthorized(format!("Invalid token: {}", e)))?;
        Ok(data.claims.sub)
    }
}

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Handlers taking this parameter reject unauthenticated requests
/// with 401 before running.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = DubError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let keys = AuthKeys::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                DubError::Unauthorized("Missing Authorization header".to_string())
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            DubError::Unauthorized("Authorization header is not a bearer token".to_string())
        })?;

        let user_id = keys.verify_token(token)?;
        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AuthKeys {
        AuthKeys::new(&AuthConfig {
            secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
        })
    }

    #[test]
    fn test_token_round_trip() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token = keys.issue_token(user_id).unwrap();
        assert_eq!(keys.verify_token(&token).unwrap(), user_id);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let keys = keys();
        let token = keys.issue_token(Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(keys.verify_token(&tampered).is_err());

        let other = AuthKeys::new(&AuthConfig {
            secret: "other-secret".to_string(),
            token_ttl_secs: 3600,
        });
        assert!(other.verify_token(&token).is_err());
    }
}
