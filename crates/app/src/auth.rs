use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use store_admin_core::Store;
use store_admin_storage::CatalogError;

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Verifies session tokens issued by the authentication provider.
#[derive(Clone)]
pub struct AuthTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthTokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        // Expiry is checked against the application clock instead.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Returns the user id carried by `token`.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(err.to_string()))?
            .claims;

        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf {
                return Err(TokenError::Invalid("token_not_yet_valid".to_string()));
            }
        }
        if now_ts >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("missing_subject".to_string()));
        }
        Ok(claims.sub)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token expired")]
    Expired,
}

/// Signed-in dashboard user, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ProblemResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(ProblemResponse::unauthorized)?;

        let user_id = state
            .token_validator()
            .validate(token, state.now())
            .map_err(|err| {
                debug!(stage = "auth", error = %err, "rejected session token");
                ProblemResponse::unauthorized()
            })?;

        Ok(Self { user_id })
    }
}

impl AuthUser {
    /// Loads `store_id` and checks that it belongs to this user.
    pub async fn owned_store(
        &self,
        state: &AppState,
        store_id: &str,
    ) -> Result<Store, ProblemResponse> {
        let store = state
            .storage()
            .stores()
            .fetch(store_id)
            .await
            .map_err(|err| match err {
                CatalogError::NotFound => ProblemResponse::not_found("Store"),
                other => ProblemResponse::from(other),
            })?;

        if store.user_id != self.user_id {
            return Err(ProblemResponse::forbidden());
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    use crate::fixtures::{fixed_now, token_for, TOKEN_SECRET, USER_ID};

    #[test]
    fn accepts_valid_token() {
        let validator = AuthTokenValidator::new(TOKEN_SECRET);
        let user = validator
            .validate(&token_for(USER_ID), fixed_now())
            .expect("valid token");
        assert_eq!(user, USER_ID);
    }

    #[test]
    fn rejects_expired_token() {
        let validator = AuthTokenValidator::new(TOKEN_SECRET);
        let later = fixed_now() + Duration::hours(2);
        let err = validator
            .validate(&token_for(USER_ID), later)
            .expect_err("expired");
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let claims = TokenClaims {
            sub: USER_ID.to_string(),
            exp: fixed_now().timestamp() + 3600,
            nbf: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"other-secret"),
        )
        .expect("encode");

        let validator = AuthTokenValidator::new(TOKEN_SECRET);
        assert!(matches!(
            validator.validate(&token, fixed_now()),
            Err(TokenError::Invalid(_))
        ));
    }
}
