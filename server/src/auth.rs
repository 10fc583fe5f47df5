//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the account id and username. Issued
//! lifetime is capped at one hour; signature or expiry failures reject the
//! request before any handler runs.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

const ISSUER: &str = "takeaway-dine-in-system";

pub const MAX_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    uid: i64,
    iat: i64,
    exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::Internal(Box::new(e)))
}

pub fn check_password(password: &str, password_hash: &str) -> Result<(), AppError> {
    match verify(password, password_hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::Unauthorized),
        Err(e) => Err(AppError::Internal(Box::new(e))),
    }
}

/// Clamps a client-requested token lifetime to (0, 1 hour].
pub fn clamp_lifetime(requested_secs: i64) -> i64 {
    if requested_secs <= 0 || requested_secs > MAX_TOKEN_LIFETIME_SECS {
        MAX_TOKEN_LIFETIME_SECS
    } else {
        requested_secs
    }
}

pub fn make_jwt(
    account_id: i64,
    username: &str,
    lifetime: Duration,
    key: &str,
) -> Result<String, AppError> {
    let now = Utc::now();

    let claims = Claims {
        iss: ISSUER.to_string(),
        sub: username.to_string(),
        uid: account_id,
        iat: now.timestamp(),
        exp: (now + lifetime).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .map_err(|e| AppError::Internal(Box::new(e)))
}

/// Returns the `(username, account id)` pair from a verified token.
pub fn validate_jwt(token: &str, key: &str) -> Result<(String, i64), AppError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(key.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized)?;

    Ok((data.claims.sub, data.claims.uid))
}

pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let header = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

/// The verified identity behind a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: i64,
    pub username: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let (username, account_id) = validate_jwt(&token, &state.config.auth_key)?;

        Ok(Self {
            account_id,
            username,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const KEY: &str = "test-signing-key";

    #[test]
    fn round_trips_valid_token() {
        let token = make_jwt(123, "testuser", Duration::minutes(5), KEY).unwrap();

        let (username, account_id) = validate_jwt(&token, KEY).unwrap();

        assert_eq!(username, "testuser");
        assert_eq!(account_id, 123);
    }

    #[test]
    fn rejects_wrong_key() {
        let token = make_jwt(456, "anotheruser", Duration::minutes(5), KEY).unwrap();

        assert!(matches!(
            validate_jwt(&token, "wrong_secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let token = make_jwt(789, "expireduser", Duration::minutes(-1), KEY).unwrap();

        assert!(validate_jwt(&token, KEY).is_err());
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(validate_jwt("not.a.jwt.token", KEY).is_err());
    }

    #[test]
    fn clamps_requested_lifetime() {
        assert_eq!(clamp_lifetime(0), MAX_TOKEN_LIFETIME_SECS);
        assert_eq!(clamp_lifetime(-30), MAX_TOKEN_LIFETIME_SECS);
        assert_eq!(clamp_lifetime(60), 60);
        assert_eq!(clamp_lifetime(7200), MAX_TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn parses_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));

        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.remove("Authorization");
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("hunter2").unwrap();

        assert!(check_password("hunter2", &hashed).is_ok());
        assert!(matches!(
            check_password("wrong", &hashed),
            Err(AppError::Unauthorized)
        ));
    }
}
