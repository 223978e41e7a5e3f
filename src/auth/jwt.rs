use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::{claims::Claims, repo_types::User};
use crate::{config::JwtConfig, state::AppState};

/// Why a token was rejected. Callers outside this module collapse all of
/// these into a single "invalid token" outcome.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Holds HS256 signing and verification keys with the token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }

    /// Issues a token for `user` expiring `ttl` from now.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = self.encode(&claims)?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    pub fn encode(&self, claims: &Claims) -> anyhow::Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use uuid::Uuid;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_minutes: 60 * 24,
        })
    }

    fn make_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "traveller@example.com".into(),
            name: "Traveller".into(),
            password_digest: "unused".into(),
            bio: None,
            location: None,
            website: None,
            avatar_url: None,
            reset_token: None,
            reset_token_issued_at: None,
            role: Role::User,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn unix_now() -> usize {
        OffsetDateTime::now_utc().unix_timestamp() as usize
    }

    #[test]
    fn sign_and_verify_token() {
        let keys = make_keys("dev-secret");
        let user = make_user();
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, user.email);
    }

    #[test]
    fn expiry_is_a_day_out() {
        let keys = make_keys("dev-secret");
        let claims = keys.verify(&keys.sign(&make_user()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn decode_returns_encoded_claims() {
        let keys = make_keys("dev-secret");
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
            iat: unix_now(),
            exp: unix_now() + 600,
        };
        let token = keys.encode(&claims).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), claims);
    }

    #[test]
    fn verify_rejects_other_secret() {
        let good_keys = make_keys("same-secret");
        let bad_keys = make_keys("other-secret");
        let token = good_keys.sign(&make_user()).expect("sign");
        assert_eq!(bad_keys.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret");
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
            iat: unix_now() - 7200,
            exp: unix_now() - 3600,
        };
        let token = keys.encode(&claims).unwrap();
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("not.a.jwt"), Err(TokenError::Malformed));
        assert_eq!(keys.verify(""), Err(TokenError::Malformed));
    }
}
