use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Token type. Each kind is signed with its own secret, so a token of one
/// kind never verifies as another.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Verify,
}

/// JWT payload. `email` is present on access/refresh tokens and absent on
/// email-verification tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
struct SecretPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SecretPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signing and verification keys for the three token kinds.
#[derive(Clone)]
pub struct TokenKeys {
    access: SecretPair,
    refresh: SecretPair,
    verify: SecretPair,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    verify_ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            access_secret,
            refresh_secret,
            verify_secret,
            issuer,
            audience,
            access_ttl_minutes,
            refresh_ttl_minutes,
            verify_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            access: SecretPair::from_secret(&access_secret),
            refresh: SecretPair::from_secret(&refresh_secret),
            verify: SecretPair::from_secret(&verify_secret),
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
            verify_ttl: Duration::from_secs((verify_ttl_minutes as u64) * 60),
        }
    }
}

impl TokenKeys {
    fn pair(&self, kind: TokenKind) -> &SecretPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Verify => &self.verify,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::Verify => self.verify_ttl,
        }
    }

    fn sign_with_kind(
        &self,
        user_id: i64,
        email: Option<&str>,
        kind: TokenKind,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl(kind).as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.map(|e| e.to_string()),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            // Unique per issue: two tokens signed in the same second must
            // still differ, or rotation could not tell them apart.
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.pair(kind).encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, Some(email), TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, Some(email), TokenKind::Refresh)
    }

    pub fn sign_verification(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, None, TokenKind::Verify)
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.pair(kind).decoding, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("unexpected token kind");
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Refresh)
    }

    pub fn verify_verification(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Verify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> TokenKeys {
        let state = AppState::fake();
        TokenKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.sign_access(42, "a@x.com").expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let token = keys.sign_refresh(7, "b@x.com").expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn verification_token_omits_email() {
        let keys = make_keys();
        let token = keys.sign_verification(9).expect("sign verification");
        let claims = keys.verify_verification(&token).expect("verify");
        assert_eq!(claims.sub, 9);
        assert!(claims.email.is_none());
        assert_eq!(claims.kind, TokenKind::Verify);
    }

    #[tokio::test]
    async fn cross_kind_replay_fails() {
        let keys = make_keys();
        let access = keys.sign_access(1, "a@x.com").expect("sign access");
        let refresh = keys.sign_refresh(1, "a@x.com").expect("sign refresh");
        let verify = keys.sign_verification(1).expect("sign verification");

        // Different secret per kind: every cross-check must fail.
        assert!(keys.verify_refresh(&access).is_err());
        assert!(keys.verify_access(&refresh).is_err());
        assert!(keys.verify_verification(&access).is_err());
        assert!(keys.verify_access(&verify).is_err());
        assert!(keys.verify_refresh(&verify).is_err());
    }

    #[tokio::test]
    async fn consecutive_tokens_differ_even_within_one_second() {
        let keys = make_keys();
        let a = keys.sign_refresh(1, "a@x.com").expect("sign refresh");
        let b = keys.sign_refresh(1, "a@x.com").expect("sign refresh");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let mut token = keys.sign_access(1, "a@x.com").expect("sign access");
        token.push('x');
        assert!(keys.verify_access(&token).is_err());
    }
}
