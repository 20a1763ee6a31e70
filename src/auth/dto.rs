use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Optional request body for token refresh; the refresh cookie takes
/// precedence when both are present.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh. The refresh token travels in an
/// HTTP-only cookie, never in this body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_email_verified: bool,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            is_email_verified: u.is_email_verified,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_drops_sensitive_fields() {
        let user = User {
            id: 3,
            name: "Bob".into(),
            email: "b@x.com".into(),
            password_hash: Some("hash".into()),
            google_id: Some("g-123".into()),
            is_email_verified: false,
            refresh_token_hash: Some("hash".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let public = PublicUser::from(user);
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("b@x.com"));
        assert!(!json.contains("hash"));
        assert!(!json.contains("g-123"));
    }
}
