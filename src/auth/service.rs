use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::PublicUser;
use super::google::GoogleUser;
use super::jwt::TokenKeys;
use super::password::{hash_secret, verify_secret};
use super::repo::User;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A freshly issued access/refresh pair. The refresh token leaves the server
/// exactly once, here; only its hash is stored.
#[derive(Debug)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Sign a new token pair and overwrite the stored refresh-token hash,
/// revoking whatever session existed before.
async fn issue_session(st: &AppState, user: User) -> ApiResult<IssuedSession> {
    let keys = TokenKeys::from_ref(st);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;

    let hash = hash_secret(&refresh_token)?;
    st.users.set_refresh_token_hash(user.id, &hash).await?;

    Ok(IssuedSession {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

/// Create an unverified local account and send the verification email.
/// Never hands out tokens; the user has to verify and log in.
pub async fn register(st: &AppState, name: &str, email: &str, password: &str) -> ApiResult<()> {
    if st.users.find_by_email(email).await?.is_some() {
        // Covers OAuth-only rows too: a local register on a Google email
        // is rejected rather than silently merged.
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_secret(password)?;
    let user = st.users.create_local(name, email, &password_hash).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    let keys = TokenKeys::from_ref(st);
    let token = keys.sign_verification(user.id)?;
    let verify_url = format!("{}/auth/verify-email?token={}", st.config.app_url, token);

    if let Err(e) = st.mailer.send_verification_email(&user.email, &verify_url).await {
        warn!(error = %e, user_id = %user.id, "verification email send failed");
        // Policy knob: the account exists either way, but fail-closed
        // surfaces the delivery error to the caller.
        if st.config.fail_registration_on_mail_error {
            return Err(ApiError::Delivery(e.to_string()));
        }
    }

    Ok(())
}

pub async fn login(st: &AppState, email: &str, password: &str) -> ApiResult<IssuedSession> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    // OAuth-only accounts have no password; same uniform rejection.
    let Some(password_hash) = user.password_hash.as_deref() else {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_secret(password, password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    if !user.is_email_verified {
        return Err(ApiError::Forbidden("Email not verified".into()));
    }

    info!(user_id = %user.id, "user logged in");
    issue_session(st, user).await
}

/// Rotate-on-use refresh. Every failure mode (bad signature, expiry, wrong
/// kind, unknown user, cleared or mismatched hash) collapses into one
/// uniform denial so a caller cannot probe which check tripped.
pub async fn refresh(st: &AppState, presented: &str) -> ApiResult<IssuedSession> {
    match refresh_inner(st, presented).await {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!(error = %e, "refresh denied");
            Err(ApiError::Forbidden("Access denied".into()))
        }
    }
}

async fn refresh_inner(st: &AppState, presented: &str) -> anyhow::Result<IssuedSession> {
    let keys = TokenKeys::from_ref(st);
    let claims = keys.verify_refresh(presented)?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user not found"))?;

    let stored = user
        .refresh_token_hash
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("no active session"))?;

    // A hash mismatch means the presented token was already rotated out
    // (or a logout happened in between). Reuse is denied, not resurrected.
    if !verify_secret(presented, stored)? {
        anyhow::bail!("refresh token does not match stored hash");
    }

    issue_session(st, user)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// Ends the session by dropping the stored hash. Idempotent.
pub async fn logout(st: &AppState, user_id: i64) -> ApiResult<()> {
    st.users.clear_refresh_token_hash(user_id).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

pub async fn get_me(st: &AppState, user_id: i64) -> ApiResult<PublicUser> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(user.into())
}

/// Redeem an email-verification token. Failures collapse into one generic
/// bad-request; re-verifying an already verified account is harmless.
pub async fn verify_email(st: &AppState, token: &str) -> ApiResult<()> {
    match verify_email_inner(st, token).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "email verification denied");
            Err(ApiError::BadRequest("Invalid or expired token".into()))
        }
    }
}

async fn verify_email_inner(st: &AppState, token: &str) -> anyhow::Result<()> {
    let keys = TokenKeys::from_ref(st);
    let claims = keys.verify_verification(token)?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user not found"))?;

    st.users.mark_email_verified(user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(())
}

/// Google login: find-or-create by email, then issue a session exactly like
/// `login`. An existing local account gets the Google id linked on its first
/// Google login.
pub async fn google_login(st: &AppState, google_user: GoogleUser) -> ApiResult<IssuedSession> {
    // Same normalization as register/login; Google may report the mailbox
    // with different casing than the user typed at signup.
    let email = google_user.email.trim().to_lowercase();

    let user = match st.users.find_by_email(&email).await? {
        Some(user) => {
            if user.google_id.is_none() {
                st.users
                    .link_google_id(user.id, &google_user.google_id)
                    .await?;
            }
            user
        }
        None => {
            let user = st
                .users
                .create_google(&google_user.name, &email, &google_user.google_id)
                .await?;
            info!(user_id = %user.id, "user created via google login");
            user
        }
    };

    issue_session(st, user).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::auth::repo::UserStore;
    use crate::mail::MailSender;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[derive(Default)]
    struct InMemoryUsers {
        rows: Mutex<Vec<User>>,
        next_id: AtomicI64,
    }

    impl InMemoryUsers {
        fn get(&self, email: &str) -> Option<User> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned()
        }

        fn count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        fn with<F: FnOnce(&mut User)>(&self, id: i64, f: F) {
            let mut rows = self.rows.lock().unwrap();
            if let Some(u) = rows.iter_mut().find(|u| u.id == id) {
                f(u);
            }
        }

        fn push(&self, mut user: User) -> User {
            user.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.rows.lock().unwrap().push(user.clone());
            user
        }
    }

    #[async_trait]
    impl UserStore for InMemoryUsers {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self.get(email))
        }

        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn create_local(
            &self,
            name: &str,
            email: &str,
            password_hash: &str,
        ) -> anyhow::Result<User> {
            Ok(self.push(User {
                id: 0,
                name: name.into(),
                email: email.into(),
                password_hash: Some(password_hash.into()),
                google_id: None,
                is_email_verified: false,
                refresh_token_hash: None,
                created_at: OffsetDateTime::now_utc(),
            }))
        }

        async fn create_google(
            &self,
            name: &str,
            email: &str,
            google_id: &str,
        ) -> anyhow::Result<User> {
            Ok(self.push(User {
                id: 0,
                name: name.into(),
                email: email.into(),
                password_hash: None,
                google_id: Some(google_id.into()),
                is_email_verified: true,
                refresh_token_hash: None,
                created_at: OffsetDateTime::now_utc(),
            }))
        }

        async fn set_refresh_token_hash(&self, id: i64, hash: &str) -> anyhow::Result<()> {
            self.with(id, |u| u.refresh_token_hash = Some(hash.into()));
            Ok(())
        }

        async fn clear_refresh_token_hash(&self, id: i64) -> anyhow::Result<()> {
            self.with(id, |u| u.refresh_token_hash = None);
            Ok(())
        }

        async fn mark_email_verified(&self, id: i64) -> anyhow::Result<()> {
            self.with(id, |u| u.is_email_verified = true);
            Ok(())
        }

        async fn link_google_id(&self, id: i64, google_id: &str) -> anyhow::Result<()> {
            self.with(id, |u| {
                if u.google_id.is_none() {
                    u.google_id = Some(google_id.into());
                }
            });
            Ok(())
        }
    }

    /// Records every verification mail so tests can count sends and redeem
    /// the emailed token.
    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailSender for CapturingMailer {
        async fn send_verification_email(&self, _to: &str, verify_url: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(verify_url.to_string());
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl MailSender for FailingMailer {
        async fn send_verification_email(&self, _to: &str, _url: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn test_state() -> (AppState, Arc<InMemoryUsers>, Arc<CapturingMailer>) {
        let users = Arc::new(InMemoryUsers::default());
        let mailer = Arc::new(CapturingMailer::default());
        let mut st = AppState::fake();
        st.users = users.clone();
        st.mailer = mailer.clone();
        (st, users, mailer)
    }

    fn mailed_token(mailer: &CapturingMailer) -> String {
        let url = mailer.sent.lock().unwrap().last().cloned().expect("a mail was sent");
        url.split("token=").nth(1).expect("token in url").to_string()
    }

    #[tokio::test]
    async fn register_sends_one_mail_and_duplicate_conflicts() {
        let (st, users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        assert!(!users.get("a@x.com").unwrap().is_email_verified);

        let err = register(&st, "Alice", "a@x.com", "other-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(users.count(), 1);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_on_google_only_email_conflicts() {
        let (st, users, _mailer) = test_state();

        google_login(
            &st,
            GoogleUser {
                email: "g@x.com".into(),
                name: "G".into(),
                google_id: "g-1".into(),
            },
        )
        .await
        .unwrap();

        let err = register(&st, "G", "g@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(users.count(), 1);
    }

    #[tokio::test]
    async fn login_requires_verification_then_succeeds() {
        let (st, _users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();

        let err = login(&st, "a@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        verify_email(&st, &mailed_token(&mailer)).await.unwrap();

        let session = login(&st, "a@x.com", "pw123456").await.unwrap();
        assert_eq!(session.user.email, "a@x.com");
        assert!(session.user.is_email_verified);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_email() {
        let (st, _users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();
        verify_email(&st, &mailed_token(&mailer)).await.unwrap();

        let err = login(&st, "a@x.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = login(&st, "nobody@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_rotates_and_denies_reuse_of_old_token() {
        let (st, _users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();
        verify_email(&st, &mailed_token(&mailer)).await.unwrap();
        let session = login(&st, "a@x.com", "pw123456").await.unwrap();

        let rotated = refresh(&st, &session.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);

        // The pre-rotation token was invalidated by the rotation itself.
        let err = refresh(&st, &session.refresh_token).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        // The rotated token still works.
        refresh(&st, &rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn logout_kills_the_session_and_is_idempotent() {
        let (st, _users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();
        verify_email(&st, &mailed_token(&mailer)).await.unwrap();
        let session = login(&st, "a@x.com", "pw123456").await.unwrap();

        logout(&st, session.user.id).await.unwrap();
        logout(&st, session.user.id).await.unwrap();

        let err = refresh(&st, &session.refresh_token).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn tampered_verification_token_mutates_nothing() {
        let (st, users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();

        let mut token = mailed_token(&mailer);
        token.push('x');
        let err = verify_email(&st, &token).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(!users.get("a@x.com").unwrap().is_email_verified);
    }

    #[tokio::test]
    async fn google_login_normalizes_email_and_links_existing_account() {
        let (st, users, mailer) = test_state();

        register(&st, "Alice", "a@x.com", "pw123456").await.unwrap();
        verify_email(&st, &mailed_token(&mailer)).await.unwrap();

        // Google reports the same mailbox with different casing; this must
        // land on the existing row, not mint a second account.
        let session = google_login(
            &st,
            GoogleUser {
                email: "  A@X.com ".into(),
                name: "Alice".into(),
                google_id: "g-9".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(users.count(), 1);
        assert_eq!(session.user.email, "a@x.com");
        assert_eq!(users.get("a@x.com").unwrap().google_id.as_deref(), Some("g-9"));
    }

    #[tokio::test]
    async fn google_login_creates_a_verified_passwordless_user() {
        let (st, users, _mailer) = test_state();

        let session = google_login(
            &st,
            GoogleUser {
                email: "New@X.com".into(),
                name: "New".into(),
                google_id: "g-2".into(),
            },
        )
        .await
        .unwrap();

        let row = users.get("new@x.com").expect("user created lowercased");
        assert!(row.is_email_verified);
        assert!(row.password_hash.is_none());
        assert_eq!(row.google_id.as_deref(), Some("g-2"));

        // And the issued refresh token is live.
        refresh(&st, &session.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn mail_failure_policy_fail_closed_and_fail_open() {
        // Fail-closed (default): the delivery error surfaces, the row stays.
        let (mut st, users, _mailer) = test_state();
        st.mailer = Arc::new(FailingMailer);
        let err = register(&st, "Alice", "a@x.com", "pw123456")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Delivery(_)));
        assert_eq!(users.count(), 1);

        // Fail-open: same failure is swallowed.
        let mut cfg = (*st.config).clone();
        cfg.fail_registration_on_mail_error = false;
        st.config = Arc::new(cfg);
        register(&st, "Bob", "b@x.com", "pw123456").await.unwrap();
        assert_eq!(users.count(), 2);
    }
}
