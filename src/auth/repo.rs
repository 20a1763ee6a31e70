use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, google_id, is_email_verified, refresh_token_hash, created_at";

/// User record. At least one of `password_hash` / `google_id` is always set
/// (enforced by a table CHECK). `refresh_token_hash` holds an argon2 hash of
/// the current refresh token while a session is active.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

/// User persistence, behind a trait like storage and mail so the session
/// lifecycle can be exercised without a live database.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    /// Create a local (password) account, unverified.
    async fn create_local(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User>;
    /// Create an account from a Google profile. Google emails arrive
    /// verified, so the flag starts true and there is no password.
    async fn create_google(
        &self,
        name: &str,
        email: &str,
        google_id: &str,
    ) -> anyhow::Result<User>;
    /// Overwrite the stored refresh-token hash. This is what rotates a
    /// session: the previous token stops matching immediately.
    async fn set_refresh_token_hash(&self, id: i64, hash: &str) -> anyhow::Result<()>;
    async fn clear_refresh_token_hash(&self, id: i64) -> anyhow::Result<()>;
    async fn mark_email_verified(&self, id: i64) -> anyhow::Result<()>;
    /// Attach a Google id to an existing local account (first Google login).
    async fn link_google_id(&self, id: i64, google_id: &str) -> anyhow::Result<()>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_local(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, is_email_verified)
            VALUES ($1, $2, $3, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_google(
        &self,
        name: &str,
        email: &str,
        google_id: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, google_id, is_email_verified)
            VALUES ($1, $2, $3, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(google_id)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token_hash(&self, id: i64, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn clear_refresh_token_hash(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_email_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn link_google_id(&self, id: i64, google_id: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET google_id = $2 WHERE id = $1 AND google_id IS NULL")
            .bind(id)
            .bind(google_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
