use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub verify_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub verify_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub app_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub google: GoogleConfig,
    pub storage: StorageConfig,
    /// When true, a failed verification-email send fails the whole register
    /// request. The user row is kept either way.
    pub fail_registration_on_mail_error: bool,
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let app_url = std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_SECRET")?,
            refresh_secret: std::env::var("JWT_REFRESH_SECRET")?,
            verify_secret: std::env::var("EMAIL_VERIFY_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "shutterbox".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "shutterbox-users".into()),
            access_ttl_minutes: env_i64("JWT_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
            verify_ttl_minutes: env_i64("EMAIL_VERIFY_TTL_MINUTES", 60 * 24),
        };

        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USER")?,
            password: std::env::var("SMTP_PASSWORD")?,
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Shutterbox <no-reply@shutterbox.app>".into()),
        };

        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID")?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")?,
            redirect_url: std::env::var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|_| format!("{}/auth/google/callback", app_url)),
        };

        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            bucket: std::env::var("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
        };

        let fail_registration_on_mail_error = std::env::var("REGISTER_FAIL_ON_MAIL_ERROR")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            database_url,
            app_url,
            frontend_url,
            jwt,
            smtp,
            google,
            storage,
            fail_registration_on_mail_error,
        })
    }
}
