use axum::async_trait;
use lettre::{
    message::MultiPart,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound mail abstraction so handlers and tests never touch SMTP directly.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_verification_email(&self, to: &str, verify_url: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from_address: cfg.from_address.clone(),
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_verification_email(&self, to: &str, verify_url: &str) -> anyhow::Result<()> {
        let text = format!("Verify your email by opening this link: {}", verify_url);
        let html = format!(
            "<h2>Email Verification</h2>\
             <p>Click the link below to verify your email:</p>\
             <a href=\"{url}\" target=\"_blank\">Verify Email</a>\
             <p>If you did not sign up, you can ignore this message.</p>",
            url = verify_url
        );

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject("Verify your email")
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        self.transport.send(email).await?;
        info!(to = %to, "verification email sent");
        Ok(())
    }
}
