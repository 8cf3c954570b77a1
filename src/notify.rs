use anyhow::anyhow;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    Message, SmtpTransport, Transport,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

/// External collaborator that delivers a reset token to the account's
/// contact address. Implementations guarantee at-least-once delivery;
/// callers invoke it only after the token has been persisted.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let mailer = SmtpTransport::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .pool_config(PoolConfig::new().max_size(2))
            .timeout(Some(std::time::Duration::from_secs(10)))
            .build();
        let from = config
            .from
            .parse()
            .map_err(|e| anyhow!("invalid SMTP_FROM address: {e}"))?;
        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl ResetNotifier for SmtpNotifier {
    async fn deliver(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .parse()
                .map_err(|e| anyhow!("invalid recipient address: {e}"))?)
            .subject("Password reset")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "A password reset was requested for your account.\n\n\
                 Reset token: {token}\n\n\
                 The token is valid for a short time only. If you did not \
                 request a reset, you can ignore this message."
            ))?;
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&message).map(|_| ())).await??;
        info!(%email, "reset token mailed");
        Ok(())
    }
}

/// Development fallback when SMTP is not configured.
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn deliver(&self, email: &str, token: &str) -> anyhow::Result<()> {
        warn!(%email, %token, "smtp not configured; logging reset token instead of mailing it");
        Ok(())
    }
}
