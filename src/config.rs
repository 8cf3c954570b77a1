use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleBackend {
    /// In-process counters. Single-instance deployments and tests.
    Memory,
    /// Shared `throttle_counters` table, visible to every instance.
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub backend: ThrottleBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub reset_token_ttl_secs: i64,
    pub hash_timeout_secs: u64,
    pub throttle: ThrottleConfig,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let reset_token_ttl_secs = std::env::var("RESET_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(600);
        let hash_timeout_secs = std::env::var("HASH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        let throttle = ThrottleConfig {
            enabled: std::env::var("THROTTLE_ENABLED")
                .map(|v| v != "false")
                .unwrap_or(true),
            backend: match std::env::var("THROTTLE_BACKEND").as_deref() {
                Ok("postgres") => ThrottleBackend::Postgres,
                _ => ThrottleBackend::Memory,
            },
        };
        let smtp = std::env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@localhost".into()),
        });
        Ok(Self {
            database_url,
            reset_token_ttl_secs,
            hash_timeout_secs,
            throttle,
            smtp,
        })
    }

    /// Window within which a pending reset token is honored.
    pub fn reset_token_ttl(&self) -> time::Duration {
        time::Duration::seconds(self.reset_token_ttl_secs)
    }

    /// Upper bound on a single argon2 hash or verify call.
    pub fn hash_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.hash_timeout_secs)
    }
}
