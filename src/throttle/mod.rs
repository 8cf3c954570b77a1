use std::net::IpAddr;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    auth::dto::{is_valid_email, CredentialsForm},
    errors::ApiError,
    net,
    state::AppState,
};

pub mod store;

pub use store::{MemoryThrottleStore, PgThrottleStore, ThrottleStore};

const AUTH_PATH: &str = "/v1/auth";

/// Largest form body the login-email dimension will inspect.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// One rate-limit dimension: fixed-size window buckets counted per
/// discriminator.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub limit: i64,
    pub period_secs: i64,
}

impl Rule {
    pub fn bucket(&self, now: OffsetDateTime) -> i64 {
        now.unix_timestamp() / self.period_secs
    }

    pub fn key(&self, discriminator: &str) -> String {
        format!("{}:{}", self.name, discriminator)
    }

    pub fn exceeded(&self, count: i64) -> bool {
        count > self.limit
    }

    /// Counters are kept for two windows past `now` so a just-rolled bucket
    /// is never pruned out from under a concurrent increment.
    pub fn expiry(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + Duration::seconds(2 * self.period_secs)
    }
}

/// All requests, any path.
pub const REQ_IP: Rule = Rule {
    name: "req/ip",
    limit: 300,
    period_secs: 300,
};

/// Authentication attempts per client address.
pub const LOGINS_IP: Rule = Rule {
    name: "logins/ip",
    limit: 5,
    period_secs: 20,
};

/// Authentication attempts per submitted email, so one address cannot be
/// brute-forced from a swarm of client IPs.
pub const LOGINS_EMAIL: Rule = Rule {
    name: "logins/email",
    limit: 5,
    period_secs: 20,
};

/// Admission check in front of every handler. Any exceeded dimension
/// rejects the request before it reaches the router.
pub async fn admit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.throttle.enabled {
        return Ok(next.run(req).await);
    }

    let (parts, body) = req.into_parts();
    let ip = net::client_ip(&parts.headers, &parts.extensions);
    let path = parts.uri.path().to_string();
    let now = state.clock.now();

    check(&state, &REQ_IP, &ip.to_string(), now, &path, ip, None).await?;

    let body = if parts.method == Method::POST && path == AUTH_PATH {
        let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("buffering form body: {e}")))?;
        let email = login_email(&bytes);
        check(
            &state,
            &LOGINS_IP,
            &ip.to_string(),
            now,
            &path,
            ip,
            email.as_deref(),
        )
        .await?;
        if let Some(email) = &email {
            check(&state, &LOGINS_EMAIL, email, now, &path, ip, Some(email)).await?;
        }
        Body::from(bytes)
    } else {
        body
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}

async fn check(
    state: &AppState,
    rule: &Rule,
    discriminator: &str,
    now: OffsetDateTime,
    path: &str,
    ip: IpAddr,
    email: Option<&str>,
) -> Result<(), ApiError> {
    let count = state
        .throttle
        .incr(&rule.key(discriminator), rule.bucket(now), rule.expiry(now))
        .await?;
    if rule.exceeded(count) {
        // Alerting is observability only; the admission decision is already
        // made at this point.
        warn!(
            rule = rule.name,
            %path,
            %ip,
            email = email.unwrap_or(""),
            count,
            limit = rule.limit,
            "request throttled"
        );
        return Err(ApiError::Throttled);
    }
    Ok(())
}

/// The email dimension only applies when the form carries a well-formed
/// address; anything else is simply not counted there.
fn login_email(body: &[u8]) -> Option<String> {
    let form: CredentialsForm = serde_urlencoded::from_bytes(body).ok()?;
    let email = form.email()?.to_string();
    if !is_valid_email(&email) {
        return None;
    }
    Some(email)
}

/// Periodically drops counters whose window has long passed.
pub fn spawn_prune(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            match state.throttle.prune(state.clock.now()).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned expired throttle counters"),
                Err(err) => warn!(error = %err, "throttle counter prune failed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::throttle::store::MemoryThrottleStore;
    use std::sync::Arc;
    use time::macros::datetime;

    fn state_with_clock(clock: Arc<ManualClock>) -> AppState {
        let fake = AppState::fake();
        AppState::from_parts(
            fake.db.clone(),
            fake.config.clone(),
            Arc::new(MemoryThrottleStore::new()),
            fake.notifier.clone(),
            clock,
        )
    }

    #[tokio::test]
    async fn sixth_login_attempt_in_a_window_is_throttled() {
        let state = AppState::fake();
        let now = state.clock.now();
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        for _ in 0..5 {
            check(&state, &LOGINS_IP, "1.2.3.4", now, AUTH_PATH, ip, None)
                .await
                .expect("under the limit");
        }
        let err = check(&state, &LOGINS_IP, "1.2.3.4", now, AUTH_PATH, ip, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Throttled));
    }

    #[tokio::test]
    async fn window_rollover_admits_again() {
        let clock = Arc::new(ManualClock::at(datetime!(2026-01-01 00:00 UTC)));
        let state = state_with_clock(clock.clone());
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        for _ in 0..6 {
            let _ = check(
                &state,
                &LOGINS_IP,
                "1.2.3.4",
                state.clock.now(),
                AUTH_PATH,
                ip,
                None,
            )
            .await;
        }
        clock.advance(Duration::seconds(20));
        check(
            &state,
            &LOGINS_IP,
            "1.2.3.4",
            state.clock.now(),
            AUTH_PATH,
            ip,
            None,
        )
        .await
        .expect("fresh window admits again");
    }

    #[tokio::test]
    async fn dimensions_do_not_bleed_into_each_other() {
        let state = AppState::fake();
        let now = state.clock.now();
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        for _ in 0..5 {
            check(&state, &LOGINS_IP, "1.2.3.4", now, AUTH_PATH, ip, None)
                .await
                .expect("under the limit");
        }
        // same discriminator, different rule: separate counter
        check(
            &state,
            &LOGINS_EMAIL,
            "a@x.com",
            now,
            AUTH_PATH,
            ip,
            Some("a@x.com"),
        )
        .await
        .expect("email dimension starts fresh");
    }

    #[test]
    fn bucket_rolls_over_at_period_boundaries() {
        let start = datetime!(2026-01-01 00:00 UTC);
        let b0 = LOGINS_IP.bucket(start);
        assert_eq!(LOGINS_IP.bucket(start + Duration::seconds(19)), b0);
        assert_eq!(LOGINS_IP.bucket(start + Duration::seconds(20)), b0 + 1);
    }

    #[test]
    fn key_embeds_rule_and_discriminator() {
        assert_eq!(LOGINS_IP.key("1.2.3.4"), "logins/ip:1.2.3.4");
        assert_eq!(LOGINS_EMAIL.key("a@x.com"), "logins/email:a@x.com");
    }

    #[test]
    fn limit_is_exceeded_strictly_above() {
        assert!(!LOGINS_IP.exceeded(5));
        assert!(LOGINS_IP.exceeded(6));
        assert!(!REQ_IP.exceeded(300));
        assert!(REQ_IP.exceeded(301));
    }

    #[test]
    fn expiry_outlives_the_window() {
        let now = datetime!(2026-01-01 00:00 UTC);
        assert_eq!(LOGINS_IP.expiry(now), now + Duration::seconds(40));
    }

    #[test]
    fn extracts_well_formed_login_email() {
        assert_eq!(
            login_email(b"user%5Bemail%5D=a%40x.com&user%5Bpassword%5D=pw"),
            Some("a@x.com".to_string())
        );
    }

    #[test]
    fn skips_blank_or_malformed_email() {
        assert_eq!(login_email(b"user%5Bemail%5D=&user%5Bpassword%5D=pw"), None);
        assert_eq!(login_email(b"user%5Bemail%5D=nonsense"), None);
        assert_eq!(login_email(b"password=only"), None);
        assert_eq!(login_email(b"%zz"), None);
    }
}
