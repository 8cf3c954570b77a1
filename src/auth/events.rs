use std::net::IpAddr;

use ipnetwork::IpNetwork;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Immutable audit record of one authentication attempt against a known
/// account. Written exactly once per attempt that reaches credential
/// verification; never updated or deleted.
#[derive(Debug, Clone, FromRow)]
pub struct AuthEvent {
    pub id: Uuid,
    pub ip_address: IpNetwork,
    pub user_id: Uuid,
    pub success: bool,
    pub created_at: OffsetDateTime,
}

impl AuthEvent {
    pub async fn record(
        db: &PgPool,
        user_id: Uuid,
        ip: IpAddr,
        success: bool,
    ) -> anyhow::Result<()> {
        let event = sqlx::query_as::<_, AuthEvent>(
            "INSERT INTO auth_events (ip_address, user_id, success)
             VALUES ($1, $2, $3)
             RETURNING id, ip_address, user_id, success, created_at",
        )
        .bind(IpNetwork::from(ip))
        .bind(user_id)
        .bind(success)
        .fetch_one(db)
        .await?;
        debug!(
            event_id = %event.id,
            user_id = %event.user_id,
            ip = %event.ip_address,
            success = event.success,
            at = %event.created_at,
            "auth event recorded"
        );
        Ok(())
    }
}
