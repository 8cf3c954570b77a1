use std::collections::HashMap;
use std::sync::Mutex;

use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

/// Shared counter store behind the admission check. `incr` is atomic
/// increment-and-read per key: two concurrent requests can never both
/// observe the pre-increment count.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Bump the counter for `key` in window `bucket` and return the new
    /// count. A stored counter from an older bucket restarts at 1.
    async fn incr(
        &self,
        key: &str,
        bucket: i64,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<i64>;

    /// Drop counters whose window is long gone. Returns how many were
    /// removed.
    async fn prune(&self, now: OffsetDateTime) -> anyhow::Result<u64>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct CounterSlot {
    bucket: i64,
    count: i64,
    expires_at: OffsetDateTime,
}

/// In-process counters. Sufficient for a single instance; tests use it with
/// a manual clock.
#[derive(Default)]
pub struct MemoryThrottleStore {
    slots: Mutex<HashMap<String, CounterSlot>>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn incr(
        &self,
        key: &str,
        bucket: i64,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let mut slots = self.slots.lock().expect("throttle store lock");
        let slot = slots
            .entry(key.to_string())
            .and_modify(|slot| {
                if slot.bucket == bucket {
                    slot.count += 1;
                } else {
                    // window rolled over
                    slot.bucket = bucket;
                    slot.count = 1;
                }
                slot.expires_at = expires_at;
            })
            .or_insert(CounterSlot {
                bucket,
                count: 1,
                expires_at,
            });
        Ok(slot.count)
    }

    async fn prune(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut slots = self.slots.lock().expect("throttle store lock");
        let before = slots.len();
        slots.retain(|_, slot| slot.expires_at > now);
        Ok((before - slots.len()) as u64)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Counters in the shared `throttle_counters` table, linearizable across all
/// service instances via a single upsert-and-read statement.
pub struct PgThrottleStore {
    db: PgPool,
}

impl PgThrottleStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThrottleStore for PgThrottleStore {
    async fn incr(
        &self,
        key: &str,
        bucket: i64,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "INSERT INTO throttle_counters (key, bucket, count, expires_at)
             VALUES ($1, $2, 1, $3)
             ON CONFLICT (key) DO UPDATE
             SET count = CASE
                     WHEN throttle_counters.bucket = EXCLUDED.bucket
                     THEN throttle_counters.count + 1
                     ELSE 1
                 END,
                 bucket = EXCLUDED.bucket,
                 expires_at = EXCLUDED.expires_at
             RETURNING count",
        )
        .bind(key)
        .bind(bucket)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn prune(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM throttle_counters WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
