use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. The bearer token and the pending-reset pair
/// are nullable; `reset_token` and `reset_sent_at` are always written
/// together (the table carries a CHECK constraint mirroring that).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub fname: Option<String>,
    pub lname: Option<String>,
    pub password_hash: String,
    pub token: Option<String>,
    pub reset_token: Option<String>,
    pub reset_sent_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str =
    "id, email, fname, lname, password_hash, token, reset_token, reset_sent_at, created_at";

impl User {
    /// Find a user by exact email match.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with a hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        fname: Option<&str>,
        lname: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, fname, lname)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(fname)
        .bind(lname)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Persist a freshly issued bearer token. Callers only invoke this when
    /// the user has none; an existing token is reused, never rotated.
    pub async fn assign_token(db: &PgPool, id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = $1 WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Store a new pending reset, replacing any previous one. Token and
    /// timestamp land in one statement so no partially written pending state
    /// can be observed.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        sent_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET reset_token = $1, reset_sent_at = $2 WHERE id = $3")
            .bind(token)
            .bind(sent_at)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Replace the password hash and clear the pending reset in one
    /// statement.
    pub async fn complete_reset(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users
             SET password_hash = $1, reset_token = NULL, reset_sent_at = NULL
             WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}
