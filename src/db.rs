use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiResult;

/// Row type for the `users` table. Used only for the email allow-list
/// lookup; account management happens elsewhere.
#[derive(Clone, Debug, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    /// Lazy pool: no connection is attempted until the first query, so a
    /// configured-but-unreachable database does not block startup.
    pub fn connect(database_url: &str) -> ApiResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserRecord>> {
        let row: Option<UserRecord> = sqlx::query_as(
            "SELECT id, email, name, role, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
