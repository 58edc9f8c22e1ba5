use chrono::{DateTime, Utc};
use sqlx::types::time::OffsetDateTime;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};

// Credential storage: users joined with wallets at registration time,
// refresh tokens checked against their expiry on the database side.
pub struct AuthRepository {
    pool: PgPool,
}

impl AuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registration creates the wallet together with the user so a user
    /// row without a wallet can never exist.
    pub async fn create_user_with_wallet(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        avatar_url: Option<&str>,
    ) -> DomainResult<(Uuid, Uuid)> {
        let mut tx = self.pool.begin().await?;

        let wallet_id: Uuid = sqlx::query("INSERT INTO wallets (balance) VALUES (0) RETURNING id")
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;

        let user_id: Uuid = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, avatar_url, wallet_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(avatar_url)
        .bind(wallet_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        tx.commit().await?;
        Ok((user_id, wallet_id))
    }

    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> DomainResult<Option<(Uuid, String, String)>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok((
                row.try_get("id")?,
                row.try_get("email")?,
                row.try_get("password_hash")?,
            ))
        })
        .transpose()
    }

    pub async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let expires_at = OffsetDateTime::from_unix_timestamp(expires_at.timestamp())
            .map_err(|err| DomainError::Repository(format!("invalid expiry timestamp: {err}")))?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn verify_refresh_token(&self, token: &str) -> DomainResult<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            SELECT u.id
            FROM users u
            INNER JOIN refresh_tokens rt ON rt.user_id = u.id
            WHERE rt.token = $1 AND rt.expires_at > CURRENT_TIMESTAMP
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Ok(row.try_get("id")?)).transpose()
    }
}
